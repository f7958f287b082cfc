pub mod deadline;
pub mod detail;
pub mod fields;
pub mod listing;
pub mod navigator;
pub mod orchestrator;
pub mod reviews;
pub mod settings;
pub mod waiter;

pub use deadline::Deadline;
pub use detail::{DetailContext, DetailExtractor, DetailOutcome, ReviewPanel, SkipSignal};
pub use listing::ListingExtractor;
pub use navigator::Navigator;
pub use orchestrator::{Orchestrator, RunReport};
pub use reviews::ReviewExtractor;
pub use settings::{PipelineSettings, Selectors, StageBudgets, WaitSettings};
pub use waiter::{Predicate, TimeoutSignal, WaitOutcome, WaitSpec, Waiter};
