use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::{Session, SessionFactory};
use crate::models::{
    FieldValue, ItemState, ItemStatus, ItemSummary, ListingItem, ProductDraft, ProductRecord, RunState,
    RunSummary, SkipReason,
};
use crate::pipeline::deadline::Deadline;
use crate::pipeline::detail::{DetailExtractor, DetailOutcome};
use crate::pipeline::listing::ListingExtractor;
use crate::pipeline::navigator::Navigator;
use crate::pipeline::reviews::ReviewExtractor;
use crate::pipeline::settings::PipelineSettings;
use crate::pipeline::waiter::Waiter;
use crate::sink::RecordSink;
use crate::utils::error::{Result, ScoutError};

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Extracted records in listing order.
    pub records: Vec<ProductRecord>,
    pub summary: RunSummary,
    /// The run-fatal error, when the run ended `Aborted`.
    pub error: Option<ScoutError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// Tracks the run-level state and rejects illegal transitions.
#[derive(Debug, Clone, Copy)]
struct RunMachine {
    state: RunState,
}

impl RunMachine {
    fn new() -> Self {
        Self {
            state: RunState::Init,
        }
    }

    fn advance(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            error!(from = %self.state, to = %next, "Illegal run state transition ignored");
            return;
        }
        info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }

    fn abort(&mut self, cause: &ScoutError) {
        error!(state = %self.state, error = %cause, "Run aborted");
        self.advance(RunState::Aborted);
    }
}

/// Final disposition of one listing item.
#[derive(Debug)]
struct ItemOutcome {
    summary: ItemSummary,
    record: Option<ProductRecord>,
}

impl ItemOutcome {
    fn extracted(record: ProductRecord, position: usize) -> Self {
        Self {
            summary: ItemSummary {
                position,
                title: record.title.clone(),
                link: record.link.clone(),
                status: ItemStatus::Extracted,
                reason: None,
                reviews: record.reviews.len(),
            },
            record: Some(record),
        }
    }

    fn skipped(position: usize, title: FieldValue, link: FieldValue, reason: SkipReason) -> Self {
        Self {
            summary: ItemSummary {
                position,
                title,
                link,
                status: ItemStatus::Skipped,
                reason: Some(reason.to_string()),
                reviews: 0,
            },
            record: None,
        }
    }

    fn skipped_item(item: &ListingItem, reason: SkipReason) -> Self {
        Self::skipped(item.position, item.title.clone(), item.link.clone(), reason)
    }

    fn skipped_draft(draft: &ProductDraft, reason: SkipReason) -> Self {
        Self::skipped(draft.position, draft.title().clone(), draft.link().clone(), reason)
    }
}

struct FrontPhase {
    machine: RunMachine,
    session: Option<Session>,
    listing: Result<Vec<ListingItem>>,
}

/// Drives one extraction run from site load to the finalized record set.
pub struct Orchestrator {
    settings: Arc<PipelineSettings>,
    factory: Arc<dyn SessionFactory>,
}

impl Orchestrator {
    pub fn new(settings: PipelineSettings, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            settings: Arc::new(settings),
            factory,
        }
    }

    /// Run the pipeline and hand the result to `sink`.
    pub async fn run_and_persist(&self, sink: &dyn RecordSink) -> Result<RunReport> {
        let report = self.run().await;
        sink.persist(&report.records, &report.summary).await?;
        Ok(report)
    }

    /// Run the pipeline. Run-fatal failures end in an `Aborted` report rather
    /// than an `Err`, so callers always get a summary to persist.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let settings = Arc::clone(&self.settings);

        let deadline = Deadline::from_budget(settings.run_deadline, settings.grace_period);
        let waiter = Waiter::from_settings(&settings.wait).with_deadline(deadline);
        let navigator = Navigator::new(waiter, settings.budgets.page_load);

        info!(
            run_id = %run_id,
            url = %settings.site_url,
            term = %settings.search_term,
            workers = settings.workers,
            max_items = settings.max_items,
            "Starting extraction run"
        );

        let front = {
            let settings = Arc::clone(&settings);
            let factory = Arc::clone(&self.factory);
            tokio::task::spawn_blocking(move || run_front_phase(&settings, factory.as_ref(), &navigator))
                .await
                .unwrap_or_else(|e| {
                    let cause = ScoutError::Worker(e.to_string());
                    let mut machine = RunMachine::new();
                    machine.abort(&cause);
                    FrontPhase {
                        machine,
                        session: None,
                        listing: Err(cause),
                    }
                })
        };

        let FrontPhase {
            mut machine,
            session,
            listing,
        } = front;

        let items = match listing {
            Ok(items) => items,
            Err(e) => {
                drop(session);
                let report = build_report(run_id, started_at, machine.state, Some(e), 0, Vec::new());
                log_finish(&report, started);
                return report;
            }
        };

        let found = items.len();
        let outcomes = match (settings.workers, session) {
            (1, Some(session)) => {
                drill_sequential(
                    Arc::clone(&settings),
                    Arc::clone(&self.factory),
                    navigator,
                    session,
                    items,
                )
                .await
            }
            (_, session) => {
                // Listing handles are not needed past this point.
                drop(session);
                drill_parallel(
                    Arc::clone(&settings),
                    Arc::clone(&self.factory),
                    navigator,
                    items,
                )
                .await
            }
        };

        machine.advance(RunState::Finalized);
        let report = build_report(run_id, started_at, machine.state, None, found, outcomes);
        log_finish(&report, started);
        report
    }
}

fn run_front_phase(settings: &PipelineSettings, factory: &dyn SessionFactory, navigator: &Navigator) -> FrontPhase {
    let mut machine = RunMachine::new();

    let mut session = match factory.acquire() {
        Ok(session) => session,
        Err(e) => {
            machine.abort(&e);
            return FrontPhase {
                machine,
                session: None,
                listing: Err(e),
            };
        }
    };

    let listing = front_phase(settings, navigator, &mut session, &mut machine);
    if let Err(e) = &listing {
        machine.abort(e);
        session.release();
    }

    FrontPhase {
        machine,
        session: Some(session),
        listing,
    }
}

/// Site load, consent clicks, search and listing.
fn front_phase(
    settings: &PipelineSettings,
    navigator: &Navigator,
    session: &mut Session,
    machine: &mut RunMachine,
) -> Result<Vec<ListingItem>> {
    let budgets = &settings.budgets;
    let selectors = &settings.selectors;

    navigator.load(session, &settings.site_url)?;
    machine.advance(RunState::SiteLoaded);

    for locator in &selectors.consent_clicks {
        navigator.click_if_present(session, locator, budgets.consent_click);
    }

    navigator.search_and_submit(session, &selectors.search_box, &settings.search_term, budgets.search_box)?;
    machine.advance(RunState::Searched);

    let items = ListingExtractor::new(navigator.waiter(), selectors, budgets.listing)
        .extract(session, settings.max_items)?;
    machine.advance(RunState::ListingReady);
    Ok(items)
}

/// Detail and review drill-down for one item on an already-open session.
fn drill_item(
    settings: &PipelineSettings,
    navigator: &Navigator,
    session: &mut Session,
    item: ListingItem,
) -> ItemOutcome {
    let label = item.label();
    let deadline = navigator.waiter().deadline();
    let mut draft = ProductDraft::from_listing(&item);

    debug!(stage = "item", item = %label, state = ?ItemState::DetailOpen, "Item state changed");
    let detail = DetailExtractor::new(navigator, &settings.selectors, &settings.budgets);
    let context = match detail.open_detail(session, item) {
        DetailOutcome::Opened(context) => context,
        DetailOutcome::Skipped(signal) => {
            warn!(
                stage = "item",
                item = %label,
                state = ?ItemState::Skipped,
                reason = %signal.reason,
                "Item skipped"
            );
            return ItemOutcome::skipped_draft(&draft, signal.reason);
        }
    };
    if deadline.hard_expired() {
        warn!(
            stage = "item",
            item = %label,
            state = ?ItemState::Skipped,
            "Deadline passed during detail stage, abandoning item"
        );
        return ItemOutcome::skipped_draft(&draft, SkipReason::Deadline);
    }
    draft.set_detail_fields(context.rating.clone(), context.review_count.clone());

    let reviews = ReviewExtractor::new(navigator.waiter(), &settings.selectors, settings.budgets.review_items)
        .extract(session, &context, &label, settings.max_reviews);
    if deadline.hard_expired() {
        warn!(
            stage = "item",
            item = %label,
            state = ?ItemState::Skipped,
            "Deadline passed during review stage, abandoning item"
        );
        return ItemOutcome::skipped_draft(&draft, SkipReason::Deadline);
    }
    draft.set_reviews(reviews);

    debug!(stage = "item", item = %label, state = ?ItemState::ReviewsDone, "Item state changed");
    let position = draft.position;
    ItemOutcome::extracted(draft.finalize(), position)
}

/// Drill-down for one item on a session of its own.
fn drill_with_own_session(
    settings: &PipelineSettings,
    factory: &dyn SessionFactory,
    navigator: &Navigator,
    item: ListingItem,
) -> ItemOutcome {
    if navigator.waiter().deadline().soft_expired() {
        return ItemOutcome::skipped_item(&item, SkipReason::Deadline);
    }

    let mut session = match factory.acquire() {
        Ok(session) => session,
        Err(e) => {
            warn!(stage = "item", item = %item.label(), error = %e, "No session for item");
            return ItemOutcome::skipped_item(&item, SkipReason::SessionUnavailable(e.to_string()));
        }
    };

    let outcome = drill_item(settings, navigator, &mut session, item);
    session.release();
    outcome
}

/// Runs every item on one session. A panicking item is recorded as failed
/// and the session is replaced before the next item.
async fn drill_sequential(
    settings: Arc<PipelineSettings>,
    factory: Arc<dyn SessionFactory>,
    navigator: Navigator,
    session: Session,
    items: Vec<ListingItem>,
) -> Vec<ItemOutcome> {
    let identities: Vec<(usize, FieldValue, FieldValue)> = items
        .iter()
        .map(|item| (item.position, item.title.clone(), item.link.clone()))
        .collect();

    let task = tokio::task::spawn_blocking(move || {
        let mut session = Some(session);
        let deadline = navigator.waiter().deadline();
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            if deadline.soft_expired() {
                outcomes.push(ItemOutcome::skipped_item(&item, SkipReason::Deadline));
                continue;
            }

            if session.is_none() {
                match factory.acquire() {
                    Ok(fresh) => session = Some(fresh),
                    Err(e) => {
                        warn!(stage = "item", item = %item.label(), error = %e, "No session for item");
                        outcomes.push(ItemOutcome::skipped_item(
                            &item,
                            SkipReason::SessionUnavailable(e.to_string()),
                        ));
                        continue;
                    }
                }
            }
            let Some(active) = session.as_mut() else {
                continue;
            };

            let (position, title, link) = (item.position, item.title.clone(), item.link.clone());
            let label = item.label();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                drill_item(&settings, &navigator, active, item)
            }));
            match outcome {
                Ok(outcome) => outcomes.push(outcome),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(stage = "item", item = %label, error = %message, "Drill-down worker failed");
                    if let Some(mut broken) = session.take() {
                        broken.release();
                    }
                    outcomes.push(ItemOutcome::skipped(
                        position,
                        title,
                        link,
                        SkipReason::WorkerFailed(message),
                    ));
                }
            }
        }

        if let Some(mut session) = session {
            session.release();
        }
        outcomes
    });

    match task.await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!(error = %e, "Drill-down worker failed");
            identities
                .into_iter()
                .map(|(position, title, link)| {
                    ItemOutcome::skipped(position, title, link, SkipReason::WorkerFailed(e.to_string()))
                })
                .collect()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

/// Bounded pool over independent sessions. Results come back in completion
/// order and are re-sorted by listing position.
async fn drill_parallel(
    settings: Arc<PipelineSettings>,
    factory: Arc<dyn SessionFactory>,
    navigator: Navigator,
    items: Vec<ListingItem>,
) -> Vec<ItemOutcome> {
    let workers = settings.workers.max(1);

    let mut outcomes: Vec<ItemOutcome> = stream::iter(items)
        .map(|item| {
            let settings = Arc::clone(&settings);
            let factory = Arc::clone(&factory);
            let (position, title, link) = (item.position, item.title.clone(), item.link.clone());
            async move {
                let task = tokio::task::spawn_blocking(move || {
                    drill_with_own_session(&settings, factory.as_ref(), &navigator, item)
                });
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(position, error = %e, "Drill-down worker failed");
                        ItemOutcome::skipped(position, title, link, SkipReason::WorkerFailed(e.to_string()))
                    }
                }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    outcomes.sort_by_key(|outcome| outcome.summary.position);
    outcomes
}

fn build_report(
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    state: RunState,
    error: Option<ScoutError>,
    found: usize,
    outcomes: Vec<ItemOutcome>,
) -> RunReport {
    let mut records = Vec::new();
    let mut items = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        records.extend(outcome.record);
        items.push(outcome.summary);
    }

    let extracted = records.len();
    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        state,
        abort_reason: error.as_ref().map(|e| e.to_string()),
        found,
        extracted,
        skipped: found - extracted,
        items,
    };

    RunReport {
        records,
        summary,
        error,
    }
}

fn log_finish(report: &RunReport, started: Instant) {
    let summary = &report.summary;
    info!(
        run_id = %summary.run_id,
        state = %summary.state,
        found = summary.found,
        extracted = summary.extracted,
        skipped = summary.skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run finished"
    );
}
