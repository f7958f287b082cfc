use thiserror::Error;

/// Errors raised at the browser driver seam.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Page load for {url} exceeded {budget_ms}ms")]
    LoadTimeout { url: String, budget_ms: u64 },

    #[error("Element handle is stale (page changed since it was found)")]
    StaleHandle,

    #[error("Unsupported locator: {0}")]
    UnsupportedLocator(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Session is closed")]
    Closed,

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Run-level error taxonomy. Field misses, skips and wait timeouts are
/// values, not variants here.
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Browser session could not start: {0}")]
    SessionInit(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Search error on '{selector}': {reason}")]
    Search { selector: String, reason: String },

    #[error("Listing timeout: no items matched '{selector}' within {timeout_ms}ms")]
    ListingTimeout { selector: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },

    #[error("Snapshot manifest error: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ScoutError {
    /// Whether this error ends the run in the `Aborted` state.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            ScoutError::SessionInit(_)
                | ScoutError::Navigation(_)
                | ScoutError::Search { .. }
                | ScoutError::ListingTimeout { .. }
                | ScoutError::Worker(_)
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScoutError>;
