use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::utils::error::DriverError;

/// How an element is addressed on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    /// Parse a configured selector string.
    ///
    /// An `xpath:` prefix, or a leading `/` or `(`, selects XPath. Anything
    /// else must be a valid CSS selector.
    pub fn parse(raw: &str) -> Result<Self, DriverError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DriverError::InvalidSelector {
                selector: raw.to_string(),
                message: "selector is empty".to_string(),
            });
        }

        if let Some(expr) = raw.strip_prefix("xpath:") {
            let expr = expr.trim();
            if expr.is_empty() {
                return Err(DriverError::InvalidSelector {
                    selector: raw.to_string(),
                    message: "xpath expression is empty".to_string(),
                });
            }
            return Ok(Locator::XPath(expr.to_string()));
        }

        if raw.starts_with('/') || raw.starts_with('(') {
            return Ok(Locator::XPath(raw.to_string()));
        }

        Selector::parse(raw).map_err(|e| DriverError::InvalidSelector {
            selector: raw.to_string(),
            message: format!("{:?}", e),
        })?;
        Ok(Locator::Css(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locator::Css(selector) => selector,
            Locator::XPath(expr) => expr,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => f.write_str(selector),
            Locator::XPath(expr) => write!(f, "xpath:{}", expr),
        }
    }
}

/// Opaque reference to an element on the page that was current when it was
/// found. Drivers reject handles from an earlier page with
/// [`DriverError::StaleHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: u64,
    generation: u64,
}

impl NodeHandle {
    pub fn new(id: u64, generation: u64) -> Self {
        Self { id, generation }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Browser automation seam used by every pipeline stage.
///
/// Calls are synchronous and must return promptly; waiting for elements to
/// appear is the caller's job (see `pipeline::waiter`).
pub trait Driver: Send {
    /// Load `url` and wait until the page settles, giving up after `budget`.
    fn navigate(&mut self, url: &str, budget: Duration) -> Result<(), DriverError>;

    fn current_url(&self) -> Result<String, DriverError>;

    fn title(&self) -> Result<String, DriverError>;

    /// All elements matching `locator`, in document order, searched within
    /// `scope` when given. No match is an empty vector, not an error.
    fn find_all(
        &self,
        scope: Option<&NodeHandle>,
        locator: &Locator,
    ) -> Result<Vec<NodeHandle>, DriverError>;

    fn is_clickable(&self, node: &NodeHandle) -> Result<bool, DriverError>;

    fn click(&mut self, node: &NodeHandle) -> Result<(), DriverError>;

    fn clear_and_type(&mut self, node: &NodeHandle, text: &str) -> Result<(), DriverError>;

    /// Submit the input (Enter key / enclosing form).
    fn submit(&mut self, node: &NodeHandle) -> Result<(), DriverError>;

    fn text(&self, node: &NodeHandle) -> Result<String, DriverError>;

    fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>, DriverError>;

    fn close(&mut self) -> Result<(), DriverError>;
}
