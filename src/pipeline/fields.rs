//! Per-field extraction with explicit fallback to the sentinel.

use std::fmt;
use tracing::warn;
use url::Url;

use crate::browser::{Driver, Locator, NodeHandle};
use crate::models::FieldValue;
use crate::utils::error::DriverError;
use crate::utils::text::normalize_whitespace;

/// Why a single field could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMiss {
    NotFound,
    Empty,
    BadLink(String),
    Driver(DriverError),
}

impl fmt::Display for FieldMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMiss::NotFound => f.write_str("element not found"),
            FieldMiss::Empty => f.write_str("element has no text"),
            FieldMiss::BadLink(message) => write!(f, "unusable link: {}", message),
            FieldMiss::Driver(e) => write!(f, "{}", e),
        }
    }
}

impl From<DriverError> for FieldMiss {
    fn from(e: DriverError) -> Self {
        FieldMiss::Driver(e)
    }
}

fn first_match(
    driver: &dyn Driver,
    scope: Option<&NodeHandle>,
    locator: &Locator,
) -> Result<NodeHandle, FieldMiss> {
    driver
        .find_all(scope, locator)?
        .into_iter()
        .next()
        .ok_or(FieldMiss::NotFound)
}

/// Whitespace-normalized inner text of the first match.
pub fn text_of(
    driver: &dyn Driver,
    scope: Option<&NodeHandle>,
    locator: &Locator,
) -> Result<String, FieldMiss> {
    let node = first_match(driver, scope, locator)?;
    let text = normalize_whitespace(&driver.text(&node)?);
    if text.is_empty() {
        return Err(FieldMiss::Empty);
    }
    Ok(text)
}

/// `href` of the first match, resolved against `base`.
pub fn link_of(
    driver: &dyn Driver,
    scope: Option<&NodeHandle>,
    locator: &Locator,
    base: &str,
) -> Result<String, FieldMiss> {
    let node = first_match(driver, scope, locator)?;
    let href = driver
        .attribute(&node, "href")?
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .ok_or(FieldMiss::Empty)?;

    let base = Url::parse(base).map_err(|e| FieldMiss::BadLink(e.to_string()))?;
    base.join(&href)
        .map(|url| url.to_string())
        .map_err(|e| FieldMiss::BadLink(format!("{} ({})", href, e)))
}

/// Collapse a field result to a [`FieldValue`], logging the miss.
pub fn settle(stage: &str, field: &str, item: &str, result: Result<String, FieldMiss>) -> FieldValue {
    match result {
        Ok(value) => FieldValue::from_text(value),
        Err(miss) => {
            warn!(stage, field, item, reason = %miss, "Field missing, using sentinel");
            FieldValue::Missing
        }
    }
}
