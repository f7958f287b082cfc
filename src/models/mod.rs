use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub mod listing;
pub mod product;
pub mod run;

// Re-exports for convenience
pub use listing::*;
pub use product::*;
pub use run::*;

/// Literal written for any field whose source element could not be located
/// or parsed.
pub const SENTINEL: &str = "N/A";

/// Result of extracting one scalar field: either the parsed text or the
/// sentinel. Serializes as a plain string in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldValue {
    Found(String),
    #[default]
    Missing,
}

impl FieldValue {
    /// Wrap extracted text; empty text counts as a miss.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            FieldValue::Missing
        } else {
            FieldValue::Found(text)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Found(value) => value,
            FieldValue::Missing => SENTINEL,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            FieldValue::Found(value) => Some(value),
            FieldValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::from_text).unwrap_or_default()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            Some(value) if value != SENTINEL => FieldValue::from_text(value),
            _ => FieldValue::Missing,
        })
    }
}
