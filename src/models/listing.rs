use crate::browser::NodeHandle;
use crate::models::FieldValue;

/// One search result as parsed from the listing page.
///
/// The handle is only meaningful on the listing page it came from; once the
/// session navigates away it is stale and must not be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Zero-based position in listing DOM order.
    pub position: usize,
    pub handle: NodeHandle,
    pub title: FieldValue,
    pub price: FieldValue,
    pub link: FieldValue,
}

impl ListingItem {
    /// Human-readable identity used in log events.
    pub fn label(&self) -> String {
        format!("#{} {}", self.position + 1, self.title)
    }
}
