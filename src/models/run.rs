use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::FieldValue;

/// Run-level pipeline state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    SiteLoaded,
    Searched,
    ListingReady,
    Finalized,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finalized | RunState::Aborted)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Init, SiteLoaded) | (SiteLoaded, Searched) | (Searched, ListingReady) => true,
            (ListingReady, Finalized) => true,
            // Anything before the listing boundary may abort.
            (Init | SiteLoaded | Searched, Aborted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::SiteLoaded => "site_loaded",
            RunState::Searched => "searched",
            RunState::ListingReady => "listing_ready",
            RunState::Finalized => "finalized",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Per-item drill-down state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    DetailOpen,
    ReviewsDone,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingLink,
    Navigation(String),
    SessionUnavailable(String),
    Deadline,
    WorkerFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingLink => f.write_str("missing link"),
            SkipReason::Navigation(message) => write!(f, "navigation failed: {}", message),
            SkipReason::SessionUnavailable(message) => {
                write!(f, "session unavailable: {}", message)
            }
            SkipReason::Deadline => f.write_str("deadline"),
            SkipReason::WorkerFailed(message) => write!(f, "worker failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Extracted,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub position: usize,
    pub title: FieldValue,
    pub link: FieldValue,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub reviews: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub found: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub items: Vec<ItemSummary>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(RunState::Init.can_transition_to(RunState::SiteLoaded));
        assert!(RunState::SiteLoaded.can_transition_to(RunState::Searched));
        assert!(RunState::Searched.can_transition_to(RunState::ListingReady));
        assert!(RunState::ListingReady.can_transition_to(RunState::Finalized));
    }

    #[test]
    fn test_abort_only_before_listing() {
        assert!(RunState::Init.can_transition_to(RunState::Aborted));
        assert!(RunState::Searched.can_transition_to(RunState::Aborted));
        assert!(!RunState::ListingReady.can_transition_to(RunState::Aborted));
        assert!(!RunState::Finalized.can_transition_to(RunState::Aborted));
        assert!(!RunState::Init.can_transition_to(RunState::ListingReady));
    }

    #[test]
    fn test_run_state_serialization() {
        assert_eq!(
            serde_json::to_string(&RunState::ListingReady).unwrap(),
            "\"listing_ready\""
        );
        assert_eq!(RunState::Aborted.to_string(), "aborted");
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Searched.is_terminal());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::MissingLink.to_string(), "missing link");
        assert_eq!(SkipReason::Deadline.to_string(), "deadline");
        assert_eq!(
            SkipReason::Navigation("404".to_string()).to_string(),
            "navigation failed: 404"
        );
    }
}
