use std::time::{Duration, Instant};

/// Top-level run deadline.
///
/// Once the soft expiry passes no new item is started; items already in
/// flight may keep going until the hard expiry (soft + grace), after which
/// every wait is clamped to zero and the item is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    soft: Option<Instant>,
    hard: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self {
            soft: None,
            hard: None,
        }
    }

    /// An expiry too far out to represent is treated as no expiry.
    pub fn after(budget: Duration, grace: Duration) -> Self {
        let soft = Instant::now().checked_add(budget);
        Self {
            soft,
            hard: soft.and_then(|soft| soft.checked_add(grace)),
        }
    }

    pub fn from_budget(budget: Option<Duration>, grace: Duration) -> Self {
        match budget {
            Some(budget) => Self::after(budget, grace),
            None => Self::none(),
        }
    }

    pub fn soft_expired(&self) -> bool {
        self.soft.is_some_and(|soft| Instant::now() >= soft)
    }

    pub fn hard_expired(&self) -> bool {
        self.hard.is_some_and(|hard| Instant::now() >= hard)
    }

    /// Time left before the hard expiry; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.hard
            .map(|hard| hard.saturating_duration_since(Instant::now()))
    }

    /// Shorten `budget` so it ends no later than the hard expiry.
    pub fn clamp(&self, budget: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => budget.min(remaining),
            None => budget,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
