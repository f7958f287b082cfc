use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{Locator, Session};
use crate::models::ReviewRecord;
use crate::pipeline::detail::{DetailContext, ReviewPanel};
use crate::pipeline::fields::{settle, text_of};
use crate::pipeline::settings::Selectors;
use crate::pipeline::waiter::{WaitOutcome, WaitSpec, Waiter};

pub struct ReviewExtractor<'a> {
    waiter: &'a Waiter,
    selectors: &'a Selectors,
    timeout: Duration,
}

impl<'a> ReviewExtractor<'a> {
    pub fn new(waiter: &'a Waiter, selectors: &'a Selectors, timeout: Duration) -> Self {
        Self {
            waiter,
            selectors,
            timeout,
        }
    }

    /// Read up to `max_reviews` reviews from an opened panel. An absent panel,
    /// a panel that never renders any review, or a lost session all yield an
    /// empty list.
    pub fn extract(
        &self,
        session: &Session,
        context: &DetailContext,
        item: &str,
        max_reviews: usize,
    ) -> Vec<ReviewRecord> {
        let ReviewPanel::Opened { review_item } = &context.review_panel else {
            return Vec::new();
        };
        if max_reviews == 0 {
            return Vec::new();
        }

        let driver = match session.driver() {
            Ok(driver) => driver,
            Err(e) => {
                warn!(stage = "reviews", item, error = %e, "Session lost before reading reviews");
                return Vec::new();
            }
        };

        let handles = match self.waiter.wait(driver, &WaitSpec::all_present(review_item, self.timeout)) {
            WaitOutcome::Found(handles) => handles,
            WaitOutcome::TimedOut(signal) => {
                warn!(stage = "reviews", item, signal = %signal, "Review panel opened but no reviews appeared");
                return Vec::new();
            }
        };

        let reviews: Vec<ReviewRecord> = handles
            .iter()
            .take(max_reviews)
            .enumerate()
            .map(|(index, handle)| {
                let label = format!("{} review {}", item, index + 1);
                let scope = Some(handle);
                let field = |name: &str, locator: &Locator| {
                    settle("reviews", name, &label, text_of(driver, scope, locator))
                };
                ReviewRecord {
                    rating: field("rating", &self.selectors.review_rating),
                    title: field("title", &self.selectors.review_title),
                    content: field("content", &self.selectors.review_content),
                    posted_by: field("postedBy", &self.selectors.review_posted_by),
                }
            })
            .collect();

        info!(stage = "reviews", item, found = handles.len(), kept = reviews.len(), "Reviews extracted");
        reviews
    }
}
