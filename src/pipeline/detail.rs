use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{Driver, Locator, Session};
use crate::models::{FieldValue, ListingItem, SkipReason};
use crate::pipeline::fields::{settle, text_of, FieldMiss};
use crate::pipeline::navigator::Navigator;
use crate::pipeline::settings::{Selectors, StageBudgets};
use crate::pipeline::waiter::{WaitOutcome, WaitSpec};
use crate::utils::error::DriverError;

/// Whether the review panel could be opened on the detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewPanel {
    /// No trigger on this page; the product has no reviews to read.
    Absent,
    /// Trigger clicked; reviews are the elements matching `review_item`.
    Opened { review_item: Locator },
}

/// What the detail stage learned about one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailContext {
    pub rating: FieldValue,
    pub review_count: FieldValue,
    pub review_panel: ReviewPanel,
}

/// Item-level abandonment; the run carries on with the next item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipSignal {
    pub reason: SkipReason,
}

impl SkipSignal {
    pub fn new(reason: SkipReason) -> Self {
        Self { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Opened(DetailContext),
    Skipped(SkipSignal),
}

pub struct DetailExtractor<'a> {
    navigator: &'a Navigator,
    selectors: &'a Selectors,
    budgets: &'a StageBudgets,
}

impl<'a> DetailExtractor<'a> {
    pub fn new(navigator: &'a Navigator, selectors: &'a Selectors, budgets: &'a StageBudgets) -> Self {
        Self {
            navigator,
            selectors,
            budgets,
        }
    }

    /// Navigate to the item's page, read product-level fields and try to
    /// open the review panel. Consumes the item: its listing handle is stale
    /// once the session leaves the listing page.
    pub fn open_detail(&self, session: &mut Session, item: ListingItem) -> DetailOutcome {
        let label = item.label();
        let Some(link) = item.link.value() else {
            warn!(stage = "detail", item = %label, "Item has no usable link, skipping");
            return DetailOutcome::Skipped(SkipSignal::new(SkipReason::MissingLink));
        };

        if let Err(e) = self.navigator.load(session, link) {
            warn!(stage = "detail", item = %label, url = link, error = %e, "Detail page failed to load");
            return DetailOutcome::Skipped(SkipSignal::new(SkipReason::Navigation(e.to_string())));
        }

        let (rating, review_count) = match session.driver() {
            Ok(driver) => (
                self.detail_field(driver, "rating", &label, self.selectors.detail_rating.as_ref()),
                self.detail_field(
                    driver,
                    "reviewCount",
                    &label,
                    self.selectors.detail_review_count.as_ref(),
                ),
            ),
            Err(e) => {
                return DetailOutcome::Skipped(SkipSignal::new(SkipReason::Navigation(e.to_string())));
            }
        };

        let review_panel = match self.open_review_panel(session, &label) {
            Ok(panel) => panel,
            Err(reason) => return DetailOutcome::Skipped(SkipSignal::new(reason)),
        };

        DetailOutcome::Opened(DetailContext {
            rating,
            review_count,
            review_panel,
        })
    }

    fn detail_field(
        &self,
        driver: &dyn Driver,
        field: &str,
        label: &str,
        locator: Option<&Locator>,
    ) -> FieldValue {
        let Some(locator) = locator else {
            return FieldValue::Missing;
        };
        let waiter = self.navigator.waiter();
        let result = match waiter.wait(driver, &WaitSpec::present(locator, self.budgets.detail_fields)) {
            WaitOutcome::Found(_) => text_of(driver, None, locator),
            WaitOutcome::TimedOut(_) => Err(FieldMiss::NotFound),
        };
        settle("detail", field, label, result)
    }

    fn open_review_panel(&self, session: &mut Session, label: &str) -> Result<ReviewPanel, SkipReason> {
        let waiter = self.navigator.waiter();
        let trigger = &self.selectors.review_trigger;

        let driver = session
            .driver()
            .map_err(|e| SkipReason::Navigation(e.to_string()))?;
        let node = match waiter.wait(driver, &WaitSpec::clickable(trigger, self.budgets.review_trigger)) {
            WaitOutcome::Found(handles) => handles[0],
            WaitOutcome::TimedOut(signal) => {
                info!(stage = "detail", item = label, signal = %signal, "No review trigger, panel absent");
                return Ok(ReviewPanel::Absent);
            }
        };

        match session.driver_mut().and_then(|driver| driver.click(&node)) {
            Ok(()) => {}
            // The trigger may lead to a separate reviews page.
            Err(e @ (DriverError::Navigation { .. } | DriverError::LoadTimeout { .. } | DriverError::Closed)) => {
                warn!(stage = "detail", item = label, error = %e, "Review page failed to load");
                return Err(SkipReason::Navigation(e.to_string()));
            }
            Err(e) => {
                warn!(stage = "detail", item = label, error = %e, "Review trigger click failed, panel absent");
                return Ok(ReviewPanel::Absent);
            }
        }

        if let Some(ready) = &self.selectors.review_page_ready {
            let driver = session
                .driver()
                .map_err(|e| SkipReason::Navigation(e.to_string()))?;
            match waiter.wait(driver, &WaitSpec::present(ready, self.budgets.review_page_ready)) {
                WaitOutcome::Found(_) => debug!(stage = "detail", item = label, "Review page ready"),
                WaitOutcome::TimedOut(signal) => {
                    warn!(stage = "detail", item = label, signal = %signal, "Review page marker missing")
                }
            }
        }

        info!(stage = "detail", item = label, "Review panel opened");
        Ok(ReviewPanel::Opened {
            review_item: self.selectors.review_item.clone(),
        })
    }
}
