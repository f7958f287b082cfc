use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::browser::{Locator, Session};
use crate::pipeline::waiter::{WaitOutcome, WaitSpec, Waiter};
use crate::utils::error::{DriverError, Result, ScoutError};

/// Page loads, best-effort clicks and search submission against one session.
#[derive(Debug, Clone, Copy)]
pub struct Navigator {
    waiter: Waiter,
    page_load: Duration,
}

impl Navigator {
    pub fn new(waiter: Waiter, page_load: Duration) -> Self {
        Self { waiter, page_load }
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Navigate to `url`; fails if the page does not settle within the
    /// page-load budget.
    pub fn load(&self, session: &mut Session, url: &str) -> Result<()> {
        let started = Instant::now();
        let budget = self.waiter.deadline().clamp(self.page_load);

        session
            .driver_mut()
            .and_then(|driver| driver.navigate(url, budget))
            .map_err(|e| ScoutError::Navigation(e.to_string()))?;

        let title = session
            .driver()
            .and_then(|driver| driver.title())
            .unwrap_or_default();
        info!(
            stage = "load",
            url,
            title = %title,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Page loaded"
        );
        Ok(())
    }

    /// Click the first clickable match if one shows up within `timeout`.
    /// Absence or a failed click is logged and ignored.
    pub fn click_if_present(&self, session: &mut Session, locator: &Locator, timeout: Duration) -> bool {
        let outcome = match session.driver() {
            Ok(driver) => self.waiter.wait(driver, &WaitSpec::clickable(locator, timeout)),
            Err(e) => {
                warn!(stage = "click", selector = %locator, error = %e, "No driver for optional click");
                return false;
            }
        };

        let node = match outcome {
            WaitOutcome::Found(handles) => handles[0],
            WaitOutcome::TimedOut(signal) => {
                debug!(stage = "click", selector = %locator, signal = %signal, "Optional element not present");
                return false;
            }
        };

        match session.driver_mut().and_then(|driver| driver.click(&node)) {
            Ok(()) => {
                info!(stage = "click", selector = %locator, "Clicked optional element");
                true
            }
            Err(e) => {
                warn!(stage = "click", selector = %locator, error = %e, "Optional click failed");
                false
            }
        }
    }

    /// Wait for the search input, replace its contents with `term` and
    /// submit. Any failure here is fatal for the run.
    pub fn search_and_submit(
        &self,
        session: &mut Session,
        locator: &Locator,
        term: &str,
        timeout: Duration,
    ) -> Result<()> {
        let search_error = |reason: String| ScoutError::Search {
            selector: locator.to_string(),
            reason,
        };

        let driver = session.driver().map_err(|e| search_error(e.to_string()))?;
        let node = match self.waiter.wait(driver, &WaitSpec::present(locator, timeout)) {
            WaitOutcome::Found(handles) => handles[0],
            WaitOutcome::TimedOut(signal) => {
                return Err(search_error(format!("search box never appeared: {}", signal)));
            }
        };

        let submitted = session.driver_mut().and_then(|driver| {
            driver.clear_and_type(&node, term)?;
            driver.submit(&node)
        });
        submitted.map_err(|e: DriverError| search_error(e.to_string()))?;

        info!(stage = "search", selector = %locator, term, "Search submitted");
        Ok(())
    }
}
