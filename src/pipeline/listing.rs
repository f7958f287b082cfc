use std::time::Duration;
use tracing::{info, warn};

use crate::browser::Session;
use crate::models::{FieldValue, ListingItem};
use crate::pipeline::fields::{link_of, settle, text_of};
use crate::pipeline::settings::Selectors;
use crate::pipeline::waiter::{WaitOutcome, WaitSpec, Waiter};
use crate::utils::error::{Result, ScoutError};

pub struct ListingExtractor<'a> {
    waiter: &'a Waiter,
    selectors: &'a Selectors,
    timeout: Duration,
}

impl<'a> ListingExtractor<'a> {
    pub fn new(waiter: &'a Waiter, selectors: &'a Selectors, timeout: Duration) -> Self {
        Self {
            waiter,
            selectors,
            timeout,
        }
    }

    /// Parse up to `max_items` results from the current search page, in DOM
    /// order. Fails only when no item ever appears.
    pub fn extract(&self, session: &Session, max_items: usize) -> Result<Vec<ListingItem>> {
        let driver = session.driver()?;
        let locator = &self.selectors.listing_item;

        let handles = match self.waiter.wait(driver, &WaitSpec::all_present(locator, self.timeout)) {
            WaitOutcome::Found(handles) => handles,
            WaitOutcome::TimedOut(signal) => {
                warn!(stage = "listing", signal = %signal, "No listing items appeared");
                return Err(ScoutError::ListingTimeout {
                    selector: locator.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let base = driver.current_url()?;
        let found = handles.len();
        let items: Vec<ListingItem> = handles
            .into_iter()
            .take(max_items)
            .enumerate()
            .map(|(position, handle)| {
                let label = format!("#{}", position + 1);
                let scope = Some(&handle);
                let title = settle(
                    "listing",
                    "title",
                    &label,
                    text_of(driver, scope, &self.selectors.listing_title),
                );
                let price = settle(
                    "listing",
                    "price",
                    &label,
                    text_of(driver, scope, &self.selectors.listing_price),
                );
                let link: FieldValue = settle(
                    "listing",
                    "link",
                    &label,
                    link_of(driver, scope, &self.selectors.listing_link, &base),
                );
                ListingItem {
                    position,
                    handle,
                    title,
                    price,
                    link,
                }
            })
            .collect();

        info!(stage = "listing", found, kept = items.len(), max_items, "Listing parsed");
        Ok(items)
    }
}
