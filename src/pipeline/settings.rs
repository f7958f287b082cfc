use std::time::Duration;

use crate::browser::Locator;
use crate::config::AppConfig;
use crate::utils::error::{Result, ScoutError};

/// Parsed locators for every page element the pipeline touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub consent_clicks: Vec<Locator>,
    pub search_box: Locator,
    pub listing_item: Locator,
    pub listing_title: Locator,
    pub listing_price: Locator,
    pub listing_link: Locator,
    pub detail_rating: Option<Locator>,
    pub detail_review_count: Option<Locator>,
    pub review_trigger: Locator,
    pub review_page_ready: Option<Locator>,
    pub review_item: Locator,
    pub review_rating: Locator,
    pub review_title: Locator,
    pub review_content: Locator,
    pub review_posted_by: Locator,
}

/// Per-stage wait budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    pub page_load: Duration,
    pub consent_click: Duration,
    pub search_box: Duration,
    pub listing: Duration,
    pub detail_fields: Duration,
    pub review_trigger: Duration,
    pub review_page_ready: Duration,
    pub review_items: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub poll_interval: Duration,
    pub attempts: u32,
    pub retry_pause: Duration,
}

/// Everything one run needs, validated and converted from [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub site_url: String,
    pub search_term: String,
    pub selectors: Selectors,
    pub budgets: StageBudgets,
    pub wait: WaitSettings,
    pub max_items: usize,
    pub max_reviews: usize,
    pub workers: usize,
    pub run_deadline: Option<Duration>,
    pub grace_period: Duration,
}

fn locator(raw: &str) -> Result<Locator> {
    Locator::parse(raw).map_err(|_| ScoutError::InvalidSelector {
        selector: raw.to_string(),
    })
}

fn optional_locator(raw: Option<&String>) -> Result<Option<Locator>> {
    raw.map(|raw| locator(raw)).transpose()
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let s = &config.selectors;
        let t = &config.timeouts;
        let ms = Duration::from_millis;

        let selectors = Selectors {
            consent_clicks: s
                .consent_clicks
                .iter()
                .map(|raw| locator(raw))
                .collect::<Result<Vec<_>>>()?,
            search_box: locator(&s.search_box)?,
            listing_item: locator(&s.listing_item)?,
            listing_title: locator(&s.listing_title)?,
            listing_price: locator(&s.listing_price)?,
            listing_link: locator(&s.listing_link)?,
            detail_rating: optional_locator(s.detail_rating.as_ref())?,
            detail_review_count: optional_locator(s.detail_review_count.as_ref())?,
            review_trigger: locator(&s.review_trigger)?,
            review_page_ready: optional_locator(s.review_page_ready.as_ref())?,
            review_item: locator(&s.review_item)?,
            review_rating: locator(&s.review_rating)?,
            review_title: locator(&s.review_title)?,
            review_content: locator(&s.review_content)?,
            review_posted_by: locator(&s.review_posted_by)?,
        };

        Ok(Self {
            site_url: config.site.url.clone(),
            search_term: config.site.search_term.clone(),
            selectors,
            budgets: StageBudgets {
                page_load: ms(t.page_load),
                consent_click: ms(t.consent_click),
                search_box: ms(t.search_box),
                listing: ms(t.listing),
                detail_fields: ms(t.detail_fields),
                review_trigger: ms(t.review_trigger),
                review_page_ready: ms(t.review_page_ready),
                review_items: ms(t.review_items),
            },
            wait: WaitSettings {
                poll_interval: ms(t.poll_interval),
                attempts: config.limits.wait_attempts.max(1),
                retry_pause: ms(config.limits.retry_pause_ms),
            },
            max_items: config.limits.max_items,
            max_reviews: config.limits.max_reviews,
            workers: config.limits.workers.max(1),
            run_deadline: t.run_deadline.map(ms),
            grace_period: ms(t.grace_period),
        })
    }
}
