use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::browser::Locator;

/// Upper bound for any configured duration (one day).
const MAX_DURATION_MS: u64 = 86_400_000;
const MAX_WAIT_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub url: String,
    pub search_term: String,
}

/// Selector set injected into the pipeline. Values are CSS selectors unless
/// prefixed with `xpath:` or starting with `/` or `(`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub consent_clicks: Vec<String>,
    pub search_box: String,
    pub listing_item: String,
    pub listing_title: String,
    pub listing_price: String,
    pub listing_link: String,
    pub detail_rating: Option<String>,
    pub detail_review_count: Option<String>,
    pub review_trigger: String,
    pub review_page_ready: Option<String>,
    pub review_item: String,
    pub review_rating: String,
    pub review_title: String,
    pub review_content: String,
    pub review_posted_by: String,
}

/// Wait budgets, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_load: u64,
    pub consent_click: u64,
    pub search_box: u64,
    pub listing: u64,
    pub detail_fields: u64,
    pub review_trigger: u64,
    pub review_page_ready: u64,
    pub review_items: u64,
    pub poll_interval: u64,
    pub run_deadline: Option<u64>,
    pub grace_period: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_items: usize,
    pub max_reviews: usize,
    pub workers: usize,
    pub wait_attempts: u32,
    pub retry_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub products_file: String,
    pub summary_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://www.bestbuy.com/".to_string(),
            search_term: "laptop".to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            consent_clicks: vec!["a.us-link".to_string()],
            search_box: "textarea#autocomplete-search-bar".to_string(),
            listing_item: "li.product-list-item".to_string(),
            listing_title: "h2.product-title".to_string(),
            listing_price: "div[data-testid='price-block-customer-price'] span".to_string(),
            listing_link: "a.product-list-item-link".to_string(),
            detail_rating: None,
            detail_review_count: None,
            review_trigger: "//button[.//span[text()='See All Customer Reviews']]".to_string(),
            review_page_ready: Some("h1.c-section-title.heading-5.v-fw-medium".to_string()),
            review_item: "li.w-full.py-300.py-sm-200.border-light".to_string(),
            review_rating: "span.sr-only".to_string(),
            review_title: "h4.body-copy-lg".to_string(),
            review_content: "p.body-copy-lg".to_string(),
            review_posted_by: "p[data-testid='posted-by']".to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_load: 30_000,
            consent_click: 20_000,
            search_box: 20_000,
            listing: 20_000,
            detail_fields: 5_000,
            review_trigger: 20_000,
            review_page_ready: 20_000,
            review_items: 20_000,
            poll_interval: 250,
            run_deadline: None,
            grace_period: 5_000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_items: 50,
            max_reviews: 50,
            workers: 1,
            wait_attempts: 1,
            retry_pause_ms: 500,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            chrome_path: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            products_file: "products_raw.json".to_string(),
            summary_file: "run_summary.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            json: false,
        }
    }
}

impl TimeoutConfig {
    /// Longest single blocking step any stage may take.
    pub fn longest_wait(&self) -> Duration {
        let longest = [
            self.page_load,
            self.consent_click,
            self.search_box,
            self.listing,
            self.detail_fields,
            self.review_trigger,
            self.review_page_ready,
            self.review_items,
        ]
        .into_iter()
        .max()
        .unwrap_or(self.page_load);
        Duration::from_millis(longest)
    }
}

impl AppConfig {
    /// Load `config/default`, `config/{RUN_MODE}` and `config/local` (all
    /// optional), then `SHELF_SCOUT__*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load(Path::new("config"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load without validating, so callers can apply overrides first.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let source = |name: &str| {
            File::with_name(&config_dir.join(name).to_string_lossy()).required(false)
        };

        let s = Config::builder()
            // Built-in defaults apply to anything the files leave out
            .add_source(source("default"))
            .add_source(source(&run_mode))
            // Local overrides (ignored by git)
            .add_source(source("local"))
            .add_source(
                Environment::with_prefix("SHELF_SCOUT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("selectors.consent_clicks")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate site configuration
        if Url::parse(&self.site.url).is_err() {
            return Err(ConfigError::Message("Invalid site URL format".into()));
        }

        if self.site.search_term.trim().is_empty() {
            return Err(ConfigError::Message("Search term must not be empty".into()));
        }

        // Validate selectors
        for (name, selector) in self.selectors.required() {
            Locator::parse(selector).map_err(|e| {
                ConfigError::Message(format!("Invalid selector for {}: {}", name, e))
            })?;
        }
        for (name, selector) in self.selectors.optional() {
            if let Some(selector) = selector {
                Locator::parse(selector).map_err(|e| {
                    ConfigError::Message(format!("Invalid selector for {}: {}", name, e))
                })?;
            }
        }
        for selector in &self.selectors.consent_clicks {
            Locator::parse(selector).map_err(|e| {
                ConfigError::Message(format!("Invalid consent click selector: {}", e))
            })?;
        }

        // Validate timeouts
        let t = &self.timeouts;
        if [
            t.page_load,
            t.consent_click,
            t.search_box,
            t.listing,
            t.detail_fields,
            t.review_trigger,
            t.review_page_ready,
            t.review_items,
            t.poll_interval,
        ]
        .contains(&0)
        {
            return Err(ConfigError::Message("Timeouts must be greater than 0".into()));
        }

        if t.run_deadline == Some(0) {
            return Err(ConfigError::Message("Run deadline must be greater than 0".into()));
        }

        if [
            t.page_load,
            t.consent_click,
            t.search_box,
            t.listing,
            t.detail_fields,
            t.review_trigger,
            t.review_page_ready,
            t.review_items,
            t.poll_interval,
            t.grace_period,
            t.run_deadline.unwrap_or(0),
            self.limits.retry_pause_ms,
        ]
        .iter()
        .any(|&ms| ms > MAX_DURATION_MS)
        {
            return Err(ConfigError::Message(format!(
                "Timeouts and pauses must not exceed {}ms",
                MAX_DURATION_MS
            )));
        }

        // Validate limits
        if self.limits.max_items == 0 {
            return Err(ConfigError::Message("max_items must be greater than 0".into()));
        }

        if self.limits.workers == 0 {
            return Err(ConfigError::Message("workers must be greater than 0".into()));
        }

        if self.limits.wait_attempts == 0 || self.limits.wait_attempts > MAX_WAIT_ATTEMPTS {
            return Err(ConfigError::Message(format!(
                "wait_attempts must be between 1 and {}",
                MAX_WAIT_ATTEMPTS
            )));
        }

        // Validate browser configuration
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message("Window size must be greater than 0".into()));
        }

        if self.output.products_file.trim().is_empty() || self.output.summary_file.trim().is_empty() {
            return Err(ConfigError::Message("Output file names must not be empty".into()));
        }

        Ok(())
    }
}

impl SelectorConfig {
    fn required(&self) -> [(&'static str, &String); 11] {
        [
            ("search_box", &self.search_box),
            ("listing_item", &self.listing_item),
            ("listing_title", &self.listing_title),
            ("listing_price", &self.listing_price),
            ("listing_link", &self.listing_link),
            ("review_trigger", &self.review_trigger),
            ("review_item", &self.review_item),
            ("review_rating", &self.review_rating),
            ("review_title", &self.review_title),
            ("review_content", &self.review_content),
            ("review_posted_by", &self.review_posted_by),
        ]
    }

    fn optional(&self) -> [(&'static str, &Option<String>); 3] {
        [
            ("detail_rating", &self.detail_rating),
            ("detail_review_count", &self.detail_review_count),
            ("review_page_ready", &self.review_page_ready),
        ]
    }
}
