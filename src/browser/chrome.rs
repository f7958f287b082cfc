use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::browser::driver::{Driver, Locator, NodeHandle};
use crate::browser::session::{Session, SessionFactory};
use crate::config::BrowserConfig;
use crate::utils::error::{DriverError, ScoutError};

const CLICKABLE_JS: &str = r#"
function() {
    if (this.disabled || this.getAttribute('aria-disabled') === 'true') {
        return false;
    }
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden'
        && style.pointerEvents !== 'none';
}
"#;

const CLEAR_JS: &str = r#"
function() {
    this.focus();
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}
"#;

const ATTRIBUTE_JS: &str = "function(name) { return this.getAttribute(name); }";

/// How long a click or key press gets to start a navigation.
const NAVIGATION_SETTLE: Duration = Duration::from_millis(300);
const NAVIGATION_POLL: Duration = Duration::from_millis(25);
const ERROR_PAGE_PREFIX: &str = "chrome-error://";

fn navigation_failure(url: &str, budget: Duration, elapsed: Duration, message: String) -> DriverError {
    if elapsed >= budget {
        DriverError::LoadTimeout {
            url: url.to_string(),
            budget_ms: budget.as_millis() as u64,
        }
    } else {
        DriverError::Navigation {
            url: url.to_string(),
            message,
        }
    }
}

/// Launches one Chrome process per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
    idle_timeout: Duration,
}

impl ChromeLauncher {
    /// `idle_timeout` must exceed the longest single wait the pipeline may
    /// perform, otherwise the browser connection is dropped mid-wait.
    pub fn new(config: BrowserConfig, idle_timeout: Duration) -> Self {
        Self {
            config,
            idle_timeout,
        }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>, ScoutError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .idle_browser_timeout(self.idle_timeout)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-backgrounding-occluded-windows"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| ScoutError::SessionInit(format!("invalid launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        Ok(launch_options)
    }
}

impl SessionFactory for ChromeLauncher {
    fn acquire(&self) -> Result<Session, ScoutError> {
        let browser = Browser::new(self.launch_options()?)
            .map_err(|e| ScoutError::SessionInit(format!("failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScoutError::SessionInit(format!("failed to create tab: {}", e)))?;

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| ScoutError::SessionInit(format!("failed to set user agent: {}", e)))?;

        let driver = ChromeDriver {
            browser: Some(browser),
            tab,
            generation: 0,
            budget: Duration::from_secs(30),
        };
        Ok(Session::new(Box::new(driver)))
    }
}

/// [`Driver`] backed by a live Chrome tab.
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    generation: u64,
    /// Page-load budget of the last `navigate`, reused for navigations
    /// started by clicks and submits.
    budget: Duration,
}

impl ChromeDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.browser.is_none() {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    fn element(&self, node: &NodeHandle) -> Result<Element<'_>, DriverError> {
        self.ensure_open()?;
        if node.generation() != self.generation {
            return Err(DriverError::StaleHandle);
        }
        Element::new(&self.tab, node.id() as _).map_err(|e| DriverError::Protocol(e.to_string()))
    }

    fn handles(&self, elements: Vec<Element<'_>>) -> Vec<NodeHandle> {
        elements
            .iter()
            .map(|element| NodeHandle::new(element.node_id as u64, self.generation))
            .collect()
    }

    /// Settle whatever navigation the last click or key press started.
    /// Handles are invalidated once the document may have changed.
    fn follow_navigation(&mut self, before: &str) -> Result<(), DriverError> {
        let started = Instant::now();
        while self.tab.get_url() == before && started.elapsed() < NAVIGATION_SETTLE {
            std::thread::sleep(NAVIGATION_POLL);
        }

        let settled = self.tab.wait_until_navigated().map(|_| ());
        let after = self.tab.get_url();
        if settled.is_err() || after != before {
            self.generation += 1;
        }

        if let Err(e) = settled {
            return Err(navigation_failure(&after, self.budget, started.elapsed(), e.to_string()));
        }
        if after.starts_with(ERROR_PAGE_PREFIX) {
            return Err(DriverError::Navigation {
                url: before.to_string(),
                message: format!("browser error page {}", after),
            });
        }
        Ok(())
    }

    fn call(&self, node: &NodeHandle, function: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        let element = self.element(node)?;
        let result = element
            .call_js_fn(function, args, false)
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }
}

impl Driver for ChromeDriver {
    fn navigate(&mut self, url: &str, budget: Duration) -> Result<(), DriverError> {
        self.ensure_open()?;
        let started = Instant::now();
        self.budget = budget;
        self.tab.set_default_timeout(budget);

        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());

        // Old node ids are meaningless on the new document, even on failure.
        self.generation += 1;

        result
            .map(|_| ())
            .map_err(|e| navigation_failure(url, budget, started.elapsed(), e.to_string()))
    }

    fn current_url(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        Ok(self.tab.get_url())
    }

    fn title(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        self.tab
            .get_title()
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    fn find_all(
        &self,
        scope: Option<&NodeHandle>,
        locator: &Locator,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        self.ensure_open()?;

        // headless_chrome reports "no match" as an error; absence is normal
        // while polling, so every lookup failure maps to an empty result.
        let scoped_element;
        let found = match (scope, locator) {
            (None, Locator::Css(selector)) => self.tab.find_elements(selector),
            (None, Locator::XPath(expr)) => self.tab.find_elements_by_xpath(expr),
            (Some(node), Locator::Css(selector)) => self.element(node)?.find_elements(selector),
            (Some(node), Locator::XPath(expr)) => {
                scoped_element = self.element(node)?;
                scoped_element.find_elements_by_xpath(expr)
            }
        };

        match found {
            Ok(elements) => Ok(self.handles(elements)),
            Err(e) => {
                tracing::trace!(locator = %locator, error = %e, "Lookup returned no elements");
                Ok(Vec::new())
            }
        }
    }

    fn is_clickable(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        Ok(self.call(node, CLICKABLE_JS, Vec::new())?.as_bool().unwrap_or(false))
    }

    fn click(&mut self, node: &NodeHandle) -> Result<(), DriverError> {
        self.ensure_open()?;
        let before = self.tab.get_url();
        self.element(node)?
            .click()
            .map_err(|e| DriverError::Interaction(format!("click failed: {}", e)))?;
        self.follow_navigation(&before)
    }

    fn clear_and_type(&mut self, node: &NodeHandle, text: &str) -> Result<(), DriverError> {
        self.call(node, CLEAR_JS, Vec::new())?;
        self.element(node)?
            .type_into(text)
            .map(|_| ())
            .map_err(|e| DriverError::Interaction(format!("typing failed: {}", e)))
    }

    fn submit(&mut self, node: &NodeHandle) -> Result<(), DriverError> {
        self.element(node)?
            .focus()
            .map_err(|e| DriverError::Interaction(format!("focus failed: {}", e)))?;
        let before = self.tab.get_url();
        self.tab
            .press_key("Enter")
            .map_err(|e| DriverError::Interaction(format!("submit failed: {}", e)))?;
        self.follow_navigation(&before)
    }

    fn text(&self, node: &NodeHandle) -> Result<String, DriverError> {
        self.element(node)?
            .get_inner_text()
            .map_err(|e| DriverError::Interaction(e.to_string()))
    }

    fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>, DriverError> {
        match self.call(node, ATTRIBUTE_JS, vec![json!(name)])? {
            Value::String(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = self.tab.close(true);
        // Dropping the browser terminates the Chrome process.
        drop(browser);
        closed
            .map(|_| ())
            .map_err(|e| DriverError::Protocol(format!("failed to close tab: {}", e)))
    }
}
