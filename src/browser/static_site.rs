//! In-memory replay driver.
//!
//! Serves pre-captured HTML snapshots keyed by URL and emulates the handful
//! of interactions the pipeline needs: anchor clicks navigate, and submitting
//! an input performs a GET submission of its enclosing form. Elements can be
//! configured to appear only some time after the page loads, which mimics
//! script-rendered content.

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use url::Url;

use crate::browser::driver::{Driver, Locator, NodeHandle};
use crate::browser::session::{Session, SessionFactory};
use crate::utils::error::{DriverError, ScoutError};

static ANY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());

#[derive(Debug, Clone)]
struct Reveal {
    selector: String,
    after: Duration,
}

#[derive(Debug, Clone)]
struct StaticPage {
    html: String,
    load_delay: Duration,
    reveals: Vec<Reveal>,
}

#[derive(Debug, Default)]
struct SessionCounters {
    opened: AtomicUsize,
    open: AtomicUsize,
}

/// A set of page snapshots that can hand out any number of sessions.
#[derive(Debug, Clone, Default)]
pub struct StaticSite {
    pages: Arc<HashMap<String, StaticPage>>,
    broken: Arc<HashSet<String>>,
    counters: Arc<SessionCounters>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "page")]
    pages: Vec<ManifestPage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPage {
    url: String,
    file: PathBuf,
    #[serde(default)]
    load_delay_ms: u64,
    #[serde(default, rename = "reveal")]
    reveals: Vec<ManifestReveal>,
}

#[derive(Debug, Deserialize)]
struct ManifestReveal {
    selector: String,
    after_ms: u64,
}

fn page_key(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load snapshots listed in `<dir>/manifest.toml`:
    ///
    /// ```toml
    /// [[page]]
    /// url = "https://shop.test/"
    /// file = "home.html"
    ///
    /// [[page.reveal]]
    /// selector = "li.product-list-item"
    /// after_ms = 400
    /// ```
    pub fn from_dir(dir: &Path) -> Result<Self, ScoutError> {
        let manifest_text = std::fs::read_to_string(dir.join("manifest.toml"))?;
        let manifest: Manifest = toml::from_str(&manifest_text)?;

        let mut site = Self::new();
        for page in manifest.pages {
            let html = std::fs::read_to_string(dir.join(&page.file))?;
            site = site.with_page(&page.url, html);
            if page.load_delay_ms > 0 {
                site = site.with_load_delay(&page.url, Duration::from_millis(page.load_delay_ms));
            }
            for reveal in page.reveals {
                if !matches!(Locator::parse(&reveal.selector), Ok(Locator::Css(_))) {
                    return Err(ScoutError::InvalidSelector {
                        selector: reveal.selector,
                    });
                }
                site = site.with_reveal(
                    &page.url,
                    &reveal.selector,
                    Duration::from_millis(reveal.after_ms),
                );
            }
        }

        tracing::info!(dir = %dir.display(), pages = site.pages.len(), "Loaded page snapshots");
        Ok(site)
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.pages).insert(
            page_key(url),
            StaticPage {
                html: html.into(),
                load_delay: Duration::ZERO,
                reveals: Vec::new(),
            },
        );
        self
    }

    /// Make loading `url` take `delay`.
    pub fn with_load_delay(mut self, url: &str, delay: Duration) -> Self {
        if let Some(page) = Arc::make_mut(&mut self.pages).get_mut(&page_key(url)) {
            page.load_delay = delay;
        }
        self
    }

    /// Hide elements matching `selector` (and their subtrees) until `after`
    /// has elapsed since the page loaded.
    pub fn with_reveal(mut self, url: &str, selector: &str, after: Duration) -> Self {
        if let Some(page) = Arc::make_mut(&mut self.pages).get_mut(&page_key(url)) {
            page.reveals.push(Reveal {
                selector: selector.to_string(),
                after,
            });
        }
        self
    }

    /// Make every navigation to `url` fail, even if a snapshot exists.
    pub fn with_broken_link(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.broken).insert(page_key(url));
        self
    }

    /// Total sessions handed out so far.
    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Sessions handed out and not yet released.
    pub fn sessions_open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn open_driver(&self) -> StaticDriver {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        StaticDriver {
            site: self.clone(),
            current: None,
            generation: 0,
            closed: false,
            last_budget: Duration::from_secs(30),
        }
    }
}

impl SessionFactory for StaticSite {
    fn acquire(&self) -> Result<Session, ScoutError> {
        Ok(Session::new(Box::new(self.open_driver())))
    }
}

#[derive(Debug)]
struct LoadedPage {
    url: Url,
    html: String,
    loaded_at: Instant,
    reveals: Vec<Reveal>,
    values: HashMap<u64, String>,
}

/// [`Driver`] over a [`StaticSite`].
#[derive(Debug)]
pub struct StaticDriver {
    site: StaticSite,
    current: Option<LoadedPage>,
    generation: u64,
    closed: bool,
    last_budget: Duration,
}

/// Parsed view of the current page, rebuilt per call.
struct PageView<'p> {
    page: &'p LoadedPage,
    document: Html,
    generation: u64,
}

impl PageView<'_> {
    fn elements(&self) -> Vec<ElementRef<'_>> {
        self.document.select(&ANY_ELEMENT).collect()
    }

    fn element(&self, node: &NodeHandle) -> Result<ElementRef<'_>, DriverError> {
        if node.generation() != self.generation {
            return Err(DriverError::StaleHandle);
        }
        self.elements()
            .into_iter()
            .nth(node.id() as usize)
            .ok_or(DriverError::StaleHandle)
    }

    fn handle_of(&self, all: &[ElementRef<'_>], element: &ElementRef<'_>) -> Option<NodeHandle> {
        all.iter()
            .position(|candidate| candidate.id() == element.id())
            .map(|index| NodeHandle::new(index as u64, self.generation))
    }

    fn hidden_roots(&self) -> Vec<ElementRef<'_>> {
        let elapsed = self.page.loaded_at.elapsed();
        self.page
            .reveals
            .iter()
            .filter(|reveal| elapsed < reveal.after)
            .filter_map(|reveal| Selector::parse(&reveal.selector).ok())
            .flat_map(|selector| self.document.select(&selector).collect::<Vec<_>>())
            .collect()
    }

    fn is_hidden(&self, element: &ElementRef<'_>, hidden: &[ElementRef<'_>]) -> bool {
        hidden.iter().any(|root| {
            root.id() == element.id() || element.ancestors().any(|node| node.id() == root.id())
        })
    }

    fn resolve(&self, href: &str) -> Result<Url, DriverError> {
        self.page
            .url
            .join(href)
            .map_err(|e| DriverError::Interaction(format!("bad link '{}': {}", href, e)))
    }

    /// Target URL of a GET submission of the form enclosing `element`.
    fn form_submission(&self, element: &ElementRef<'_>) -> Result<Url, DriverError> {
        let form = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "form")
            .ok_or_else(|| DriverError::Interaction("element is not inside a form".to_string()))?;

        let mut target = match form.value().attr("action") {
            Some(action) => self.resolve(action)?,
            None => self.page.url.clone(),
        };

        let all = self.elements();
        let fields = Selector::parse("input[name], textarea[name], select[name]")
            .map_err(|e| DriverError::Interaction(format!("{:?}", e)))?;
        let mut pairs = Vec::new();
        for field in form.select(&fields) {
            let Some(name) = field.value().attr("name") else {
                continue;
            };
            let typed = self
                .handle_of(&all, &field)
                .and_then(|handle| self.page.values.get(&handle.id()).cloned());
            let value = typed
                .or_else(|| field.value().attr("value").map(str::to_string))
                .unwrap_or_default();
            pairs.push((name.to_string(), value));
        }

        target.set_query(None);
        if !pairs.is_empty() {
            let mut query = target.query_pairs_mut();
            for (name, value) in &pairs {
                query.append_pair(name, value);
            }
        }
        Ok(target)
    }
}

impl StaticDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn view(&self) -> Result<Option<PageView<'_>>, DriverError> {
        self.ensure_open()?;
        Ok(self.current.as_ref().map(|page| PageView {
            page,
            document: Html::parse_document(&page.html),
            generation: self.generation,
        }))
    }

    fn require_view(&self) -> Result<PageView<'_>, DriverError> {
        self.view()?.ok_or(DriverError::StaleHandle)
    }
}

impl Driver for StaticDriver {
    fn navigate(&mut self, url: &str, budget: Duration) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.last_budget = budget;
        self.generation += 1;
        self.current = None;

        let key = page_key(url);
        let parsed = Url::parse(url).map_err(|e| DriverError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let page = match self.site.pages.get(&key) {
            Some(page) if !self.site.broken.contains(&key) => page.clone(),
            _ => {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    message: "404 Not Found".to_string(),
                });
            }
        };

        if page.load_delay > budget {
            std::thread::sleep(budget);
            return Err(DriverError::LoadTimeout {
                url: url.to_string(),
                budget_ms: budget.as_millis() as u64,
            });
        }
        if !page.load_delay.is_zero() {
            std::thread::sleep(page.load_delay);
        }

        self.current = Some(LoadedPage {
            url: parsed,
            html: page.html,
            loaded_at: Instant::now(),
            reveals: page.reveals,
            values: HashMap::new(),
        });
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        Ok(self
            .current
            .as_ref()
            .map(|page| page.url.to_string())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    fn title(&self) -> Result<String, DriverError> {
        let Some(view) = self.view()? else {
            return Ok(String::new());
        };
        let title = Selector::parse("title").map_err(|e| DriverError::Protocol(format!("{:?}", e)))?;
        Ok(view
            .document
            .select(&title)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    fn find_all(
        &self,
        scope: Option<&NodeHandle>,
        locator: &Locator,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        let selector = match locator {
            Locator::Css(selector) => Selector::parse(selector).map_err(|e| {
                DriverError::InvalidSelector {
                    selector: selector.clone(),
                    message: format!("{:?}", e),
                }
            })?,
            Locator::XPath(expr) => {
                return Err(DriverError::UnsupportedLocator(format!(
                    "xpath is not available in replay mode: {}",
                    expr
                )));
            }
        };

        let Some(view) = self.view()? else {
            return Ok(Vec::new());
        };

        let all = view.elements();
        let hidden = view.hidden_roots();
        let matches: Vec<ElementRef<'_>> = match scope {
            Some(node) => view.element(node)?.select(&selector).collect(),
            None => view.document.select(&selector).collect(),
        };

        Ok(matches
            .iter()
            .filter(|element| !view.is_hidden(element, &hidden))
            .filter_map(|element| view.handle_of(&all, element))
            .collect())
    }

    fn is_clickable(&self, node: &NodeHandle) -> Result<bool, DriverError> {
        let view = self.require_view()?;
        let element = view.element(node)?;
        let attrs = element.value();
        let hidden = view.hidden_roots();
        Ok(!view.is_hidden(&element, &hidden)
            && attrs.attr("disabled").is_none()
            && attrs.attr("hidden").is_none()
            && attrs.attr("aria-disabled") != Some("true"))
    }

    fn click(&mut self, node: &NodeHandle) -> Result<(), DriverError> {
        let target = {
            let view = self.require_view()?;
            let element = view.element(node)?;
            let hidden = view.hidden_roots();
            if view.is_hidden(&element, &hidden) {
                return Err(DriverError::Interaction("element is not visible".to_string()));
            }

            let attrs = element.value();
            match (attrs.name(), attrs.attr("href"), attrs.attr("type")) {
                ("a", Some(href), _) => Some(view.resolve(href)?),
                ("button", _, Some("submit")) | ("input", _, Some("submit")) => {
                    Some(view.form_submission(&element)?)
                }
                _ => None,
            }
        };

        match target {
            Some(url) => {
                let budget = self.last_budget;
                self.navigate(url.as_str(), budget)
            }
            None => Ok(()),
        }
    }

    fn clear_and_type(&mut self, node: &NodeHandle, text: &str) -> Result<(), DriverError> {
        {
            let view = self.require_view()?;
            view.element(node)?;
        }
        if let Some(page) = self.current.as_mut() {
            page.values.insert(node.id(), text.to_string());
        }
        Ok(())
    }

    fn submit(&mut self, node: &NodeHandle) -> Result<(), DriverError> {
        let target = {
            let view = self.require_view()?;
            let element = view.element(node)?;
            view.form_submission(&element)?
        };
        let budget = self.last_budget;
        self.navigate(target.as_str(), budget)
    }

    fn text(&self, node: &NodeHandle) -> Result<String, DriverError> {
        let view = self.require_view()?;
        let element = view.element(node)?;
        Ok(element.text().collect::<Vec<_>>().join(" ").trim().to_string())
    }

    fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>, DriverError> {
        let view = self.require_view()?;
        let element = view.element(node)?;
        Ok(element.value().attr(name).map(str::to_string))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.current = None;
            self.site.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
