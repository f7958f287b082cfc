// Integration tests for Shelf Scout
// These tests drive the whole pipeline against an in-memory storefront

pub mod pipeline_tests;
pub mod replay_tests;
pub mod sink_tests;

use std::sync::Arc;
use std::time::Duration;

use shelf_scout::browser::StaticSite;
use shelf_scout::config::AppConfig;
use shelf_scout::{Orchestrator, PipelineSettings, RunReport};

pub const BASE: &str = "https://shop.test";

/// One review as it appears on a review page.
#[derive(Debug, Clone)]
pub struct ReviewFixture {
    pub rating: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub posted_by: Option<String>,
}

impl ReviewFixture {
    pub fn full(n: usize) -> Self {
        Self {
            rating: Some(format!("Rated {} out of 5 stars", n % 5 + 1)),
            title: Some(format!("Review title {}", n)),
            content: Some(format!("Review body {}", n)),
            posted_by: Some(format!("Reviewer{}", n)),
        }
    }

    fn html(&self) -> String {
        let part = |value: &Option<String>, tag: &str| {
            value
                .as_ref()
                .map(|v| tag.replace("{}", v))
                .unwrap_or_default()
        };
        format!(
            "<li class=\"w-full py-300 py-sm-200 border-light\">{}{}{}{}</li>",
            part(&self.rating, "<span class=\"sr-only\">{}</span>"),
            part(&self.title, "<h4 class=\"body-copy-lg\">{}</h4>"),
            part(&self.content, "<p class=\"body-copy-lg\">{}</p>"),
            part(&self.posted_by, "<p data-testid=\"posted-by\">{}</p>"),
        )
    }
}

/// One product of the fixture storefront.
#[derive(Debug, Clone)]
pub struct ProductFixture {
    pub title: String,
    pub price: Option<String>,
    pub reviews: Vec<ReviewFixture>,
    pub has_trigger: bool,
    pub broken: bool,
}

impl ProductFixture {
    pub fn new(n: usize, reviews: usize) -> Self {
        Self {
            title: format!("Laptop {}", n),
            price: Some(format!("${}99.99", n)),
            reviews: (1..=reviews).map(ReviewFixture::full).collect(),
            has_trigger: true,
            broken: false,
        }
    }
}

pub fn detail_url(n: usize) -> String {
    format!("{}/site/p/{}.p", BASE, n)
}

pub fn reviews_url(n: usize) -> String {
    format!("{}/site/reviews/{}", BASE, n)
}

pub fn search_url(term: &str) -> String {
    format!("{}/site/searchpage.jsp?st={}", BASE, term)
}

fn home_page() -> String {
    r#"<html><head><title>Shop Test</title></head><body>
        <a class="us-link" href="/?intl=nosplash">United States</a>
        <form action="/site/searchpage.jsp">
            <textarea id="autocomplete-search-bar" name="st"></textarea>
        </form>
    </body></html>"#
        .to_string()
}

fn listing_page(products: &[ProductFixture]) -> String {
    let items: String = products
        .iter()
        .enumerate()
        .map(|(i, product)| {
            let price = product
                .price
                .as_ref()
                .map(|p| {
                    format!(
                        "<div data-testid=\"price-block-customer-price\"><span>{}</span></div>",
                        p
                    )
                })
                .unwrap_or_default();
            format!(
                "<li class=\"product-list-item\">\
                    <h2 class=\"product-title\">{}</h2>{}\
                    <a class=\"product-list-item-link\" href=\"/site/p/{}.p\">View</a>\
                 </li>",
                product.title,
                price,
                i + 1
            )
        })
        .collect();
    format!(
        "<html><head><title>Results</title></head><body><ol>{}</ol></body></html>",
        items
    )
}

fn detail_page(n: usize, product: &ProductFixture) -> String {
    let trigger = if product.has_trigger {
        format!(
            "<a class=\"see-all-reviews\" href=\"/site/reviews/{}\">See All Customer Reviews</a>",
            n
        )
    } else {
        String::new()
    };
    format!(
        "<html><head><title>{}</title></head><body>\
            <h1>{}</h1>\
            <div class=\"ugc-rating\"><span>4.{}</span></div>\
            <span class=\"review-count\">({} Reviews)</span>{}\
         </body></html>",
        product.title,
        product.title,
        n,
        product.reviews.len(),
        trigger
    )
}

fn reviews_page(product: &ProductFixture) -> String {
    let reviews: String = product.reviews.iter().map(ReviewFixture::html).collect();
    format!(
        "<html><body>\
            <h1 class=\"c-section-title heading-5 v-fw-medium\">Customer reviews</h1>\
            <ul>{}</ul>\
         </body></html>",
        reviews
    )
}

/// Build a storefront: home page, search results for `term`, one detail page
/// and one review page per product.
pub fn storefront(term: &str, products: &[ProductFixture]) -> StaticSite {
    let mut site = StaticSite::new()
        .with_page(&format!("{}/", BASE), home_page())
        .with_page(&format!("{}/?intl=nosplash", BASE), home_page())
        .with_page(&search_url(term), listing_page(products));

    for (i, product) in products.iter().enumerate() {
        let n = i + 1;
        site = site
            .with_page(&detail_url(n), detail_page(n, product))
            .with_page(&reviews_url(n), reviews_page(product));
        if product.broken {
            site = site.with_broken_link(&detail_url(n));
        }
    }
    site
}

/// Default configuration pointed at the fixture storefront, with short waits.
pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.site.url = format!("{}/", BASE);
    config.site.search_term = "laptop".to_string();
    config.selectors.detail_rating = Some("div.ugc-rating span".to_string());
    config.selectors.detail_review_count = Some("span.review-count".to_string());
    config.selectors.review_trigger = "a.see-all-reviews".to_string();
    config.timeouts.page_load = 2_000;
    config.timeouts.consent_click = 100;
    config.timeouts.search_box = 200;
    config.timeouts.listing = 200;
    config.timeouts.detail_fields = 100;
    config.timeouts.review_trigger = 150;
    config.timeouts.review_page_ready = 100;
    config.timeouts.review_items = 100;
    config.timeouts.poll_interval = 10;
    config
}

pub async fn run_pipeline(site: &StaticSite, config: &AppConfig) -> anyhow::Result<RunReport> {
    config.validate()?;
    let settings = PipelineSettings::from_config(config)?;
    let orchestrator = Orchestrator::new(settings, Arc::new(site.clone()));
    Ok(orchestrator.run().await)
}

/// Elapsed-time slack allowed on top of configured wait budgets.
pub fn slack() -> Duration {
    Duration::from_millis(750)
}
