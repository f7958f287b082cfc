use super::*;
use shelf_scout::browser::{Session, SessionFactory};
use shelf_scout::models::{ItemStatus, RunState};
use shelf_scout::ScoutError;
use std::time::Instant;

#[tokio::test]
async fn test_missing_review_trigger_keeps_record() -> anyhow::Result<()> {
    let mut second = ProductFixture::new(2, 3);
    second.has_trigger = false;
    let products = vec![ProductFixture::new(1, 2), second, ProductFixture::new(3, 1)];
    let site = storefront("laptop", &products);

    let report = run_pipeline(&site, &get_test_config()).await?;

    assert_eq!(report.summary.state, RunState::Finalized);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.records[0].reviews.len(), 2);
    assert!(report.records[1].reviews.is_empty());
    assert_eq!(report.records[1].title.as_str(), "Laptop 2");
    assert_eq!(report.records[2].reviews.len(), 1);
    assert_eq!(report.records[2].reviews[0].content.as_str(), "Review body 1");
    println!("✓ Item without review trigger kept with empty reviews");

    Ok(())
}

#[tokio::test]
async fn test_detail_fields_are_extracted() -> anyhow::Result<()> {
    let site = storefront("laptop", &[ProductFixture::new(1, 2)]);

    let report = run_pipeline(&site, &get_test_config()).await?;

    let record = &report.records[0];
    assert_eq!(record.price.as_str(), "$199.99");
    assert_eq!(record.link.as_str(), detail_url(1));
    assert_eq!(record.rating.as_str(), "4.1");
    assert_eq!(record.review_count.as_str(), "(2 Reviews)");
    assert_eq!(record.reviews[1].posted_by.as_str(), "Reviewer2");

    Ok(())
}

#[tokio::test]
async fn test_missing_search_box_aborts() -> anyhow::Result<()> {
    let site = storefront("laptop", &[ProductFixture::new(1, 1)]);
    let mut config = get_test_config();
    config.selectors.search_box = "input#does-not-exist".to_string();

    let started = Instant::now();
    let report = run_pipeline(&site, &config).await?;

    assert_eq!(report.summary.state, RunState::Aborted);
    assert!(matches!(report.error, Some(ScoutError::Search { .. })));
    assert!(report.records.is_empty());
    assert_eq!(report.summary.found, 0);
    assert_eq!(report.summary.extracted, 0);
    assert!(report.summary.abort_reason.is_some());
    assert!(started.elapsed() < Duration::from_millis(200) + Duration::from_millis(100) + slack());
    assert_eq!(site.sessions_open(), 0);
    println!("✓ Missing search box aborted the run");

    Ok(())
}

#[tokio::test]
async fn test_unreachable_site_aborts() -> anyhow::Result<()> {
    let site = storefront("laptop", &[]);
    let mut config = get_test_config();
    config.site.url = "https://elsewhere.test/".to_string();

    let report = run_pipeline(&site, &config).await?;

    assert_eq!(report.summary.state, RunState::Aborted);
    assert!(matches!(report.error, Some(ScoutError::Navigation(_))));
    assert_eq!(site.sessions_open(), 0);

    Ok(())
}

#[tokio::test]
async fn test_empty_listing_aborts() -> anyhow::Result<()> {
    let site = storefront("laptop", &[]);

    let report = run_pipeline(&site, &get_test_config()).await?;

    assert_eq!(report.summary.state, RunState::Aborted);
    assert!(matches!(report.error, Some(ScoutError::ListingTimeout { .. })));
    assert!(report.records.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_missing_posted_by_is_sentinel() -> anyhow::Result<()> {
    let mut product = ProductFixture::new(1, 2);
    product.reviews[0].posted_by = None;
    let site = storefront("laptop", &[product]);

    let report = run_pipeline(&site, &get_test_config()).await?;

    let reviews = &report.records[0].reviews;
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].posted_by.as_str(), "N/A");
    assert_eq!(reviews[0].content.as_str(), "Review body 1");
    assert_eq!(reviews[1].posted_by.as_str(), "Reviewer2");

    Ok(())
}

#[tokio::test]
async fn test_dead_link_is_isolated() -> anyhow::Result<()> {
    let mut broken = ProductFixture::new(2, 2);
    broken.broken = true;
    let products = vec![ProductFixture::new(1, 1), broken, ProductFixture::new(3, 2)];
    let site = storefront("laptop", &products);

    let report = run_pipeline(&site, &get_test_config()).await?;

    assert_eq!(report.summary.state, RunState::Finalized);
    assert_eq!(report.summary.found, 3);
    assert_eq!(report.summary.extracted, 2);
    assert_eq!(report.summary.skipped, 1);

    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Laptop 1", "Laptop 3"]);
    assert_eq!(report.records[1].reviews.len(), 2);

    let skipped = &report.summary.items[1];
    assert_eq!(skipped.status, ItemStatus::Skipped);
    assert_eq!(skipped.title.as_str(), "Laptop 2");
    assert!(skipped.reason.as_deref().unwrap().starts_with("navigation failed"));
    println!("✓ Dead link on item 2 skipped, siblings intact");

    Ok(())
}

#[tokio::test]
async fn test_review_cap() -> anyhow::Result<()> {
    let site = storefront("laptop", &[ProductFixture::new(1, 8)]);
    let mut config = get_test_config();
    config.limits.max_reviews = 5;

    let report = run_pipeline(&site, &config).await?;

    let reviews = &report.records[0].reviews;
    assert_eq!(reviews.len(), 5);
    assert_eq!(reviews[4].title.as_str(), "Review title 5");

    Ok(())
}

#[tokio::test]
async fn test_item_cap() -> anyhow::Result<()> {
    let products: Vec<ProductFixture> = (1..=6).map(|n| ProductFixture::new(n, 0)).collect();
    let site = storefront("laptop", &products);
    let mut config = get_test_config();
    config.limits.max_items = 4;

    let report = run_pipeline(&site, &config).await?;

    assert_eq!(report.summary.found, 4);
    assert_eq!(report.records.len(), 4);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_matches_sequential() -> anyhow::Result<()> {
    let mut products: Vec<ProductFixture> = (1..=6).map(|n| ProductFixture::new(n, n % 3)).collect();
    products[3].has_trigger = false;
    let site = storefront("laptop", &products)
        .with_load_delay(&detail_url(1), Duration::from_millis(150))
        .with_load_delay(&detail_url(2), Duration::from_millis(80));

    let sequential = run_pipeline(&site, &get_test_config()).await?;

    let mut config = get_test_config();
    config.limits.workers = 3;
    let parallel = run_pipeline(&site, &config).await?;

    assert_eq!(parallel.records, sequential.records);
    let positions: Vec<usize> = parallel.summary.items.iter().map(|i| i.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(site.sessions_open(), 0);
    println!("✓ Parallel drill-down preserved listing order");

    Ok(())
}

#[tokio::test]
async fn test_delayed_rendering_is_awaited() -> anyhow::Result<()> {
    let site = storefront("laptop", &[ProductFixture::new(1, 2)])
        .with_reveal(&search_url("laptop"), "li.product-list-item", Duration::from_millis(120))
        .with_reveal(&reviews_url(1), "li.border-light", Duration::from_millis(60));
    let mut config = get_test_config();
    config.timeouts.listing = 1_000;
    config.timeouts.review_items = 1_000;

    let report = run_pipeline(&site, &config).await?;

    assert_eq!(report.summary.state, RunState::Finalized);
    assert_eq!(report.records[0].reviews.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_run_time_is_bounded_by_wait_budgets() -> anyhow::Result<()> {
    // Every product lacks a trigger, so each one waits out the full budget.
    let products: Vec<ProductFixture> = (1..=3)
        .map(|n| {
            let mut product = ProductFixture::new(n, 1);
            product.has_trigger = false;
            product
        })
        .collect();
    let site = storefront("laptop", &products);
    let config = get_test_config();

    let started = Instant::now();
    let report = run_pipeline(&site, &config).await?;
    let elapsed = started.elapsed();

    let per_item = Duration::from_millis(config.timeouts.review_trigger);
    assert_eq!(report.records.len(), 3);
    assert!(elapsed >= per_item * 3);
    assert!(elapsed < per_item * 3 + slack() * 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_failures_skip_items() -> anyhow::Result<()> {
    struct ListingOnly {
        site: StaticSite,
    }

    impl SessionFactory for ListingOnly {
        fn acquire(&self) -> Result<Session, ScoutError> {
            if self.site.sessions_opened() == 0 {
                self.site.acquire()
            } else {
                Err(ScoutError::SessionInit("chrome exited".to_string()))
            }
        }
    }

    let site = storefront("laptop", &[ProductFixture::new(1, 1), ProductFixture::new(2, 1)]);
    let mut config = get_test_config();
    config.limits.workers = 2;
    let settings = PipelineSettings::from_config(&config)?;
    let factory = ListingOnly { site: site.clone() };

    let report = Orchestrator::new(settings, Arc::new(factory)).run().await;

    assert_eq!(report.summary.state, RunState::Finalized);
    assert_eq!(report.summary.found, 2);
    assert_eq!(report.summary.skipped, 2);
    assert!(report.summary.items.iter().all(|item| {
        item.reason
            .as_deref()
            .is_some_and(|reason| reason.starts_with("session unavailable"))
    }));
    assert_eq!(site.sessions_open(), 0);

    Ok(())
}

#[tokio::test]
async fn test_all_sessions_released() -> anyhow::Result<()> {
    let site = storefront("laptop", &[ProductFixture::new(1, 1), ProductFixture::new(2, 1)]);

    run_pipeline(&site, &get_test_config()).await?;

    assert_eq!(site.sessions_opened(), 1);
    assert_eq!(site.sessions_open(), 0);

    Ok(())
}
