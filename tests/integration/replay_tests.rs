use super::*;
use shelf_scout::models::RunState;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn demo_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join("replay")
}

fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[tokio::test]
async fn test_bundled_config_is_valid() -> anyhow::Result<()> {
    let config = AppConfig::load(&config_dir())?;
    config.validate()?;

    assert_eq!(config.site.search_term, "laptop");
    assert_eq!(config.limits.max_items, 50);
    println!("✓ Bundled configuration validated");

    Ok(())
}

#[tokio::test]
async fn test_replay_demo_snapshots() -> anyhow::Result<()> {
    let site = StaticSite::from_dir(&demo_dir())?;

    let mut config = get_test_config();
    config.timeouts.listing = 2_000;
    config.timeouts.review_items = 1_000;
    let report = run_pipeline(&site, &config).await?;

    assert_eq!(report.summary.state, RunState::Finalized);
    assert_eq!(report.summary.found, 3);
    assert_eq!(report.summary.extracted, 2);
    assert_eq!(report.summary.skipped, 1);

    let dell = &report.records[0];
    assert!(dell.title.as_str().starts_with("Dell - XPS 13"));
    assert_eq!(dell.price.as_str(), "$1,099.99");
    assert_eq!(dell.rating.as_str(), "4.6");
    assert_eq!(dell.reviews.len(), 2);
    assert_eq!(dell.reviews[0].posted_by.as_str(), "Posted by MarcoP");
    assert_eq!(dell.reviews[1].posted_by.as_str(), "N/A");

    let hp = &report.records[1];
    assert_eq!(hp.price.as_str(), "$449.99");
    assert!(hp.reviews.is_empty());

    let lenovo = &report.summary.items[2];
    assert_eq!(lenovo.reason.as_deref(), Some("missing link"));
    assert!(lenovo.link.is_missing());

    Ok(())
}

#[test]
fn test_manifest_rejects_xpath_reveal() -> anyhow::Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("page.html"), "<html><body></body></html>")?;
    std::fs::write(
        dir.path().join("manifest.toml"),
        r#"
            [[page]]
            url = "https://shop.test/"
            file = "page.html"

            [[page.reveal]]
            selector = "//li"
            after_ms = 10
        "#,
    )?;

    assert!(StaticSite::from_dir(dir.path()).is_err());

    Ok(())
}
