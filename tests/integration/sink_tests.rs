use super::*;
use shelf_scout::config::OutputConfig;
use shelf_scout::models::{RunState, RunSummary};
use shelf_scout::sink::{JsonFileSink, MemorySink, RecordSink};
use tempfile::tempdir;

fn file_sink(dir: &std::path::Path) -> JsonFileSink {
    JsonFileSink::new(&OutputConfig {
        data_dir: dir.to_path_buf(),
        ..OutputConfig::default()
    })
}

async fn run_into(site: &StaticSite, config: &AppConfig, sink: &dyn RecordSink) -> anyhow::Result<RunReport> {
    let settings = PipelineSettings::from_config(config)?;
    let orchestrator = Orchestrator::new(settings, Arc::new(site.clone()));
    Ok(orchestrator.run_and_persist(sink).await?)
}

#[tokio::test]
async fn test_output_artifact_shape() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let sink = file_sink(dir.path());
    let mut product = ProductFixture::new(1, 1);
    product.price = None;
    let site = storefront("laptop", &[product]);

    run_into(&site, &get_test_config(), &sink).await?;

    let products: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(sink.products_path())?)?;
    assert_eq!(
        products,
        serde_json::json!([{
            "title": "Laptop 1",
            "price": "N/A",
            "link": detail_url(1),
            "rating": "4.1",
            "reviewCount": "(1 Reviews)",
            "reviews": [{
                "rating": "Rated 2 out of 5 stars",
                "title": "Review title 1",
                "content": "Review body 1",
                "postedBy": "Reviewer1"
            }]
        }])
    );
    println!("✓ Output artifact has the expected fields");

    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_are_byte_identical() -> anyhow::Result<()> {
    let products: Vec<ProductFixture> = (1..=3).map(|n| ProductFixture::new(n, n)).collect();
    let site = storefront("laptop", &products);
    let config = get_test_config();

    let first_dir = tempdir()?;
    let first = file_sink(first_dir.path());
    run_into(&site, &config, &first).await?;

    let second_dir = tempdir()?;
    let second = file_sink(second_dir.path());
    run_into(&site, &config, &second).await?;

    let first_bytes = std::fs::read(first.products_path())?;
    let second_bytes = std::fs::read(second.products_path())?;
    assert!(!first_bytes.is_empty());
    assert_eq!(first_bytes, second_bytes);

    Ok(())
}

#[tokio::test]
async fn test_aborted_run_writes_empty_array_and_summary() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let sink = file_sink(dir.path());
    let site = storefront("laptop", &[ProductFixture::new(1, 1)]);
    let mut config = get_test_config();
    config.selectors.search_box = "textarea#missing".to_string();

    let report = run_into(&site, &config, &sink).await?;
    assert!(!report.is_success());

    assert_eq!(std::fs::read_to_string(sink.products_path())?, "[]");
    let summary: RunSummary = serde_json::from_str(&std::fs::read_to_string(sink.summary_path())?)?;
    assert_eq!(summary.state, RunState::Aborted);
    assert_eq!(summary.found, 0);
    assert_eq!(summary.extracted, 0);
    assert!(summary.abort_reason.unwrap().contains("textarea#missing"));

    Ok(())
}

#[tokio::test]
async fn test_summary_reports_skipped_items() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    let mut broken = ProductFixture::new(1, 1);
    broken.broken = true;
    let site = storefront("laptop", &[broken, ProductFixture::new(2, 1)]);

    run_into(&site, &get_test_config(), &sink).await?;

    let (records, summary) = sink.last().expect("one batch persisted");
    assert_eq!(records.len(), 1);
    assert_eq!(summary.found, 2);
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.items.len(), 2);
    assert!(summary.items[0].reason.is_some());
    assert_eq!(summary.items[1].reviews, 1);

    Ok(())
}
