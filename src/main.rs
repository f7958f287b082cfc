use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use shelf_scout::browser::{ChromeLauncher, SessionFactory, StaticSite};
use shelf_scout::pipeline::Waiter;
use shelf_scout::sink::JsonFileSink;
use shelf_scout::utils::logging;
use shelf_scout::{AppConfig, Orchestrator, PipelineSettings};

/// Extract products and customer reviews from a storefront search.
#[derive(Debug, Parser)]
#[command(name = "shelf-scout", version, about)]
struct Args {
    /// Directory holding default.toml / {RUN_MODE}.toml / local.toml
    #[arg(long, default_value = "config")]
    config: PathBuf,

    /// Search term
    #[arg(long)]
    term: Option<String>,

    /// Site entry URL
    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    max_items: Option<usize>,

    #[arg(long)]
    max_reviews: Option<usize>,

    /// Parallel drill-down sessions (1 = sequential)
    #[arg(long)]
    workers: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Replay page snapshots from a directory with a manifest.toml instead of
    /// launching Chrome
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Output directory for the JSON files
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(term) = &self.term {
            config.site.search_term = term.clone();
        }
        if let Some(url) = &self.url {
            config.site.url = url.clone();
        }
        if let Some(max_items) = self.max_items {
            config.limits.max_items = max_items;
        }
        if let Some(max_reviews) = self.max_reviews {
            config.limits.max_reviews = max_reviews;
        }
        if let Some(workers) = self.workers {
            config.limits.workers = workers;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(output) = &self.output {
            config.output.data_dir = output.clone();
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn session_factory(
    args: &Args,
    config: &AppConfig,
    settings: &PipelineSettings,
) -> anyhow::Result<Arc<dyn SessionFactory>> {
    if let Some(dir) = &args.replay {
        let site = StaticSite::from_dir(dir)
            .with_context(|| format!("failed to load snapshots from {}", dir.display()))?;
        return Ok(Arc::new(site));
    }

    // The browser connection must outlive the longest single wait, retries included.
    let idle_timeout = Waiter::from_settings(&settings.wait)
        .max_wait(config.timeouts.longest_wait())
        .saturating_add(Duration::from_secs(30));
    Ok(Arc::new(ChromeLauncher::new(config.browser.clone(), idle_timeout)))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(&args, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &Args, config: &AppConfig) -> anyhow::Result<bool> {
    info!("Starting Shelf Scout...");

    let settings = PipelineSettings::from_config(config)?;
    let factory = session_factory(args, config, &settings)?;
    let sink = JsonFileSink::new(&config.output);

    let orchestrator = Orchestrator::new(settings, factory);
    let report = orchestrator.run_and_persist(&sink).await?;

    if let Some(e) = &report.error {
        error!(error = %e, "Run aborted");
    }
    info!(
        found = report.summary.found,
        extracted = report.summary.extracted,
        skipped = report.summary.skipped,
        products = %sink.products_path().display(),
        "Shutting down..."
    );

    Ok(report.is_success())
}
