use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::config::OutputConfig;
use crate::models::{ProductRecord, RunSummary};
use crate::utils::error::Result;

/// Receives the finished record set and run summary.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn persist(&self, records: &[ProductRecord], summary: &RunSummary) -> Result<()>;
}

/// Writes the records and the summary as pretty-printed JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    data_dir: PathBuf,
    products_file: String,
    summary_file: String,
}

impl JsonFileSink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            products_file: config.products_file.clone(),
            summary_file: config.summary_file.clone(),
        }
    }

    pub fn products_path(&self) -> PathBuf {
        self.data_dir.join(&self.products_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.data_dir.join(&self.summary_file)
    }
}

/// Write `contents` next to `path` and rename it into place.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn persist(&self, records: &[ProductRecord], summary: &RunSummary) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let products = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.products_path(), &products).await?;

        let summary_json = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.summary_path(), &summary_json).await?;

        info!(
            products = %self.products_path().display(),
            summary = %self.summary_path().display(),
            records = records.len(),
            "Results written"
        );
        Ok(())
    }
}

/// Keeps every persisted batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<(Vec<ProductRecord>, RunSummary)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(Vec<ProductRecord>, RunSummary)> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<(Vec<ProductRecord>, RunSummary)> {
        self.batches().pop()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn persist(&self, records: &[ProductRecord], summary: &RunSummary) -> Result<()> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((records.to_vec(), summary.clone()));
        Ok(())
    }
}
