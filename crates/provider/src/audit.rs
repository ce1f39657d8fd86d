//! Inference audit trail
//!
//! One record per gateway call, holding the request and either the response
//! or the error. Records are keyed by session id and a strictly increasing
//! sequence number.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One request/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub session: String,
    pub timestamp: DateTime<Utc>,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> std::io::Result<()>;
}

/// Writes `<dir>/<session>/<sequence>.json`, one file per call
pub struct FileAuditLog {
    dir: PathBuf,
}

impl FileAuditLog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, session: &str, sequence: u64) -> PathBuf {
        let safe_session = session.replace(['/', '\\', ':'], "_");
        self.dir
            .join(safe_session)
            .join(format!("{:06}.json", sequence))
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    async fn record(&self, record: &AuditRecord) -> std::io::Result<()> {
        let path = self.record_path(&record.session, record.sequence);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(record)?;
        // create_new: an existing record is never overwritten
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;

        debug!("Audit record {} written to {:?}", record.sequence, path);
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, record: &AuditRecord) -> std::io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
