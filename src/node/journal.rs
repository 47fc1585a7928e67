//! Filesystem event journal.
//!
//! Events are appended as one JSON object per line to `journal.ndjson`
//! under the journal directory. The file is opened by the start hook and
//! flushed by the stop hook.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::config::schema::JournalConfig;

const JOURNAL_FILE: &str = "journal.ndjson";

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal is not open")]
    Closed,

    #[error("journal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode journal entry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub system: String,
    pub event: String,
    pub data: Value,
}

pub struct FsJournal {
    dir: PathBuf,
    enabled: bool,
    disabled: HashSet<String>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FsJournal {
    pub fn new(dir: impl Into<PathBuf>, config: &JournalConfig) -> Self {
        Self {
            dir: dir.into(),
            enabled: config.enabled,
            disabled: config.disabled_events.iter().cloned().collect(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether events of this type reach the journal.
    pub fn is_enabled(&self, system: &str, event: &str) -> bool {
        self.enabled && !self.disabled.contains(&format!("{system}:{event}"))
    }

    pub async fn open(&self) -> Result<(), JournalError> {
        if !self.enabled {
            tracing::info!("Journal disabled");
            return Ok(());
        }
        fs::create_dir_all(&self.dir).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())
            .await?;
        *self.writer.lock().await = Some(BufWriter::new(file));
        tracing::info!(path = %self.path().display(), "Journal opened");
        Ok(())
    }

    /// Append an event. Returns `false` when the event type is filtered out.
    pub async fn record(&self, system: &str, event: &str, data: Value) -> Result<bool, JournalError> {
        if !self.is_enabled(system, event) {
            return Ok(false);
        }
        let entry = JournalEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            system: system.to_string(),
            event: event.to_string(),
            data,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(JournalError::Closed)?;
        writer.write_all(&line).await?;
        Ok(true)
    }

    /// Flush buffered entries to disk and close the file.
    pub async fn close(&self) -> Result<(), JournalError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
            tracing::info!(path = %self.path().display(), "Journal closed");
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("marketd-journal-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_record_and_flush() {
        let dir = temp_dir("record");
        let journal = FsJournal::new(&dir, &JournalConfig::default());
        journal.open().await.unwrap();

        assert!(journal.record("deals", "accepted", json!({ "id": 1 })).await.unwrap());
        assert!(journal.record("deals", "sealed", json!({ "id": 1 })).await.unwrap());
        journal.close().await.unwrap();
        assert!(!journal.is_open().await);

        let content = std::fs::read_to_string(journal.path()).unwrap();
        let entries: Vec<JournalEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event, "sealed");
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_disabled_events_filtered() {
        let dir = temp_dir("filter");
        let config = JournalConfig {
            enabled: true,
            disabled_events: vec!["retrieval:progress".to_string()],
        };
        let journal = FsJournal::new(&dir, &config);
        journal.open().await.unwrap();

        assert!(!journal.record("retrieval", "progress", Value::Null).await.unwrap());
        assert!(journal.record("retrieval", "complete", Value::Null).await.unwrap());
        journal.close().await.unwrap();
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_record_before_open_fails() {
        let journal = FsJournal::new(temp_dir("closed"), &JournalConfig::default());
        let err = journal.record("deals", "accepted", Value::Null).await.unwrap_err();
        assert!(matches!(err, JournalError::Closed));
    }
}
