//! Unfinished-download records, kept so an interrupted download can be restarted.
//!
//! A record is written when a download starts and removed only once yt-dlp
//! exits successfully; anything left in the file was cancelled, failed, or
//! cut short by the process dying.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

const FILE_NAME: &str = "unfinished.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
  pub url: String,
  pub format_id: String,
  pub title: String,
  pub timestamp: DateTime<Utc>,
}

impl RecoveryRecord {
  pub fn new(url: &str, format_id: &str, title: &str) -> Self {
    Self { url: url.to_string(), format_id: format_id.to_string(), title: title.to_string(), timestamp: Utc::now() }
  }
}

/// JSON-file store. Cloning shares the same file.
#[derive(Debug, Clone, Default)]
pub struct RecoveryStore {
  /// `None` when no data directory is available; the store is then a no-op.
  path: Option<PathBuf>,
}

impl RecoveryStore {
  /// `<data_dir>/unfinished.json`.
  pub fn open_default() -> Self {
    let path = ProjectDirs::from("", "", "yd").map(|d| d.data_dir().join(FILE_NAME));
    Self { path }
  }

  #[cfg(test)]
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { path: Some(path.into()) }
  }

  #[cfg(test)]
  pub fn disabled() -> Self {
    Self { path: None }
  }

  #[cfg(test)]
  pub fn path(&self) -> Option<&std::path::Path> {
    self.path.as_deref()
  }

  /// All records in file order. A missing file is empty; a corrupt one is
  /// logged and treated as empty.
  pub fn load(&self) -> Vec<RecoveryRecord> {
    let Some(path) = &self.path else { return Vec::new() };
    let content = match std::fs::read_to_string(path) {
      Ok(c) => c,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
      Err(e) => {
        warn!(path = %path.display(), err = %e, "recovery: failed to read store");
        return Vec::new();
      }
    };
    if content.trim().is_empty() {
      return Vec::new();
    }
    serde_json::from_str(&content).unwrap_or_else(|e| {
      warn!(path = %path.display(), err = %e, "recovery: store is corrupt, ignoring");
      Vec::new()
    })
  }

  /// Records for the resume list, most recent first.
  pub fn newest_first(&self) -> Vec<RecoveryRecord> {
    let mut records = self.load();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
  }

  /// Insert `record`, replacing any existing record for the same URL.
  pub fn add(&self, record: RecoveryRecord) -> Result<()> {
    let mut records = self.load();
    records.retain(|r| r.url != record.url);
    records.push(record);
    self.save(&records)
  }

  pub fn remove(&self, url: &str) -> Result<()> {
    let mut records = self.load();
    let before = records.len();
    records.retain(|r| r.url != url);
    if records.len() == before {
      return Ok(());
    }
    self.save(&records)
  }

  #[cfg(test)]
  pub fn contains(&self, url: &str) -> bool {
    self.load().iter().any(|r| r.url == url)
  }

  fn save(&self, records: &[RecoveryRecord]) -> Result<()> {
    let Some(path) = &self.path else { return Ok(()) };
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(records).context("Failed to serialize recovery records")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
  }
}
