//! Query history: one query per line, most recent first, de-duplicated.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::warn;

use crate::constants::constants;

#[derive(Debug, Default)]
pub struct History {
  path: Option<PathBuf>,
  entries: Vec<String>,
  /// Index into `entries` while walking with Up/Down.
  cursor: Option<usize>,
  /// The text that was in the input before walking started.
  draft: String,
}

impl History {
  /// `<data_dir>/history`, loaded eagerly.
  pub fn open_default() -> Self {
    match ProjectDirs::from("", "", "yd") {
      Some(dirs) => Self::load(dirs.data_dir().join("history")),
      None => Self::default(),
    }
  }

  pub fn load(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let entries = match std::fs::read_to_string(&path) {
      Ok(content) => parse(&content),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
      Err(e) => {
        warn!(path = %path.display(), err = %e, "history: failed to read");
        Vec::new()
      }
    };
    Self { path: Some(path), entries, ..Self::default() }
  }

  /// In-memory history that never touches disk.
  #[cfg(test)]
  pub fn in_memory(entries: Vec<String>) -> Self {
    Self { entries, ..Self::default() }
  }

  #[cfg(test)]
  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  /// Record a submitted query at the front and persist. Resets navigation.
  pub fn push(&mut self, query: &str) {
    self.reset_navigation();
    let query = query.trim();
    if query.is_empty() {
      return;
    }
    self.entries.retain(|e| e != query);
    self.entries.insert(0, query.to_string());
    self.entries.truncate(constants().history_cap);
    if let Err(e) = self.save() {
      warn!(err = %e, "history: failed to save");
    }
  }

  fn save(&self) -> Result<()> {
    let Some(path) = &self.path else { return Ok(()) };
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, self.entries.join("\n")).with_context(|| format!("Failed to write {}", path.display()))
  }

  // --- Navigation ---

  /// Step to an older entry. `current` is remembered as the draft on the first step.
  pub fn older(&mut self, current: &str) -> Option<&str> {
    if self.entries.is_empty() {
      return None;
    }
    let next = match self.cursor {
      None => {
        self.draft = current.to_string();
        0
      }
      Some(i) => (i + 1).min(self.entries.len() - 1),
    };
    self.cursor = Some(next);
    self.entries.get(next).map(String::as_str)
  }

  /// Step to a newer entry; past the newest, the draft comes back.
  pub fn newer(&mut self) -> Option<String> {
    match self.cursor {
      None => None,
      Some(0) => {
        self.cursor = None;
        Some(std::mem::take(&mut self.draft))
      }
      Some(i) => {
        self.cursor = Some(i - 1);
        self.entries.get(i - 1).cloned()
      }
    }
  }

  pub fn reset_navigation(&mut self) {
    self.cursor = None;
    self.draft.clear();
  }
}

fn parse(content: &str) -> Vec<String> {
  let mut entries: Vec<String> = Vec::new();
  for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
    if !entries.iter().any(|e| e == line) {
      entries.push(line.to_string());
    }
  }
  entries.truncate(constants().history_cap);
  entries
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- persistence ---

  #[test]
  fn push_dedups_and_persists_most_recent_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("history");
    let mut h = History::load(&path);
    h.push("rust");
    h.push("  lofi  ");
    h.push("rust");
    assert_eq!(h.entries(), ["rust", "lofi"]);

    let reloaded = History::load(&path);
    assert_eq!(reloaded.entries(), ["rust", "lofi"]);
  }

  #[test]
  fn blank_queries_are_not_recorded() {
    let mut h = History::in_memory(vec![]);
    h.push("   ");
    assert!(h.entries().is_empty());
  }

  #[test]
  fn capped() {
    let mut h = History::in_memory(vec![]);
    for i in 0..constants().history_cap + 5 {
      h.push(&format!("q{}", i));
    }
    assert_eq!(h.entries().len(), constants().history_cap);
    assert_eq!(h.entries()[0], format!("q{}", constants().history_cap + 4));
  }

  #[test]
  fn parse_skips_blank_and_duplicate_lines() {
    assert_eq!(parse("a\n\n b \na\n"), vec!["a", "b"]);
  }

  // --- navigation ---

  #[test]
  fn walk_and_restore_draft() {
    let mut h = History::in_memory(vec!["newest".into(), "older".into()]);
    assert_eq!(h.older("typing"), Some("newest"));
    assert_eq!(h.older("ignored"), Some("older"));
    assert_eq!(h.older("ignored"), Some("older"));
    assert_eq!(h.newer().as_deref(), Some("newest"));
    assert_eq!(h.newer().as_deref(), Some("typing"));
    assert_eq!(h.newer(), None);
  }

  #[test]
  fn empty_history_walks_nowhere() {
    let mut h = History::in_memory(vec![]);
    assert_eq!(h.older("x"), None);
    assert_eq!(h.newer(), None);
  }
}
