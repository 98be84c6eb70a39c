use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const FILE_NAME: &str = "config.toml";

/// User preferences. Keys missing from the file take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub search_limit: u32,
  /// `~/` is expanded against the home directory.
  pub download_dir: String,
  pub default_format: String,
  pub sort_by: String,
  pub embed_subtitles: bool,
  pub embed_metadata: bool,
  pub embed_chapters: bool,
  pub ffmpeg_path: Option<String>,
  pub yt_dlp_path: Option<String>,
  pub theme_name: Option<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      search_limit: 25,
      download_dir: "~/Videos".to_string(),
      default_format: "bestvideo+bestaudio/best".to_string(),
      sort_by: "relevance".to_string(),
      embed_subtitles: false,
      embed_metadata: true,
      embed_chapters: true,
      ffmpeg_path: None,
      yt_dlp_path: None,
      theme_name: None,
    }
  }
}

impl Config {
  /// `<config_dir>/config.toml`.
  pub fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "yd").map(|dirs| dirs.config_dir().join(FILE_NAME))
  }

  pub fn load() -> Self {
    match Self::path() {
      Some(path) => Self::load_from(&path),
      None => Self::default(),
    }
  }

  /// Read `path`. A missing file is created with defaults; an unreadable or
  /// malformed one falls back to defaults.
  pub fn load_from(path: &Path) -> Self {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        let config = Self::default();
        match config.save_to(path) {
          Ok(()) => info!(path = %path.display(), "config: wrote defaults"),
          Err(e) => warn!(err = %format!("{:#}", e), "config: failed to write defaults"),
        }
        return config;
      }
      Err(e) => {
        warn!(path = %path.display(), err = %e, "config: failed to read, using defaults");
        return Self::default();
      }
    };
    toml::from_str(&content).unwrap_or_else(|e| {
      warn!(path = %path.display(), err = %e, "config: failed to parse, using defaults");
      Self::default()
    })
  }

  pub fn save(&self) {
    let Some(path) = Self::path() else { return };
    if let Err(e) = self.save_to(&path) {
      warn!(err = %format!("{:#}", e), "config: failed to save");
    }
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }

  /// Download directory with a leading `~/` expanded.
  pub fn download_path(&self) -> PathBuf {
    expand_home(&self.download_dir, BaseDirs::new().map(|d| d.home_dir().to_path_buf()).as_deref())
  }

  pub fn yt_dlp(&self) -> &str {
    self.yt_dlp_path.as_deref().filter(|p| !p.is_empty()).unwrap_or("yt-dlp")
  }

  pub fn ffmpeg(&self) -> &str {
    self.ffmpeg_path.as_deref().filter(|p| !p.is_empty()).unwrap_or("ffmpeg")
  }
}

fn expand_home(dir: &str, home: Option<&Path>) -> PathBuf {
  match (dir, home) {
    ("~", Some(home)) => home.to_path_buf(),
    (d, Some(home)) if d.starts_with("~/") => home.join(&d[2..]),
    (d, _) => PathBuf::from(d),
  }
}
