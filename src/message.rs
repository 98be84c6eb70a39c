//! Messages flowing into the state machine and commands flowing out of it.

use std::path::PathBuf;

use ratatui::crossterm::event::KeyEvent;

use crate::error::OpError;
use crate::formats::FormatSet;
use crate::progress::ProgressEvent;
use crate::youtube::{SortMode, VideoEntry};

/// Unit of single-flight concurrency control in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
  Search,
  FormatDiscovery,
  Download,
}

impl OperationClass {
  pub const ALL: [OperationClass; 3] =
    [OperationClass::Search, OperationClass::FormatDiscovery, OperationClass::Download];

  pub fn index(self) -> usize {
    match self {
      OperationClass::Search => 0,
      OperationClass::FormatDiscovery => 1,
      OperationClass::Download => 2,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      OperationClass::Search => "search",
      OperationClass::FormatDiscovery => "formats",
      OperationClass::Download => "download",
    }
  }
}

/// Identifies one started operation. Results carrying a ticket the session
/// no longer waits for are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// What a listing run enumerates.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingSource {
  /// Free text, or a direct video link that skips the listing entirely.
  Search { query: String, sort: SortMode },
  Channel { name: String },
  Playlist { url: String },
}

impl ListingSource {
  pub fn url(&self) -> String {
    match self {
      ListingSource::Search { query, sort } => crate::youtube::search_url(query, *sort),
      ListingSource::Channel { name } => crate::youtube::channel_url(name),
      ListingSource::Playlist { url } => url.clone(),
    }
  }
}

/// Toggleable yt-dlp post-processing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFlag {
  EmbedSubtitles,
  EmbedMetadata,
  EmbedChapters,
}

impl DownloadFlag {
  pub fn cli_flag(self) -> &'static str {
    match self {
      DownloadFlag::EmbedSubtitles => "--embed-subs",
      DownloadFlag::EmbedMetadata => "--embed-metadata",
      DownloadFlag::EmbedChapters => "--embed-chapters",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      DownloadFlag::EmbedSubtitles => "Subtitles",
      DownloadFlag::EmbedMetadata => "Metadata",
      DownloadFlag::EmbedChapters => "Chapters",
    }
  }

  /// Ctrl+<key> toggles the flag on the search screen.
  pub fn key(self) -> char {
    match self {
      DownloadFlag::EmbedSubtitles => 's',
      DownloadFlag::EmbedMetadata => 'e',
      DownloadFlag::EmbedChapters => 'l',
    }
  }

  /// All three embed steps are ffmpeg post-processors.
  pub fn requires_ffmpeg(self) -> bool {
    true
  }
}

/// Everything the download run needs, fixed at the moment the user picks a format.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
  pub url: String,
  pub selector: String,
  pub title: String,
  pub dest_dir: PathBuf,
  /// Already filtered by tool availability.
  pub flags: Vec<DownloadFlag>,
}

/// Outcome of a pause or resume signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAck {
  Applied,
  /// The platform cannot suspend processes; nothing was sent.
  Unsupported,
  /// No download process is alive.
  NoProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
  Pause,
  Resume,
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone)]
pub enum Msg {
  Key(KeyEvent),
  Resize,
  ListingFinished { ticket: Ticket, result: Result<Vec<VideoEntry>, OpError> },
  /// The search input was a direct video link; no listing ran.
  DirectVideo { ticket: Ticket, video_id: String },
  FormatsFinished { ticket: Ticket, result: Result<FormatSet, OpError> },
  Progress { ticket: Ticket, event: ProgressEvent },
  /// Always the last message of a download, after every `Progress`.
  DownloadFinished { ticket: Ticket, result: Result<(), OpError> },
  Signal { kind: SignalKind, ack: SignalAck },
}

/// Side effects requested by the state machine, executed by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  StartListing { ticket: Ticket, source: ListingSource },
  StartFormatDiscovery { ticket: Ticket, url: String },
  StartDownload { ticket: Ticket, request: DownloadRequest },
  Pause,
  Resume,
  Cancel(OperationClass),
}
