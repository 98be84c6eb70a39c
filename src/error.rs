use std::fmt;

/// What a listing or lookup was aimed at, used to phrase not-found/private errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
  Channel,
  Playlist,
  Video,
}

impl ResourceKind {
  /// Infer the resource kind from the URL handed to yt-dlp.
  pub fn for_url(url: &str) -> Self {
    if url.contains("/playlist?list=") {
      ResourceKind::Playlist
    } else if url.contains("/@") || url.contains("/channel/") {
      ResourceKind::Channel
    } else {
      ResourceKind::Video
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ResourceKind::Channel => "Channel",
      ResourceKind::Playlist => "Playlist",
      ResourceKind::Video => "Video",
    };
    f.write_str(s)
  }
}

/// Terminal failure of a background operation.
///
/// Every subprocess and parse failure is converted into one of these at the
/// orchestrator boundary; the state machine never sees exit codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
  #[error("yt-dlp not found ({0}). Install it: https://github.com/yt-dlp/yt-dlp#installation")]
  ToolNotFound(String),

  #[error("No results found")]
  NoResults,

  #[error("Please check your internet connection")]
  NetworkUnreachable,

  #[error("{0} not found")]
  ResourceNotFound(ResourceKind),

  #[error("This {} is private", .0.to_string().to_lowercase())]
  ResourcePrivate(ResourceKind),

  #[error("Parse error: {0}")]
  ParseFailure(String),

  #[error("Failed to start yt-dlp: {0}")]
  ProcessStartFailure(String),

  #[error("Cancelled")]
  Cancelled,

  #[error("{0}")]
  Failed(String),
}

impl OpError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, OpError::Cancelled)
  }

  /// Whether the failure happened before any useful listing could exist,
  /// so the user is better served back on the search screen.
  pub fn is_fatal_to_listing(&self) -> bool {
    matches!(self, OpError::ToolNotFound(_) | OpError::ProcessStartFailure(_))
  }

  /// Map a spawn error into the taxonomy.
  pub fn from_spawn(err: &std::io::Error) -> Self {
    if err.kind() == std::io::ErrorKind::NotFound {
      OpError::ToolNotFound(err.to_string())
    } else {
      OpError::ProcessStartFailure(err.to_string())
    }
  }
}

/// Match known yt-dlp diagnostic phrases. The last recognised line wins;
/// `None` means nothing matched and the caller should fall back to a generic error.
pub fn classify_diagnostics(stderr: &[String], target_url: &str) -> Option<OpError> {
  let kind = ResourceKind::for_url(target_url);
  let mut found = None;
  for line in stderr {
    if line.contains("[Errno 101]") || line.contains("[Errno -3]") || line.contains("Network is unreachable") {
      found = Some(OpError::NetworkUnreachable);
    } else if line.contains("HTTP Error 404") || line.contains("Requested entity was not found") {
      found = Some(OpError::ResourceNotFound(kind));
    } else if line.contains("Private playlist") || line.contains("This playlist is private") {
      found = Some(OpError::ResourcePrivate(ResourceKind::Playlist));
    } else if line.contains("Playlist does not exist") {
      found = Some(OpError::ResourceNotFound(ResourceKind::Playlist));
    } else if line.contains("Private video") {
      found = Some(OpError::ResourcePrivate(ResourceKind::Video));
    } else if line.contains("Video unavailable") {
      found = Some(OpError::ResourceNotFound(ResourceKind::Video));
    }
  }
  found
}

/// Classify a failed run: a recognised phrase, else the last stderr line, else `fallback`.
pub fn failure_from_diagnostics(stderr: &[String], target_url: &str, fallback: &str) -> OpError {
  if let Some(err) = classify_diagnostics(stderr, target_url) {
    return err;
  }
  match stderr.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()) {
    Some(line) => OpError::Failed(line.to_string()),
    None => OpError::Failed(fallback.to_string()),
  }
}
