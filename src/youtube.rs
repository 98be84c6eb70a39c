use serde::Deserialize;
use serde_json::Value;

use crate::constants::constants;

/// A single entry from a search, channel or playlist listing.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEntry {
  pub id: String,
  pub title: String,
  /// Pre-rendered `duration • views • channel` line.
  pub description: String,
  pub views: u64,
  /// Duration in seconds.
  pub duration: f64,
  pub channel: String,
}

/// Search result ordering, mapped onto YouTube's `sp=` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
  #[default]
  Relevance,
  Date,
  Views,
  Rating,
}

impl SortMode {
  pub const ALL: [SortMode; 4] = [SortMode::Relevance, SortMode::Date, SortMode::Views, SortMode::Rating];

  pub fn sp_param(self) -> &'static str {
    match self {
      SortMode::Relevance => "",
      SortMode::Date => "CAI%253D",
      SortMode::Views => "CAM%253D",
      SortMode::Rating => "CAE%253D",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      SortMode::Relevance => "Relevance",
      SortMode::Date => "Date",
      SortMode::Views => "Views",
      SortMode::Rating => "Rating",
    }
  }

  /// Config spelling; unknown strings fall back to relevance.
  pub fn from_config(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "date" => SortMode::Date,
      "views" => SortMode::Views,
      "rating" => SortMode::Rating,
      _ => SortMode::Relevance,
    }
  }

  pub fn as_config(self) -> &'static str {
    match self {
      SortMode::Relevance => "relevance",
      SortMode::Date => "date",
      SortMode::Views => "views",
      SortMode::Rating => "rating",
    }
  }

  pub fn next(self) -> Self {
    let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
    Self::ALL[(idx + 1) % Self::ALL.len()]
  }

  pub fn prev(self) -> Self {
    let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
    Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
  }
}

// --- URLs ---

/// Cut an id at the first query/fragment separator.
fn cut_id(s: &str) -> &str {
  let end = s.find(['&', '#', '?', '/']).unwrap_or(s.len());
  &s[..end]
}

/// Extract the video id when the input is a direct video reference
/// (`watch?v=`, `youtu.be/` or `/embed/` links). Plain text yields `None`.
pub fn extract_video_id(input: &str) -> Option<String> {
  let input = input.trim();
  let rest = if input.contains("youtube.com/watch") {
    input.split_once("v=").map(|(_, r)| r)
  } else if let Some((_, r)) = input.split_once("youtu.be/") {
    Some(r)
  } else if let Some((_, r)) = input.split_once("youtube.com/embed/") {
    Some(r)
  } else {
    None
  }?;
  let id = cut_id(rest);
  if id.is_empty() { None } else { Some(id.to_string()) }
}

pub fn watch_url(video_id: &str) -> String {
  constants().watch_url.replace("{id}", video_id)
}

/// Watch URL that keeps the playlist context, so siblings stay reachable.
pub fn watch_url_in_playlist(video_id: &str, playlist_id: &str) -> String {
  format!("{}&list={}", watch_url(video_id), playlist_id)
}

pub fn search_url(query: &str, sort: SortMode) -> String {
  constants().search_url.replace("{query}", &urlencoding::encode(query.trim())).replace("{sort}", sort.sp_param())
}

pub fn channel_url(name: &str) -> String {
  let name = name.trim().trim_start_matches('@');
  constants().channel_url.replace("{name}", &urlencoding::encode(name))
}

/// The `list=` parameter of a URL, if any.
pub fn playlist_id(url: &str) -> Option<String> {
  let (_, rest) = url.split_once("list=")?;
  let id = cut_id(rest);
  if id.is_empty() { None } else { Some(id.to_string()) }
}

/// Resolve `/playlist <ref>` where `ref` is a playlist URL, a watch URL
/// carrying `list=`, or a bare playlist id.
pub fn playlist_url(reference: &str) -> String {
  let reference = reference.trim();
  if reference.contains("/playlist?list=") && reference.starts_with("http") {
    return reference.to_string();
  }
  let id = playlist_id(reference).unwrap_or_else(|| reference.to_string());
  constants().playlist_url.replace("{id}", &id)
}

/// Whether yt-dlp should be allowed to expand the URL as a playlist.
pub fn is_playlist_url(url: &str) -> bool {
  url.contains("/playlist?list=") || url.contains("&list=")
}

// --- Listing output ---

/// One `--flat-playlist --dump-json` line. Only the fields we display.
#[derive(Debug, Deserialize)]
struct FlatEntry {
  id: Option<String>,
  title: Option<String>,
  uploader: Option<String>,
  playlist_uploader: Option<String>,
  view_count: Option<Value>,
  duration: Option<Value>,
}

/// yt-dlp emits numbers, numeric strings or null depending on extractor.
fn number_of(v: Option<&Value>) -> f64 {
  match v {
    Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
    Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
    _ => 0.0,
  }
}

/// Parse one listing line. Lines without id/title or with zero duration
/// (live streams, placeholders) are skipped.
pub fn parse_listing_line(line: &str) -> Result<VideoEntry, String> {
  let entry: FlatEntry = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;
  let id = entry.id.filter(|s| !s.is_empty()).ok_or("missing id")?;
  let title = entry.title.filter(|s| !s.is_empty()).ok_or("missing title")?;
  let duration = number_of(entry.duration.as_ref());
  if duration <= 0.0 {
    return Err("zero duration (live or placeholder)".to_string());
  }
  let views = number_of(entry.view_count.as_ref()).max(0.0) as u64;
  let channel = entry.uploader.filter(|s| !s.is_empty()).or(entry.playlist_uploader).unwrap_or_default();

  let description = format!(
    "{} • {} views • {}",
    format_duration(duration),
    format_number(views),
    truncate_channel(&channel, constants().channel_name_max)
  );
  Ok(VideoEntry { id, title, description, views, duration, channel })
}

/// Parse all listing lines, dropping unparsable ones.
pub fn parse_listing_output(stdout: &str) -> Vec<VideoEntry> {
  stdout.lines().map(str::trim).filter(|l| !l.is_empty()).filter_map(|l| parse_listing_line(l).ok()).collect()
}

// --- Formatting ---

/// `m:ss` or `h:mm:ss`.
pub fn format_duration(seconds: f64) -> String {
  let total = seconds.max(0.0) as u64;
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

/// Abbreviate counts: 1.2K, 3.4M, 1.0B.
pub fn format_number(n: u64) -> String {
  let f = n as f64;
  if f >= 1e9 {
    format!("{:.1}B", f / 1e9)
  } else if f >= 1e6 {
    format!("{:.1}M", f / 1e6)
  } else if f >= 1e3 {
    format!("{:.1}K", f / 1e3)
  } else {
    n.to_string()
  }
}

fn truncate_channel(name: &str, max: usize) -> String {
  if name.chars().count() > max {
    let head: String = name.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
  } else {
    name.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- extract_video_id ---

  #[test]
  fn short_link() {
    assert_eq!(extract_video_id("https://youtu.be/abc123").as_deref(), Some("abc123"));
    assert_eq!(extract_video_id("https://youtu.be/abc123?t=42").as_deref(), Some("abc123"));
  }

  #[test]
  fn watch_link() {
    assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(extract_video_id("https://youtube.com/watch?v=xyz#frag").as_deref(), Some("xyz"));
  }

  #[test]
  fn embed_link() {
    assert_eq!(extract_video_id("https://www.youtube.com/embed/qwe").as_deref(), Some("qwe"));
  }

  #[test]
  fn plain_text_is_not_a_video() {
    assert_eq!(extract_video_id("rust async tutorial"), None);
    assert_eq!(extract_video_id("https://youtu.be/"), None);
  }

  // --- playlists ---

  #[test]
  fn playlist_from_bare_id() {
    assert_eq!(playlist_url("PL123"), "https://www.youtube.com/playlist?list=PL123");
  }

  #[test]
  fn playlist_from_playlist_url() {
    let url = "https://www.youtube.com/playlist?list=PL123";
    assert_eq!(playlist_url(url), url);
  }

  #[test]
  fn playlist_from_watch_url() {
    assert_eq!(
      playlist_url("https://www.youtube.com/watch?v=abc&list=PL999&index=3"),
      "https://www.youtube.com/playlist?list=PL999"
    );
  }

  #[test]
  fn playlist_detection() {
    assert!(is_playlist_url("https://www.youtube.com/playlist?list=PL1"));
    assert!(is_playlist_url(&watch_url_in_playlist("abc", "PL1")));
    assert!(!is_playlist_url(&watch_url("abc")));
  }

  // --- search / channel ---

  #[test]
  fn search_url_encodes_query_and_sort() {
    let url = search_url("lofi beats", SortMode::Views);
    assert!(url.starts_with("https://www.youtube.com/results?search_query=lofi%20beats"));
    assert!(url.ends_with("&sp=CAM%253D"));
  }

  #[test]
  fn channel_url_strips_at() {
    assert_eq!(channel_url("@rustlang"), "https://www.youtube.com/@rustlang/videos");
  }

  // --- SortMode ---

  #[test]
  fn sort_mode_cycles() {
    assert_eq!(SortMode::Relevance.next(), SortMode::Date);
    assert_eq!(SortMode::Rating.next(), SortMode::Relevance);
    assert_eq!(SortMode::Relevance.prev(), SortMode::Rating);
    assert_eq!(SortMode::from_config("VIEWS"), SortMode::Views);
    assert_eq!(SortMode::from_config("bogus"), SortMode::Relevance);
  }

  // --- listing lines ---

  #[test]
  fn parse_listing_line_full() {
    let line = r#"{"id":"abc","title":"Hello","uploader":"Chan","view_count":1500,"duration":125.0}"#;
    let e = parse_listing_line(line).unwrap();
    assert_eq!(e.id, "abc");
    assert_eq!(e.views, 1500);
    assert_eq!(e.description, "2:05 • 1.5K views • Chan");
  }

  #[test]
  fn parse_listing_line_playlist_uploader_and_string_numbers() {
    let line = r#"{"id":"a","title":"T","playlist_uploader":"PU","view_count":"42","duration":"3700"}"#;
    let e = parse_listing_line(line).unwrap();
    assert_eq!(e.channel, "PU");
    assert_eq!(e.description, "1:01:40 • 42 views • PU");
  }

  #[test]
  fn parse_listing_line_skips_live_and_incomplete() {
    assert!(parse_listing_line(r#"{"id":"a","title":"Live","duration":null}"#).is_err());
    assert!(parse_listing_line(r#"{"title":"No id","duration":10}"#).is_err());
    assert!(parse_listing_line("not json").is_err());
  }

  #[test]
  fn long_channel_is_truncated() {
    let line = format!(r#"{{"id":"a","title":"T","uploader":"{}","duration":5}}"#, "x".repeat(40));
    let e = parse_listing_line(&line).unwrap();
    assert!(e.description.ends_with(&format!("{}...", "x".repeat(27))));
  }

  #[test]
  fn parse_listing_output_drops_bad_lines() {
    let out = "{\"id\":\"a\",\"title\":\"A\",\"duration\":1}\n\ngarbage\n{\"id\":\"b\",\"title\":\"B\",\"duration\":2}\n";
    let ids: Vec<_> = parse_listing_output(out).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[test]
  fn number_formatting() {
    assert_eq!(format_number(999), "999");
    assert_eq!(format_number(2_500_000), "2.5M");
    assert_eq!(format_number(3_000_000_000), "3.0B");
    assert_eq!(format_duration(59.0), "0:59");
  }
}
