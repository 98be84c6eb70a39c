//! Progress stream parsing for yt-dlp output.
//!
//! yt-dlp rewrites a single progress line in place with `\r`, so lines are
//! flushed on either `\r` or `\n`. Each flushed line is scanned independently
//! for a percentage, a transfer rate and an ETA.

use regex::Regex;
use std::sync::LazyLock;
use tokio::io::{AsyncRead, AsyncReadExt};

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));
/// Percent in the shape of a yt-dlp progress line. Phase lines are only read
/// through this, so a `%` inside a file name is never taken as progress.
static PHASE_PERCENT_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid phase percent regex"));
static SPEED_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?[KMG]?i?B/s)").expect("valid speed regex"));
static ETA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ETA\s+(\d+:\d+(?::\d+)?)").expect("valid eta regex"));
static DEST_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"^\[(?:download\] Destination:\s*(.+)|Merger\] Merging formats into "(.+)")$"#)
    .expect("valid destination regex")
});

/// Markers of a line that belongs to the download phase.
const PHASE_MARKERS: [&str; 2] = ["[download]", "[Merger]"];

/// One structured update extracted from a flushed output line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEvent {
  /// 0.0 to 100.0 when the line carried a percentage.
  pub percent: Option<f64>,
  pub speed: Option<String>,
  pub eta: Option<String>,
  /// The phase line itself, e.g. `[download]  42.0% of 10.00MiB ...`.
  pub status: Option<String>,
  /// Output file path, reported once yt-dlp starts writing.
  pub destination: Option<String>,
}

/// Extract a progress event from a single line, or `None` when the line is
/// neither a download-phase line nor carries any progress field.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
  let line = line.trim();
  if line.is_empty() {
    return None;
  }

  let is_phase = PHASE_MARKERS.iter().any(|m| line.contains(m));
  let destination =
    DEST_RE.captures(line).and_then(|c| c.get(1).or_else(|| c.get(2))).map(|m| m.as_str().trim().to_string());
  if destination.is_some() {
    return Some(ProgressEvent { status: Some(line.to_string()), destination, ..ProgressEvent::default() });
  }

  let percent_re = if is_phase { &*PHASE_PERCENT_RE } else { &*PERCENT_RE };
  let percent = percent_re
    .captures(line)
    .and_then(|c| c.get(1))
    .and_then(|m| m.as_str().parse::<f64>().ok())
    .map(|p| p.clamp(0.0, 100.0));
  let speed = SPEED_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());
  let eta = ETA_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());

  if !is_phase && percent.is_none() && speed.is_none() && eta.is_none() {
    return None;
  }

  Some(ProgressEvent { percent, speed, eta, status: is_phase.then(|| line.to_string()), destination: None })
}

/// Line accumulator that splits raw bytes on `\r` and `\n`.
///
/// Splitting happens on bytes; both delimiters are ASCII and can never occur
/// inside a multi-byte UTF-8 sequence. Invalid UTF-8 is replaced, not rejected.
#[derive(Debug, Default)]
pub struct ProgressParser {
  buf: Vec<u8>,
}

impl ProgressParser {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed a chunk and return every line completed by it.
  pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    for &b in bytes {
      if b == b'\r' || b == b'\n' {
        if !self.buf.is_empty() {
          lines.push(String::from_utf8_lossy(&self.buf).into_owned());
          self.buf.clear();
        }
      } else {
        self.buf.push(b);
      }
    }
    lines
  }

  /// Flush whatever is left once the pipe closes.
  pub fn finish(&mut self) -> Option<String> {
    if self.buf.is_empty() {
      return None;
    }
    let line = String::from_utf8_lossy(&self.buf).into_owned();
    self.buf.clear();
    Some(line)
  }
}

/// Read `reader` to EOF, calling `on_line` for every flushed line.
///
/// A read error ends the stream like EOF does; the partial line is still flushed.
pub async fn drain_lines<R, F>(mut reader: R, mut on_line: F)
where
  R: AsyncRead + Unpin,
  F: FnMut(String),
{
  let mut parser = ProgressParser::new();
  let mut chunk = [0u8; 4096];
  loop {
    match reader.read(&mut chunk).await {
      Ok(0) => break,
      Ok(n) => parser.feed(&chunk[..n]).into_iter().for_each(&mut on_line),
      Err(e) => {
        tracing::debug!(err = %e, "progress: pipe read failed, treating as closed");
        break;
      }
    }
  }
  if let Some(line) = parser.finish() {
    on_line(line);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- parse_line ---

  #[test]
  fn full_progress_line() {
    let ev = parse_line("[download]  42.3% of   10.00MiB at    1.21MiB/s ETA 00:05").unwrap();
    assert_eq!(ev.percent, Some(42.3));
    assert_eq!(ev.speed.as_deref(), Some("1.21MiB/s"));
    assert_eq!(ev.eta.as_deref(), Some("00:05"));
    assert!(ev.status.unwrap().starts_with("[download]"));
    assert_eq!(ev.destination, None);
  }

  #[test]
  fn destination_lines() {
    let ev = parse_line("[download] Destination: /home/me/Videos/Song.f137.mp4").unwrap();
    assert_eq!(ev.destination.as_deref(), Some("/home/me/Videos/Song.f137.mp4"));
    assert_eq!(ev.percent, None);

    let ev = parse_line(r#"[Merger] Merging formats into "/home/me/Videos/Song.mp4""#).unwrap();
    assert_eq!(ev.destination.as_deref(), Some("/home/me/Videos/Song.mp4"));
  }

  #[test]
  fn percent_in_file_name_is_not_progress() {
    let ev = parse_line("[download] Destination: /home/me/Videos/Top 10% Songs.mp4").unwrap();
    assert_eq!(ev.percent, None);
    assert_eq!(ev.destination.as_deref(), Some("/home/me/Videos/Top 10% Songs.mp4"));

    let ev = parse_line(r#"[Merger] Merging formats into "/home/me/Videos/50% Off.mp4""#).unwrap();
    assert_eq!(ev.percent, None);
    assert_eq!(ev.destination.as_deref(), Some("/home/me/Videos/50% Off.mp4"));

    let ev = parse_line("[download] /home/me/Videos/Top 10% Songs.mp4 has already been downloaded").unwrap();
    assert_eq!(ev.percent, None);
    assert!(ev.status.is_some());
  }

  #[test]
  fn fields_without_marker_still_forwarded() {
    let ev = parse_line("  55% ETA 1:02:03").unwrap();
    assert_eq!(ev.percent, Some(55.0));
    assert_eq!(ev.eta.as_deref(), Some("1:02:03"));
    assert_eq!(ev.status, None);
  }

  #[test]
  fn unrelated_lines_dropped() {
    assert_eq!(parse_line("[youtube] abc123: Downloading webpage"), None);
    assert_eq!(parse_line(""), None);
    assert_eq!(parse_line("   "), None);
  }

  #[test]
  fn garbled_partial_line_does_not_panic() {
    assert_eq!(parse_line("[downl"), None);
    assert_eq!(parse_line("\u{fffd}\u{fffd}%"), None);
  }

  // --- ProgressParser ---

  #[test]
  fn splits_on_carriage_return_and_newline() {
    let mut p = ProgressParser::new();
    let lines = p.feed(b"[download]  1.0%\r[download]  2.0%\r\n[download] 3.0");
    assert_eq!(lines, vec!["[download]  1.0%", "[download]  2.0%"]);
    assert_eq!(p.finish().as_deref(), Some("[download] 3.0"));
    assert_eq!(p.finish(), None);
  }

  #[test]
  fn line_split_across_chunks() {
    let mut p = ProgressParser::new();
    assert!(p.feed(b"[download]  5").is_empty());
    assert_eq!(p.feed(b"0.0%\n"), vec!["[download]  50.0%"]);
  }

  #[test]
  fn multibyte_split_across_chunks() {
    let mut p = ProgressParser::new();
    let bytes = "[download] Destination: Ä.mp4\n".as_bytes();
    let (a, b) = bytes.split_at(25);
    assert!(p.feed(a).is_empty());
    assert_eq!(p.feed(b), vec!["[download] Destination: Ä.mp4"]);
  }

  #[test]
  fn duplicate_flushes_yield_identical_events() {
    let mut p = ProgressParser::new();
    let line = "[download]  12.5% of 3.00MiB at 500.00KiB/s ETA 00:04";
    let events: Vec<_> = p.feed(format!("{line}\r{line}\r").as_bytes()).iter().filter_map(|l| parse_line(l)).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], events[1]);
  }

  // --- drain_lines ---

  #[tokio::test]
  async fn drain_lines_reads_to_eof() {
    let data: &[u8] = b"[download]  10.0%\r[download]  20.0%\rtail";
    let mut seen = Vec::new();
    drain_lines(data, |l| seen.push(l)).await;
    assert_eq!(seen, vec!["[download]  10.0%", "[download]  20.0%", "tail"]);
  }
}
