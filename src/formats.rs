//! Format discovery: the `yt-dlp -J` document and its classification into
//! the Video / Audio / Thumbnail tabs.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::constants::constants;

/// Stream kind of a format entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCategory {
  VideoAudio,
  VideoOnly,
  AudioOnly,
  Thumbnail,
  /// Synthesised `video-only + best audio` pairing.
  Composite,
  Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatEntry {
  pub title: String,
  /// Value passed to `yt-dlp -f`; `video+audio` for composites.
  pub selector: String,
  pub size: String,
  pub language: Option<String>,
  pub resolution: String,
  pub category: FormatCategory,
}

/// Categorised discovery result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatSet {
  pub video: Vec<FormatEntry>,
  pub audio: Vec<FormatEntry>,
  pub thumbnail: Vec<FormatEntry>,
  /// Every real format, unfiltered, for custom selector lookup.
  pub all: Vec<FormatEntry>,
}

impl FormatSet {
  pub fn is_empty(&self) -> bool {
    self.all.is_empty() && self.video.is_empty()
  }
}

// --- Document model ---

#[derive(Debug, Deserialize)]
pub struct FormatsDocument {
  #[serde(default)]
  pub formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFormat {
  pub format_id: Option<String>,
  pub ext: Option<String>,
  pub resolution: Option<String>,
  pub acodec: Option<String>,
  pub vcodec: Option<String>,
  pub abr: Option<f64>,
  pub fps: Option<f64>,
  pub tbr: Option<f64>,
  pub filesize: Option<f64>,
  pub filesize_approx: Option<f64>,
  pub language: Option<String>,
  pub lang: Option<String>,
}

fn present(codec: &Option<String>) -> bool {
  codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
}

impl RawFormat {
  fn id(&self) -> Option<&str> {
    self.format_id.as_deref().filter(|s| !s.is_empty())
  }

  fn has_video(&self) -> bool {
    present(&self.vcodec)
  }

  fn has_audio(&self) -> bool {
    present(&self.acodec)
  }

  fn language(&self) -> Option<&str> {
    self.language.as_deref().filter(|s| !s.is_empty()).or(self.lang.as_deref().filter(|s| !s.is_empty()))
  }

  fn resolution(&self) -> &str {
    match self.resolution.as_deref() {
      None | Some("") | Some("Unknown") => "?",
      Some(r) => r,
    }
  }

  fn category(&self) -> FormatCategory {
    match (self.has_video(), self.has_audio()) {
      (true, true) => FormatCategory::VideoAudio,
      (true, false) => FormatCategory::VideoOnly,
      (false, true) => FormatCategory::AudioOnly,
      (false, false) if self.ext.as_deref() == Some("mhtml") => FormatCategory::Thumbnail,
      _ => FormatCategory::Unknown,
    }
  }
}

// --- Labels ---

/// Map `WIDTHxHEIGHT` to a quality label; anything unparsable is returned as-is.
pub fn quality_label(resolution: &str) -> String {
  let Some((_, h)) = resolution.split_once('x') else { return resolution.to_string() };
  let Ok(height) = h.parse::<u32>() else { return resolution.to_string() };
  let label = match height {
    h if h >= 4320 => "8k",
    h if h >= 2160 => "4k",
    h if h >= 1440 => "2k",
    h if h >= 1080 => "1080p",
    h if h >= 720 => "720p",
    h if h >= 480 => "480p",
    h if h >= 360 => "360p",
    h if h >= 240 => "240p",
    h if h >= 144 => "144p",
    _ => return resolution.to_string(),
  };
  label.to_string()
}

/// Total bitrate (kbit/s) as `850k` or `2.5M`.
pub fn format_bitrate(kbps: f64) -> String {
  if kbps >= 1000.0 { format!("{:.1}M", kbps / 1000.0) } else { format!("{:.0}k", kbps) }
}

/// Two-decimal binary size, or "Unknown" for zero/absent.
pub fn bytes_to_human(bytes: f64) -> String {
  if bytes <= 0.0 {
    return "Unknown".to_string();
  }
  const SUFFIXES: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
  let mut value = bytes;
  let mut i = 0;
  while value >= 1024.0 && i < SUFFIXES.len() - 1 {
    value /= 1024.0;
    i += 1;
  }
  format!("{:.2} {}", value, SUFFIXES[i])
}

fn video_title(f: &RawFormat, ext: &str) -> String {
  let mut title = quality_label(f.resolution());
  if let Some(fps) = f.fps.filter(|v| *v > 0.0) {
    title = format!("{}{:.0}", title, fps);
  }
  if let Some(tbr) = f.tbr.filter(|v| *v > 0.0) {
    title = format!("{} @{}", title, format_bitrate(tbr));
  }
  format!("{} {}", title, ext)
}

// --- Classification ---

/// Pick the audio stream paired with video-only formats.
///
/// Provider-specific: prefers YouTube's canonical m4a track, then the opus
/// alternate, then the first audio-only stream listed, then `bestaudio`.
/// The Custom tab exists for anything smarter.
pub fn preferred_audio(formats: &[RawFormat]) -> (String, Option<String>) {
  let c = constants();
  let find = |id: &str| formats.iter().find(|f| f.id() == Some(id));
  let chosen = find(c.canonical_audio_id.as_str())
    .or_else(|| find(c.alternate_audio_id.as_str()))
    .or_else(|| formats.iter().find(|f| f.id().is_some() && f.category() == FormatCategory::AudioOnly));
  match chosen {
    Some(f) => (f.id().unwrap_or_default().to_string(), f.language().map(str::to_string)),
    None => ("bestaudio".to_string(), None),
  }
}

/// Classify every format and synthesise the composite video entries.
pub fn classify(formats: &[RawFormat]) -> FormatSet {
  let hidden = &constants().hidden_qualities;
  let is_hidden = |quality: &str| hidden.iter().any(|h| quality.starts_with(h.as_str()));

  let languages: BTreeSet<&str> =
    formats.iter().filter(|f| f.has_audio()).filter_map(|f| f.language()).filter(|l| *l != "und").collect();
  let show_language = languages.len() > 1;

  let mut set = FormatSet::default();

  for f in formats {
    let Some(id) = f.id() else { continue };
    let ext = f.ext.as_deref().filter(|s| !s.is_empty()).unwrap_or("?");
    let category = f.category();

    let language = if show_language {
      Some(f.language().filter(|l| *l != "und").unwrap_or("unknown").to_string())
    } else {
      None
    };

    let mut title = match category {
      FormatCategory::AudioOnly => match f.abr.filter(|v| *v > 0.0) {
        Some(abr) => format!("{} @{}k", ext, abr as u64),
        None => ext.to_string(),
      },
      FormatCategory::Thumbnail => quality_label(f.resolution()),
      _ => video_title(f, ext),
    };
    if f.has_audio()
      && let Some(ref lang) = language
    {
      title = format!("{} [{}]", title, lang);
    }

    let entry = FormatEntry {
      title,
      selector: id.to_string(),
      size: bytes_to_human(f.filesize.or(f.filesize_approx).unwrap_or(0.0)),
      language,
      resolution: f.resolution().to_string(),
      category,
    };

    match category {
      FormatCategory::VideoAudio if !is_hidden(&quality_label(f.resolution())) => set.video.push(entry.clone()),
      FormatCategory::AudioOnly => set.audio.push(entry.clone()),
      FormatCategory::Thumbnail => set.thumbnail.push(entry.clone()),
      _ => {}
    }
    set.all.push(entry);
  }

  let (audio_id, audio_lang) = preferred_audio(formats);
  let audio_lang = audio_lang.filter(|l| l != "und");

  for f in formats.iter().filter(|f| f.category() == FormatCategory::VideoOnly) {
    let Some(id) = f.id() else { continue };
    if is_hidden(&quality_label(f.resolution())) {
      continue;
    }
    let mut title = video_title(f, "mp4");
    if show_language && let Some(ref lang) = audio_lang {
      title = format!("{} [{}]", title, lang);
    }
    set.video.push(FormatEntry {
      title,
      selector: format!("{}+{}", id, audio_id),
      size: "unknown size".to_string(),
      language: audio_lang.clone(),
      resolution: f.resolution().to_string(),
      category: FormatCategory::Composite,
    });
  }

  set
}

/// Parse a `-J` document and classify it.
pub fn parse_formats_document(json: &str) -> Result<FormatSet, serde_json::Error> {
  let doc: FormatsDocument = serde_json::from_str(json)?;
  Ok(classify(&doc.formats))
}

/// Formats whose selector or title contains the last `+`-separated token of `input`.
pub fn suggest<'a>(all: &'a [FormatEntry], input: &str) -> Vec<&'a FormatEntry> {
  let token = input.rsplit('+').next().unwrap_or("").trim().to_lowercase();
  if token.is_empty() {
    return Vec::new();
  }
  all.iter().filter(|f| f.selector.to_lowercase().contains(&token) || f.title.to_lowercase().contains(&token)).collect()
}

/// Replace the last `+`-separated token of `input` with `selector`.
pub fn complete_selector(input: &str, selector: &str) -> String {
  match input.rfind('+') {
    Some(idx) => format!("{}{}", input[..=idx].trim(), selector),
    None => selector.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc(json: &str) -> FormatSet {
    parse_formats_document(json).unwrap()
  }

  // --- classification ---

  #[test]
  fn audio_and_video_only_pair_into_composite() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"140","acodec":"aac","vcodec":"none"},
        {"format_id":"137","acodec":"none","vcodec":"avc1","resolution":"1920x1080"}
      ]}"#,
    );
    assert_eq!(set.audio.len(), 1);
    assert_eq!(set.audio[0].selector, "140");
    assert_eq!(set.video.len(), 1);
    assert_eq!(set.video[0].selector, "137+140");
    assert_eq!(set.video[0].category, FormatCategory::Composite);
    assert_eq!(set.all.len(), 2);
  }

  #[test]
  fn composite_selectors_are_video_plus_audio() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"251","ext":"webm","acodec":"opus","vcodec":"none"},
        {"format_id":"248","ext":"webm","acodec":"none","vcodec":"vp9","resolution":"1920x1080","fps":30},
        {"format_id":"136","ext":"mp4","acodec":"none","vcodec":"avc1","resolution":"1280x720","fps":60,"tbr":2500}
      ]}"#,
    );
    let selectors: Vec<_> = set.video.iter().map(|f| f.selector.as_str()).collect();
    assert_eq!(selectors, vec!["248+251", "136+251"]);
    assert_eq!(set.video[1].title, "720p60 @2.5M mp4");
  }

  #[test]
  fn canonical_audio_preferred_over_alternate() {
    let formats = vec![
      RawFormat { format_id: Some("251".into()), acodec: Some("opus".into()), ..Default::default() },
      RawFormat { format_id: Some("140".into()), acodec: Some("aac".into()), ..Default::default() },
    ];
    assert_eq!(preferred_audio(&formats).0, "140");
  }

  #[test]
  fn first_audio_when_no_known_track() {
    let formats = vec![
      RawFormat { format_id: Some("v1".into()), vcodec: Some("avc1".into()), ..Default::default() },
      RawFormat { format_id: Some("a9".into()), acodec: Some("mp4a".into()), ..Default::default() },
    ];
    assert_eq!(preferred_audio(&formats).0, "a9");
    assert_eq!(preferred_audio(&formats[..1]).0, "bestaudio");
  }

  #[test]
  fn low_resolutions_hidden_from_video_tab() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"17","ext":"3gp","acodec":"mp4a","vcodec":"mp4v","resolution":"176x144"},
        {"format_id":"18","ext":"mp4","acodec":"mp4a","vcodec":"avc1","resolution":"640x360"},
        {"format_id":"160","ext":"mp4","acodec":"none","vcodec":"avc1","resolution":"256x144"}
      ]}"#,
    );
    let selectors: Vec<_> = set.video.iter().map(|f| f.selector.as_str()).collect();
    assert_eq!(selectors, vec!["18"]);
    assert_eq!(set.all.len(), 3);
  }

  #[test]
  fn thumbnails_and_sizes() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"sb0","ext":"mhtml","acodec":"none","vcodec":"none","resolution":"160x90"},
        {"format_id":"140","ext":"m4a","acodec":"mp4a","vcodec":"none","abr":129.5,"filesize":3145728}
      ]}"#,
    );
    assert_eq!(set.thumbnail.len(), 1);
    assert_eq!(set.thumbnail[0].category, FormatCategory::Thumbnail);
    assert_eq!(set.audio[0].title, "m4a @129k");
    assert_eq!(set.audio[0].size, "3.00 MiB");
  }

  #[test]
  fn languages_shown_only_when_several() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"140","ext":"m4a","acodec":"mp4a","vcodec":"none","language":"en"},
        {"format_id":"140-1","ext":"m4a","acodec":"mp4a","vcodec":"none","lang":"de"},
        {"format_id":"137","ext":"mp4","acodec":"none","vcodec":"avc1","resolution":"1920x1080"}
      ]}"#,
    );
    assert_eq!(set.audio[0].title, "m4a [en]");
    assert_eq!(set.audio[1].title, "m4a [de]");
    assert_eq!(set.video[0].title, "1080p mp4 [en]");
    assert_eq!(set.video[0].language.as_deref(), Some("en"));

    let single = doc(
      r#"{"formats":[
        {"format_id":"140","ext":"m4a","acodec":"mp4a","vcodec":"none","language":"en"},
        {"format_id":"137","ext":"mp4","acodec":"none","vcodec":"avc1","resolution":"1920x1080"}
      ]}"#,
    );
    assert_eq!(single.video[0].title, "1080p mp4");
    assert_eq!(single.audio[0].language, None);
  }

  #[test]
  fn entries_without_id_skipped() {
    let set = doc(r#"{"formats":[{"ext":"mp4","acodec":"mp4a","vcodec":"avc1"}]}"#);
    assert!(set.is_empty());
  }

  #[test]
  fn malformed_document_is_an_error() {
    assert!(parse_formats_document("{not json").is_err());
    assert!(doc("{}").is_empty());
  }

  // --- labels ---

  #[test]
  fn quality_labels() {
    assert_eq!(quality_label("3840x2160"), "4k");
    assert_eq!(quality_label("1920x1080"), "1080p");
    assert_eq!(quality_label("100x100"), "100x100");
    assert_eq!(quality_label("audio only"), "audio only");
    assert_eq!(quality_label("?"), "?");
  }

  #[test]
  fn human_sizes() {
    assert_eq!(bytes_to_human(0.0), "Unknown");
    assert_eq!(bytes_to_human(512.0), "512.00 B");
    assert_eq!(bytes_to_human(1536.0), "1.50 KiB");
  }

  // --- custom selector ---

  #[test]
  fn suggestions_match_last_token() {
    let set = doc(
      r#"{"formats":[
        {"format_id":"140","ext":"m4a","acodec":"mp4a","vcodec":"none"},
        {"format_id":"137","ext":"mp4","acodec":"none","vcodec":"avc1","resolution":"1920x1080"}
      ]}"#,
    );
    let hits: Vec<_> = suggest(&set.all, "137+14").iter().map(|f| f.selector.clone()).collect();
    assert_eq!(hits, vec!["140"]);
    assert!(suggest(&set.all, "137+").is_empty());
    assert_eq!(complete_selector("137 + 14", "140"), "137 +140");
    assert_eq!(complete_selector("13", "137"), "137");
  }
}
