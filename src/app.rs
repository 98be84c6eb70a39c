use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::OpError;
use crate::formats::{FormatEntry, FormatSet};
use crate::history::History;
use crate::input;
use crate::message::{
  Command, DownloadFlag, DownloadRequest, ListingSource, Msg, OperationClass, SignalAck, SignalKind, Ticket,
};
use crate::progress::ProgressEvent;
use crate::recovery::{RecoveryRecord, RecoveryStore};
use crate::theme::{THEMES, Theme};
use crate::youtube::{self, SortMode, VideoEntry};

// --- Types ---

/// What the loading screen is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingKind {
  Search,
  Channel,
  Playlist,
  Formats,
}

impl LoadingKind {
  pub fn class(self) -> OperationClass {
    match self {
      LoadingKind::Formats => OperationClass::FormatDiscovery,
      _ => OperationClass::Search,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      LoadingKind::Search => "Searching",
      LoadingKind::Channel => "Loading channel",
      LoadingKind::Playlist => "Loading playlist",
      LoadingKind::Formats => "Fetching formats",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  SearchInput,
  Loading(LoadingKind),
  VideoList,
  FormatList,
  Download,
  ResumeList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatTab {
  #[default]
  Video,
  Audio,
  Thumbnail,
  Custom,
}

impl FormatTab {
  pub const ALL: [FormatTab; 4] = [FormatTab::Video, FormatTab::Audio, FormatTab::Thumbnail, FormatTab::Custom];

  pub fn label(self) -> &'static str {
    match self {
      FormatTab::Video => "Video",
      FormatTab::Audio => "Audio",
      FormatTab::Thumbnail => "Thumbnail",
      FormatTab::Custom => "Custom",
    }
  }

  fn index(self) -> usize {
    Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
  }

  pub fn next(self) -> Self {
    Self::ALL[(self.index() + 1) % Self::ALL.len()]
  }

  pub fn prev(self) -> Self {
    Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
  }
}

/// A toggleable download flag and whether the user enabled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOption {
  pub flag: DownloadFlag,
  pub enabled: bool,
}

/// Slash command shown in the suggestion list.
#[derive(Debug, PartialEq, Eq)]
pub struct SlashCommand {
  pub name: &'static str,
  pub usage: &'static str,
  pub description: &'static str,
  pub has_arg: bool,
}

pub static SLASH_COMMANDS: [SlashCommand; 4] = [
  SlashCommand {
    name: "channel",
    usage: "/channel <username>",
    description: "List videos from a channel",
    has_arg: true,
  },
  SlashCommand { name: "playlist", usage: "/playlist <id or url>", description: "List videos of a playlist", has_arg: true },
  SlashCommand { name: "resume", usage: "/resume", description: "Resume unfinished downloads", has_arg: false },
  SlashCommand { name: "help", usage: "/help", description: "Show available commands", has_arg: false },
];

/// Commands whose name starts with what follows the `/` (before any space).
pub fn slash_suggestions(input: &str) -> Vec<&'static SlashCommand> {
  let Some(rest) = input.strip_prefix('/') else { return Vec::new() };
  if rest.contains(' ') {
    return Vec::new();
  }
  let prefix = rest.to_lowercase();
  SLASH_COMMANDS.iter().filter(|c| c.name.starts_with(&prefix)).collect()
}

/// Split `/name args`. A unique prefix of a known name resolves to that name.
fn parse_slash(query: &str) -> Option<(&'static str, String)> {
  let rest = query.strip_prefix('/')?;
  let (word, args) = rest.split_once(' ').unwrap_or((rest, ""));
  let word = word.to_lowercase();
  let exact = SLASH_COMMANDS.iter().find(|c| c.name == word);
  let cmd = match exact {
    Some(c) => c,
    None => {
      let mut matches = SLASH_COMMANDS.iter().filter(|c| !word.is_empty() && c.name.starts_with(&word));
      let first = matches.next()?;
      if matches.next().is_some() {
        return None;
      }
      first
    }
  };
  Some((cmd.name, args.trim().to_string()))
}

/// Live state of the current (or last) download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadState {
  pub url: String,
  pub selector: String,
  pub title: String,
  pub percent: f64,
  pub speed: String,
  pub eta: String,
  /// Last `[download]` / `[Merger]` line.
  pub phase: String,
  pub destination: PathBuf,
  /// Resolved output file once yt-dlp reports it.
  pub file_destination: Option<String>,
  pub paused: bool,
  pub cancelled: bool,
  pub completed: bool,
  /// The user asked to cancel; a failure that follows is shown as cancelled.
  pub cancel_requested: bool,
}

impl DownloadState {
  pub fn is_terminal(&self) -> bool {
    self.completed || self.cancelled
  }
}

/// Tickets of the operations the session is currently waiting on, per class.
#[derive(Debug, Default)]
struct InFlight {
  tickets: [Option<Ticket>; 3],
}

impl InFlight {
  fn begin(&mut self, class: OperationClass, ticket: Ticket) {
    self.tickets[class.index()] = Some(ticket);
  }

  fn current(&self, class: OperationClass) -> Option<Ticket> {
    self.tickets[class.index()]
  }

  /// Accept a terminal result only if it belongs to the awaited run.
  fn finish(&mut self, class: OperationClass, ticket: Ticket) -> bool {
    if self.current(class) == Some(ticket) {
      self.tickets[class.index()] = None;
      true
    } else {
      false
    }
  }

  fn abandon(&mut self, class: OperationClass) {
    self.tickets[class.index()] = None;
  }
}

// --- App ---

pub struct App {
  pub screen: Screen,
  pub should_quit: bool,
  pub theme_index: usize,
  pub started_at: Instant,

  // Search input
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub sort: SortMode,
  pub history: History,
  pub show_help: bool,
  pub download_options: Vec<DownloadOption>,
  pub has_ffmpeg: bool,

  // Listing
  pub current_query: String,
  pub listing: Option<ListingSource>,
  /// Set while browsing a playlist so watch URLs keep `&list=`.
  pub playlist_id: Option<String>,
  pub videos: Vec<VideoEntry>,
  pub video_state: ListState,
  pub selected_video: Option<VideoEntry>,

  // Formats
  pub format_url: String,
  pub formats: FormatSet,
  pub format_tab: FormatTab,
  pub format_state: ListState,
  pub custom_input: String,
  pub custom_cursor: usize,
  pub selected_format: Option<String>,

  // Download
  pub download: DownloadState,

  // Resume list
  pub recovery: RecoveryStore,
  pub resume_records: Vec<RecoveryRecord>,
  pub resume_state: ListState,

  pub last_error: Option<String>,
  /// Informational message, lower priority than errors.
  pub info_message: Option<String>,

  config: Config,
  in_flight: InFlight,
  next_ticket: u64,
}

impl App {
  pub fn new(config: Config, history: History, recovery: RecoveryStore, has_ffmpeg: bool) -> Self {
    let theme_index =
      config.theme_name.as_deref().and_then(|name| THEMES.iter().position(|t| t.name == name)).unwrap_or(0);
    let download_options = vec![
      DownloadOption { flag: DownloadFlag::EmbedSubtitles, enabled: config.embed_subtitles },
      DownloadOption { flag: DownloadFlag::EmbedMetadata, enabled: config.embed_metadata },
      DownloadOption { flag: DownloadFlag::EmbedChapters, enabled: config.embed_chapters },
    ];

    Self {
      screen: Screen::SearchInput,
      should_quit: false,
      theme_index,
      started_at: Instant::now(),
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      sort: SortMode::from_config(&config.sort_by),
      history,
      show_help: false,
      download_options,
      has_ffmpeg,
      current_query: String::new(),
      listing: None,
      playlist_id: None,
      videos: Vec::new(),
      video_state: ListState::default(),
      selected_video: None,
      format_url: String::new(),
      formats: FormatSet::default(),
      format_tab: FormatTab::Video,
      format_state: ListState::default(),
      custom_input: String::new(),
      custom_cursor: 0,
      selected_format: None,
      download: DownloadState::default(),
      recovery,
      resume_records: Vec::new(),
      resume_state: ListState::default(),
      last_error: None,
      info_message: None,
      config,
      in_flight: InFlight::default(),
      next_ticket: 0,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
  }

  pub fn set_error(&mut self, msg: String) {
    self.info_message = None;
    self.last_error = Some(msg);
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
  }

  /// Apply the session's embed toggles, sort order and theme to `config`.
  pub fn apply_preferences(&self, config: &mut Config) {
    for opt in &self.download_options {
      match opt.flag {
        DownloadFlag::EmbedSubtitles => config.embed_subtitles = opt.enabled,
        DownloadFlag::EmbedMetadata => config.embed_metadata = opt.enabled,
        DownloadFlag::EmbedChapters => config.embed_chapters = opt.enabled,
      }
    }
    config.sort_by = self.sort.as_config().to_string();
    config.theme_name = Some(self.theme().name.to_string());
  }

  /// Write preferences back on top of the file as stored, so command-line
  /// overrides are not persisted.
  pub fn save_preferences(&self) {
    let mut stored = Config::load();
    self.apply_preferences(&mut stored);
    stored.save();
  }

  /// Which class the session is currently busy with, if any.
  pub fn active_operation(&self) -> Option<OperationClass> {
    match self.screen {
      Screen::Loading(kind) => Some(kind.class()),
      Screen::Download if self.download_running() => Some(OperationClass::Download),
      _ => None,
    }
  }

  fn issue(&mut self, class: OperationClass) -> Ticket {
    self.next_ticket += 1;
    let ticket = Ticket(self.next_ticket);
    self.in_flight.begin(class, ticket);
    ticket
  }

  // --- Download options ---

  pub fn option_available(&self, flag: DownloadFlag) -> bool {
    !flag.requires_ffmpeg() || self.has_ffmpeg
  }

  /// Toggle a flag; flags whose tool is missing stay off.
  pub fn toggle_option(&mut self, flag: DownloadFlag) {
    if !self.option_available(flag) {
      return;
    }
    if let Some(opt) = self.download_options.iter_mut().find(|o| o.flag == flag) {
      opt.enabled = !opt.enabled;
      debug!(flag = flag.label(), enabled = opt.enabled, "options: toggled");
    }
  }

  /// Flags passed to yt-dlp: enabled and backed by an installed tool.
  pub fn effective_flags(&self) -> Vec<DownloadFlag> {
    self.download_options.iter().filter(|o| o.enabled && self.option_available(o.flag)).map(|o| o.flag).collect()
  }

  // --- Message handling ---

  /// Apply one message and return the side effects it requests.
  pub fn update(&mut self, msg: Msg) -> Vec<Command> {
    match msg {
      Msg::Key(key) => input::handle_key_event(self, key),
      Msg::Resize => Vec::new(),
      Msg::ListingFinished { ticket, result } => {
        self.on_listing(ticket, result);
        Vec::new()
      }
      Msg::DirectVideo { ticket, video_id } => self.on_direct_video(ticket, video_id),
      Msg::FormatsFinished { ticket, result } => {
        self.on_formats(ticket, result);
        Vec::new()
      }
      Msg::Progress { ticket, event } => {
        self.on_progress(ticket, event);
        Vec::new()
      }
      Msg::DownloadFinished { ticket, result } => {
        self.on_download_finished(ticket, result);
        Vec::new()
      }
      Msg::Signal { kind, ack } => {
        self.on_signal(kind, ack);
        Vec::new()
      }
    }
  }

  // --- Search ---

  /// Enter on the search screen: slash command, direct link or free-text search.
  pub fn submit_query(&mut self) -> Vec<Command> {
    let query = self.input.trim().to_string();
    if query.is_empty() {
      return Vec::new();
    }

    if let Some((name, args)) = parse_slash(&query) {
      match name {
        "channel" | "playlist" if args.is_empty() => {
          self.set_input(&format!("/{} ", name));
          return Vec::new();
        }
        "channel" => {
          self.history.push(&query);
          self.clear_input();
          self.playlist_id = None;
          return self.start_listing(LoadingKind::Channel, ListingSource::Channel { name: args });
        }
        "playlist" => {
          self.history.push(&query);
          self.clear_input();
          let url = youtube::playlist_url(&args);
          self.playlist_id = youtube::playlist_id(&url);
          return self.start_listing(LoadingKind::Playlist, ListingSource::Playlist { url });
        }
        "resume" => {
          self.clear_input();
          self.open_resume_list();
          return Vec::new();
        }
        "help" => {
          self.clear_input();
          self.show_help = !self.show_help;
          return Vec::new();
        }
        _ => {}
      }
    }

    self.history.push(&query);
    self.clear_input();
    self.playlist_id = None;
    self.current_query = query.clone();
    self.start_listing(LoadingKind::Search, ListingSource::Search { query, sort: self.sort })
  }

  fn start_listing(&mut self, kind: LoadingKind, source: ListingSource) -> Vec<Command> {
    let ticket = self.issue(OperationClass::Search);
    info!(?source, ?ticket, "search: requested");
    self.screen = Screen::Loading(kind);
    self.show_help = false;
    self.clear_error();
    self.info_message = None;
    self.videos.clear();
    self.video_state.select(None);
    self.listing = Some(source.clone());
    vec![Command::StartListing { ticket, source }]
  }

  fn on_listing(&mut self, ticket: Ticket, result: Result<Vec<VideoEntry>, OpError>) {
    if !self.in_flight.finish(OperationClass::Search, ticket) {
      debug!(?ticket, "search: dropping stale result");
      return;
    }
    match result {
      Ok(entries) => {
        info!(count = entries.len(), "search: results received");
        self.videos = entries;
        self.video_state.select(if self.videos.is_empty() { None } else { Some(0) });
        self.clear_error();
        self.screen = Screen::VideoList;
      }
      Err(OpError::Cancelled) => {
        self.screen = Screen::SearchInput;
      }
      Err(e) if e.is_fatal_to_listing() => {
        self.set_error(e.to_string());
        self.screen = Screen::SearchInput;
      }
      Err(e) => {
        self.set_error(e.to_string());
        self.screen = Screen::VideoList;
      }
    }
  }

  fn on_direct_video(&mut self, ticket: Ticket, video_id: String) -> Vec<Command> {
    if !self.in_flight.finish(OperationClass::Search, ticket) {
      debug!(?ticket, "search: dropping stale direct link");
      return Vec::new();
    }
    let url = youtube::watch_url(&video_id);
    self.selected_video = Some(VideoEntry {
      id: video_id,
      title: url.clone(),
      description: String::new(),
      views: 0,
      duration: 0.0,
      channel: String::new(),
    });
    self.start_formats(url)
  }

  // --- Video list ---

  pub fn selected_video_entry(&self) -> Option<&VideoEntry> {
    self.video_state.selected().and_then(|i| self.videos.get(i))
  }

  /// Enter on the video list: discover formats for the highlighted video.
  pub fn select_video(&mut self) -> Vec<Command> {
    let Some(entry) = self.selected_video_entry().cloned() else { return Vec::new() };
    let url = match &self.playlist_id {
      Some(pid) => youtube::watch_url_in_playlist(&entry.id, pid),
      None => youtube::watch_url(&entry.id),
    };
    self.selected_video = Some(entry);
    self.start_formats(url)
  }

  pub fn leave_video_list(&mut self) {
    self.clear_error();
    self.playlist_id = None;
    self.selected_video = None;
    self.screen = Screen::SearchInput;
  }

  fn start_formats(&mut self, url: String) -> Vec<Command> {
    let ticket = self.issue(OperationClass::FormatDiscovery);
    info!(url = %url, ?ticket, "formats: requested");
    self.format_url = url.clone();
    self.formats = FormatSet::default();
    self.format_tab = FormatTab::Video;
    self.format_state.select(None);
    self.custom_input.clear();
    self.custom_cursor = 0;
    self.clear_error();
    self.screen = Screen::Loading(LoadingKind::Formats);
    vec![Command::StartFormatDiscovery { ticket, url }]
  }

  fn on_formats(&mut self, ticket: Ticket, result: Result<FormatSet, OpError>) {
    if !self.in_flight.finish(OperationClass::FormatDiscovery, ticket) {
      debug!(?ticket, "formats: dropping stale result");
      return;
    }
    match result {
      Ok(set) => {
        self.formats = set;
        self.format_tab = FormatTab::Video;
        self.format_state.select(if self.formats.video.is_empty() { None } else { Some(0) });
        self.clear_error();
        self.screen = Screen::FormatList;
      }
      Err(e) => {
        if !e.is_cancelled() {
          self.set_error(e.to_string());
        }
        self.screen = self.format_fallback();
      }
    }
  }

  /// Where to go when format discovery fails or is backed out of.
  fn format_fallback(&self) -> Screen {
    if self.videos.is_empty() { Screen::SearchInput } else { Screen::VideoList }
  }

  // --- Loading ---

  /// Esc on the loading screen: stop waiting and kill the run.
  pub fn cancel_loading(&mut self) -> Vec<Command> {
    let Screen::Loading(kind) = self.screen else { return Vec::new() };
    let class = kind.class();
    self.in_flight.abandon(class);
    info!(class = class.label(), "loading: cancelled by user");
    self.screen = match kind {
      LoadingKind::Formats => self.format_fallback(),
      _ => {
        self.info_message = Some("Search cancelled".to_string());
        Screen::SearchInput
      }
    };
    vec![Command::Cancel(class)]
  }

  // --- Format list ---

  /// Entries of the active tab (empty on the custom tab).
  pub fn current_formats(&self) -> &[FormatEntry] {
    match self.format_tab {
      FormatTab::Video => &self.formats.video,
      FormatTab::Audio => &self.formats.audio,
      FormatTab::Thumbnail => &self.formats.thumbnail,
      FormatTab::Custom => &[],
    }
  }

  pub fn set_format_tab(&mut self, tab: FormatTab) {
    self.format_tab = tab;
    let len = self.current_formats().len();
    self.format_state.select(if len == 0 { None } else { Some(0) });
    if tab == FormatTab::Custom && self.custom_input.is_empty() {
      self.custom_input = self.config.default_format.clone();
      self.custom_cursor = self.custom_input.chars().count();
    }
  }

  /// Suggestions for the custom selector being typed.
  pub fn custom_suggestions(&self) -> Vec<&FormatEntry> {
    crate::formats::suggest(&self.formats.all, &self.custom_input)
  }

  /// Tab on the custom tab: complete the last `+` token with the top suggestion.
  pub fn complete_custom(&mut self) -> bool {
    let Some(first) = self.custom_suggestions().first().map(|f| f.selector.clone()) else { return false };
    self.custom_input = crate::formats::complete_selector(&self.custom_input, &first);
    self.custom_cursor = self.custom_input.chars().count();
    true
  }

  /// Enter on the format list.
  pub fn choose_format(&mut self) -> Vec<Command> {
    let selector = if self.format_tab == FormatTab::Custom {
      let custom = self.custom_input.trim();
      if custom.is_empty() {
        return Vec::new();
      }
      custom.to_string()
    } else {
      let Some(entry) = self.format_state.selected().and_then(|i| self.current_formats().get(i)) else {
        return Vec::new();
      };
      entry.selector.clone()
    };
    let title = self.selected_video.as_ref().map(|v| v.title.clone()).unwrap_or_default();
    let url = self.format_url.clone();
    self.start_download(url, selector, title)
  }

  pub fn leave_format_list(&mut self) {
    self.clear_error();
    self.screen = self.format_fallback();
  }

  // --- Download ---

  fn start_download(&mut self, url: String, selector: String, title: String) -> Vec<Command> {
    let ticket = self.issue(OperationClass::Download);
    info!(url = %url, selector = %selector, ?ticket, "download: requested");
    let dest_dir = self.config.download_path();
    self.download = DownloadState {
      url: url.clone(),
      selector: selector.clone(),
      title: title.clone(),
      destination: dest_dir.clone(),
      ..DownloadState::default()
    };
    self.selected_format = Some(selector.clone());
    self.clear_error();
    self.info_message = None;
    self.screen = Screen::Download;
    let request = DownloadRequest { url, selector, title, dest_dir, flags: self.effective_flags() };
    vec![Command::StartDownload { ticket, request }]
  }

  /// A download process is (as far as the session knows) alive.
  pub fn download_running(&self) -> bool {
    self.in_flight.current(OperationClass::Download).is_some() && !self.download.is_terminal()
  }

  pub fn request_pause(&mut self) -> Vec<Command> {
    if !self.download_running() || self.download.paused {
      return Vec::new();
    }
    vec![Command::Pause]
  }

  pub fn request_resume(&mut self) -> Vec<Command> {
    if !self.download_running() || !self.download.paused {
      return Vec::new();
    }
    vec![Command::Resume]
  }

  pub fn request_cancel_download(&mut self) -> Vec<Command> {
    if !self.download_running() {
      return Vec::new();
    }
    self.download.cancel_requested = true;
    vec![Command::Cancel(OperationClass::Download)]
  }

  fn on_progress(&mut self, ticket: Ticket, event: ProgressEvent) {
    if self.in_flight.current(OperationClass::Download) != Some(ticket) {
      return;
    }
    let d = &mut self.download;
    if let Some(p) = event.percent {
      d.percent = p;
    }
    if let Some(speed) = event.speed {
      d.speed = speed;
    }
    if let Some(eta) = event.eta {
      d.eta = eta;
    }
    if let Some(status) = event.status {
      d.phase = status;
    }
    if event.destination.is_some() {
      d.file_destination = event.destination;
    }
  }

  fn on_download_finished(&mut self, ticket: Ticket, result: Result<(), OpError>) {
    if !self.in_flight.finish(OperationClass::Download, ticket) {
      debug!(?ticket, "download: dropping stale result");
      return;
    }
    self.download.paused = false;
    match result {
      Ok(()) => {
        self.download.completed = true;
        self.download.percent = 100.0;
      }
      Err(e) if e.is_cancelled() || self.download.cancel_requested => {
        self.download.cancelled = true;
      }
      Err(e) => {
        warn!(err = %e, "download: failed");
        self.set_error(format!("Download failed: {}", e));
        self.screen = if self.formats.is_empty() { Screen::SearchInput } else { Screen::FormatList };
      }
    }
  }

  fn on_signal(&mut self, kind: SignalKind, ack: SignalAck) {
    if !self.download_running() {
      return;
    }
    match ack {
      SignalAck::Applied => self.download.paused = kind == SignalKind::Pause,
      SignalAck::Unsupported => self.info_message = Some("Pause is not supported on this platform".to_string()),
      SignalAck::NoProcess => debug!(?kind, "download: signal found no process"),
    }
  }

  /// Enter on a finished download.
  pub fn finish_download(&mut self) {
    if !self.download.is_terminal() {
      return;
    }
    self.selected_video = None;
    self.selected_format = None;
    self.clear_error();
    self.screen = Screen::SearchInput;
  }

  /// `b` on a finished download: pick another format of the same video.
  pub fn back_to_formats(&mut self) {
    if !self.download.is_terminal() || self.formats.is_empty() {
      return;
    }
    self.clear_error();
    self.screen = Screen::FormatList;
  }

  // --- Resume list ---

  pub fn open_resume_list(&mut self) {
    self.resume_records = self.recovery.newest_first();
    self.resume_state.select(if self.resume_records.is_empty() { None } else { Some(0) });
    self.clear_error();
    self.screen = Screen::ResumeList;
  }

  pub fn resume_selected(&mut self) -> Vec<Command> {
    let Some(record) = self.resume_state.selected().and_then(|i| self.resume_records.get(i)).cloned() else {
      return Vec::new();
    };
    self.formats = FormatSet::default();
    self.format_url = record.url.clone();
    self.selected_video = Some(VideoEntry {
      id: youtube::extract_video_id(&record.url).unwrap_or_default(),
      title: record.title.clone(),
      description: String::new(),
      views: 0,
      duration: 0.0,
      channel: String::new(),
    });
    self.start_download(record.url, record.format_id, record.title)
  }

  pub fn delete_selected_record(&mut self) {
    let Some(i) = self.resume_state.selected() else { return };
    let Some(record) = self.resume_records.get(i) else { return };
    if let Err(e) = self.recovery.remove(&record.url) {
      self.set_error(format!("Could not delete record: {:#}", e));
      return;
    }
    self.resume_records.remove(i);
    let len = self.resume_records.len();
    self.resume_state.select(if len == 0 { None } else { Some(i.min(len - 1)) });
  }

  // --- Input helpers ---

  pub fn set_input(&mut self, text: &str) {
    self.input = text.to_string();
    self.cursor_position = self.input.chars().count();
  }

  pub fn clear_input(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.history.reset_navigation();
  }

  /// Tab on the search screen: complete a slash command, or cycle the sort.
  pub fn tab_search(&mut self, forward: bool) {
    if forward && let Some(cmd) = slash_suggestions(&self.input).first() {
      let completed = if cmd.has_arg { format!("/{} ", cmd.name) } else { format!("/{}", cmd.name) };
      self.set_input(&completed);
      return;
    }
    self.sort = if forward { self.sort.next() } else { self.sort.prev() };
  }
}
