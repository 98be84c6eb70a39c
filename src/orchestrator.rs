//! Subprocess orchestration for the three yt-dlp operation classes.
//!
//! Each class owns one slot: a handle (cancellation token, live pid, paused
//! flag) behind a `std::sync::Mutex`, and an async gate held for the whole run.
//! Starting a run first cancels whatever the slot was doing, then waits on the
//! gate, so at most one process per class is ever alive and a superseded run
//! has reaped its child and drained its pipes before the next one spawns.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{OpError, classify_diagnostics, failure_from_diagnostics};
use crate::formats::{FormatSet, parse_formats_document};
use crate::message::{DownloadRequest, ListingSource, Msg, OperationClass, SignalAck, SignalKind, Ticket};
use crate::process::{self, SuspendStrategy};
use crate::progress::{drain_lines, parse_line};
use crate::recovery::{RecoveryRecord, RecoveryStore};
use crate::youtube::{VideoEntry, extract_video_id, is_playlist_url, parse_listing_output};

pub type MsgSender = mpsc::UnboundedSender<Msg>;

/// How long pipe readers may keep running after the child was killed.
/// A grandchild (ffmpeg) can hold the pipes open past its parent.
const DRAIN_GRACE: Duration = Duration::from_secs(2);
/// Non-progress output lines kept per stream for error classification.
const KEPT_LINES: usize = 200;

// --- Slots ---

#[derive(Default)]
struct Handle {
  generation: u64,
  token: CancellationToken,
  pid: Option<u32>,
  paused: bool,
}

#[derive(Default)]
struct Slot {
  handle: StdMutex<Handle>,
  gate: Arc<Mutex<()>>,
}

impl Slot {
  fn lock(&self) -> MutexGuard<'_, Handle> {
    self.handle.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Claim on a slot taken synchronously when a command is dispatched, so that
/// a later start always supersedes an earlier one regardless of task scheduling.
#[derive(Debug, Clone)]
pub struct Reservation {
  class: OperationClass,
  generation: u64,
  token: CancellationToken,
}

/// A reservation that also holds the class gate for the duration of a run.
struct Lease {
  class: OperationClass,
  generation: u64,
  token: CancellationToken,
  _gate: OwnedMutexGuard<()>,
}

// --- Orchestrator ---

pub struct Orchestrator {
  yt_dlp: String,
  search_limit: usize,
  recovery: RecoveryStore,
  suspend: Arc<dyn SuspendStrategy>,
  slots: [Slot; 3],
}

struct RunOutput {
  success: bool,
  status: String,
  stdout: Vec<String>,
  stderr: Vec<String>,
}

impl Orchestrator {
  pub fn new(yt_dlp: impl Into<String>, search_limit: usize, recovery: RecoveryStore) -> Self {
    Self::with_suspend(yt_dlp, search_limit, recovery, process::platform_strategy())
  }

  pub fn with_suspend(
    yt_dlp: impl Into<String>,
    search_limit: usize,
    recovery: RecoveryStore,
    suspend: Arc<dyn SuspendStrategy>,
  ) -> Self {
    Self { yt_dlp: yt_dlp.into(), search_limit: search_limit.max(1), recovery, suspend, slots: Default::default() }
  }

  fn slot(&self, class: OperationClass) -> &Slot {
    &self.slots[class.index()]
  }

  /// Supersede whatever `class` is doing and claim the slot for a new run.
  pub fn reserve(&self, class: OperationClass) -> Reservation {
    let mut h = self.slot(class).lock();
    h.token.cancel();
    h.generation += 1;
    h.token = CancellationToken::new();
    h.paused = false;
    Reservation { class, generation: h.generation, token: h.token.clone() }
  }

  /// Wait until the previous run of the class has fully torn down.
  async fn enter(&self, res: Reservation) -> Result<Lease, OpError> {
    let gate = Arc::clone(&self.slot(res.class).gate).lock_owned().await;
    if res.token.is_cancelled() {
      return Err(OpError::Cancelled);
    }
    Ok(Lease { class: res.class, generation: res.generation, token: res.token, _gate: gate })
  }

  #[cfg(test)]
  pub fn is_active(&self, class: OperationClass) -> bool {
    self.slot(class).lock().pid.is_some()
  }

  #[cfg(test)]
  pub fn is_paused(&self, class: OperationClass) -> bool {
    self.slot(class).lock().paused
  }

  /// Cancel the class's current run and kill its process. Idempotent;
  /// returns whether a process was alive.
  pub fn cancel(&self, class: OperationClass) -> bool {
    let h = self.slot(class).lock();
    h.token.cancel();
    let active = h.pid.is_some();
    info!(class = class.label(), active, "orchestrator: cancel");
    active
  }

  pub fn pause(&self, class: OperationClass) -> SignalAck {
    self.signal(class, SignalKind::Pause)
  }

  pub fn resume(&self, class: OperationClass) -> SignalAck {
    self.signal(class, SignalKind::Resume)
  }

  fn signal(&self, class: OperationClass, kind: SignalKind) -> SignalAck {
    if class != OperationClass::Download {
      return SignalAck::NoProcess;
    }
    let mut h = self.slot(class).lock();
    let Some(pid) = h.pid else {
      debug!(?kind, "orchestrator: no download to signal");
      return SignalAck::NoProcess;
    };
    if !self.suspend.supports_suspend() {
      return SignalAck::Unsupported;
    }
    if h.paused == (kind == SignalKind::Pause) {
      debug!(pid, ?kind, "orchestrator: download already in requested state");
      return SignalAck::Applied;
    }
    let sent = match kind {
      SignalKind::Pause => self.suspend.suspend(pid),
      SignalKind::Resume => self.suspend.resume(pid),
    };
    match sent {
      Ok(()) => {
        h.paused = kind == SignalKind::Pause;
        info!(pid, ?kind, "orchestrator: download signalled");
        SignalAck::Applied
      }
      Err(e) => {
        warn!(pid, ?kind, err = %e, "orchestrator: signal failed");
        SignalAck::NoProcess
      }
    }
  }

  fn track_pid(&self, lease: &Lease, pid: Option<u32>) {
    let mut h = self.slot(lease.class).lock();
    if h.generation == lease.generation {
      h.pid = pid;
      if pid.is_none() {
        h.paused = false;
      }
    }
  }

  // --- Runs ---

  /// Listing run: search, channel or playlist. A direct video link skips yt-dlp
  /// and reports `DirectVideo` instead.
  pub async fn search(&self, res: Reservation, ticket: Ticket, source: ListingSource, tx: &MsgSender) {
    if let ListingSource::Search { query, .. } = &source
      && let Some(video_id) = extract_video_id(query)
    {
      info!(video_id = %video_id, "search: direct video link, skipping listing");
      let _ = tx.send(Msg::DirectVideo { ticket, video_id });
      return;
    }
    let result = self.run_listing(res, &source).await;
    match &result {
      Ok(entries) => info!(count = entries.len(), "search: finished"),
      Err(e) if e.is_cancelled() => info!("search: cancelled"),
      Err(e) => warn!(err = %e, "search: failed"),
    }
    let _ = tx.send(Msg::ListingFinished { ticket, result });
  }

  async fn run_listing(&self, res: Reservation, source: &ListingSource) -> Result<Vec<VideoEntry>, OpError> {
    let lease = self.enter(res).await?;
    tokio::select! {
      probed = process::check_yt_dlp(&self.yt_dlp) => probed?,
      _ = lease.token.cancelled() => return Err(OpError::Cancelled),
    }

    let url = source.url();
    info!(url = %url, "search: listing");
    let args = vec![
      "--flat-playlist".to_string(),
      "--dump-json".to_string(),
      "--playlist-items".to_string(),
      format!("1:{}", self.search_limit),
      url.clone(),
    ];
    let out = self.run(&lease, &args, None).await?;
    if !out.success {
      return Err(failure_from_diagnostics(&out.stderr, &url, &format!("yt-dlp exited with {}", out.status)));
    }

    let stdout = out.stdout.join("\n");
    let entries = parse_listing_output(&stdout);
    if entries.is_empty() {
      if let Some(err) = classify_diagnostics(&out.stderr, &url) {
        return Err(err);
      }
      if out.stdout.iter().any(|l| !l.trim().is_empty())
        && out.stdout.iter().all(|l| serde_json::from_str::<serde_json::Value>(l).is_err())
      {
        return Err(OpError::ParseFailure("unreadable listing output".to_string()));
      }
      return Err(OpError::NoResults);
    }
    Ok(entries)
  }

  /// `yt-dlp -J <url>` and classify the formats.
  pub async fn formats(&self, res: Reservation, ticket: Ticket, url: String, tx: &MsgSender) {
    info!(url = %url, "formats: discovering");
    let result = self.run_formats(res, &url).await;
    match &result {
      Ok(set) => info!(video = set.video.len(), audio = set.audio.len(), "formats: finished"),
      Err(e) if e.is_cancelled() => info!("formats: cancelled"),
      Err(e) => warn!(err = %e, "formats: failed"),
    }
    let _ = tx.send(Msg::FormatsFinished { ticket, result });
  }

  async fn run_formats(&self, res: Reservation, url: &str) -> Result<FormatSet, OpError> {
    let lease = self.enter(res).await?;
    let args = vec!["-J".to_string(), url.to_string()];
    let out = self.run(&lease, &args, None).await?;
    if !out.success {
      return Err(failure_from_diagnostics(&out.stderr, url, &format!("yt-dlp exited with {}", out.status)));
    }
    let json = out.stdout.join("\n");
    if json.trim().is_empty() {
      return Err(OpError::ParseFailure("yt-dlp printed no format data".to_string()));
    }
    let set = parse_formats_document(&json).map_err(|e| OpError::ParseFailure(e.to_string()))?;
    if set.is_empty() {
      return Err(OpError::Failed("No downloadable formats found".to_string()));
    }
    Ok(set)
  }

  /// Download run. Progress events are sent as they are parsed; the terminal
  /// `DownloadFinished` follows once both pipes are drained.
  pub async fn download(&self, res: Reservation, ticket: Ticket, req: DownloadRequest, tx: &MsgSender) {
    info!(url = %req.url, selector = %req.selector, dest = %req.dest_dir.display(), "download: starting");
    let result = self.run_download(res, ticket, &req, tx).await;
    match &result {
      Ok(()) => {
        info!(url = %req.url, "download: complete");
        if let Err(e) = self.recovery.remove(&req.url) {
          warn!(err = %e, "download: failed to clear recovery record");
        }
      }
      Err(e) if e.is_cancelled() => info!(url = %req.url, "download: cancelled"),
      Err(e) => warn!(url = %req.url, err = %e, "download: failed"),
    }
    let _ = tx.send(Msg::DownloadFinished { ticket, result });
  }

  async fn run_download(
    &self,
    res: Reservation,
    ticket: Ticket,
    req: &DownloadRequest,
    tx: &MsgSender,
  ) -> Result<(), OpError> {
    let lease = self.enter(res).await?;
    if let Err(e) = self.recovery.add(RecoveryRecord::new(&req.url, &req.selector, &req.title)) {
      warn!(err = %e, "download: failed to write recovery record");
    }
    let args = download_args(req);
    let out = self.run(&lease, &args, Some((tx.clone(), ticket))).await?;
    if out.success {
      Ok(())
    } else {
      Err(failure_from_diagnostics(&out.stderr, &req.url, &format!("yt-dlp exited with {}", out.status)))
    }
  }

  /// Spawn yt-dlp, drain both pipes and wait for exit or cancellation.
  /// With `progress`, parsed lines from either pipe are forwarded as they arrive.
  async fn run(
    &self,
    lease: &Lease,
    args: &[String],
    progress: Option<(MsgSender, Ticket)>,
  ) -> Result<RunOutput, OpError> {
    debug!(class = lease.class.label(), program = %self.yt_dlp, ?args, "orchestrator: spawning");
    let mut child = Command::new(&self.yt_dlp)
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| OpError::from_spawn(&e))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
      let _ = child.kill().await;
      return Err(OpError::ProcessStartFailure("could not open output pipes".to_string()));
    };
    self.track_pid(lease, child.id());

    let stdout_task = tokio::spawn(read_stream(stdout, progress.clone()));
    let stderr_task = tokio::spawn(read_stream(stderr, progress));

    let waited = tokio::select! {
      status = child.wait() => Some(status),
      _ = lease.token.cancelled() => {
        if let Err(e) = child.kill().await {
          debug!(err = %e, "orchestrator: kill failed (already exited?)");
        }
        None
      }
    };
    // The pid may be reused once reaped; a grandchild can hold the pipes open.
    self.track_pid(lease, None);

    let grace = if waited.is_some() { None } else { Some(DRAIN_GRACE) };
    let stdout = join_reader(stdout_task, grace).await;
    let stderr = join_reader(stderr_task, grace).await;

    let Some(status) = waited else { return Err(OpError::Cancelled) };
    let status = status.map_err(|e| OpError::Failed(format!("failed to wait for yt-dlp: {}", e)))?;
    if lease.token.is_cancelled() {
      return Err(OpError::Cancelled);
    }
    debug!(class = lease.class.label(), %status, "orchestrator: process exited");
    Ok(RunOutput { success: status.success(), status: status.to_string(), stdout, stderr })
  }
}

/// `yt-dlp -f <sel> --newline -R infinite -o <dir>/%(title)s.%(ext)s [--no-playlist] [flags] <url>`.
pub fn download_args(req: &DownloadRequest) -> Vec<String> {
  let template = req.dest_dir.join("%(title)s.%(ext)s");
  let mut args = vec![
    "-f".to_string(),
    req.selector.clone(),
    "--newline".to_string(),
    "-R".to_string(),
    "infinite".to_string(),
    "-o".to_string(),
    template.to_string_lossy().into_owned(),
  ];
  if !is_playlist_url(&req.url) {
    args.push("--no-playlist".to_string());
  }
  args.extend(req.flags.iter().map(|f| f.cli_flag().to_string()));
  args.push(req.url.clone());
  args
}

/// Drain one pipe. Progress lines are forwarded; the rest are kept (bounded).
async fn read_stream<R>(reader: R, progress: Option<(MsgSender, Ticket)>) -> Vec<String>
where
  R: AsyncRead + Unpin,
{
  let mut kept = Vec::new();
  drain_lines(reader, |line| {
    if let Some((tx, ticket)) = &progress
      && let Some(event) = parse_line(&line)
    {
      let _ = tx.send(Msg::Progress { ticket: *ticket, event });
      return;
    }
    kept.push(line);
    if progress.is_some() && kept.len() > KEPT_LINES {
      kept.remove(0);
    }
  })
  .await;
  kept
}

async fn join_reader(task: JoinHandle<Vec<String>>, grace: Option<Duration>) -> Vec<String> {
  let joined = match grace {
    None => task.await,
    Some(limit) => {
      let abort = task.abort_handle();
      match tokio::time::timeout(limit, task).await {
        Ok(joined) => joined,
        Err(_) => {
          debug!("orchestrator: pipe still open after kill, abandoning reader");
          abort.abort();
          return Vec::new();
        }
      }
    }
  };
  joined.unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::message::DownloadFlag;
  use std::path::PathBuf;

  fn request(url: &str, flags: Vec<DownloadFlag>) -> DownloadRequest {
    DownloadRequest {
      url: url.to_string(),
      selector: "137+140".to_string(),
      title: "Song".to_string(),
      dest_dir: PathBuf::from("/tmp/videos"),
      flags,
    }
  }

  // --- download_args ---

  #[test]
  fn download_args_single_video() {
    let args = download_args(&request("https://www.youtube.com/watch?v=abc", vec![DownloadFlag::EmbedChapters]));
    assert_eq!(
      args,
      vec![
        "-f",
        "137+140",
        "--newline",
        "-R",
        "infinite",
        "-o",
        "/tmp/videos/%(title)s.%(ext)s",
        "--no-playlist",
        "--embed-chapters",
        "https://www.youtube.com/watch?v=abc",
      ]
    );
  }

  #[test]
  fn download_args_keep_playlist_context() {
    let args = download_args(&request("https://www.youtube.com/watch?v=abc&list=PL1", vec![]));
    assert!(!args.contains(&"--no-playlist".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc&list=PL1"));
  }

  // --- slots without processes ---

  #[test]
  fn signals_without_download_are_noops() {
    let orch = Orchestrator::new("yt-dlp", 10, RecoveryStore::disabled());
    assert_eq!(orch.pause(OperationClass::Download), SignalAck::NoProcess);
    assert_eq!(orch.resume(OperationClass::Download), SignalAck::NoProcess);
    assert_eq!(orch.pause(OperationClass::Search), SignalAck::NoProcess);
    assert!(!orch.is_paused(OperationClass::Download));
  }

  #[test]
  fn cancel_is_idempotent() {
    let orch = Orchestrator::new("yt-dlp", 10, RecoveryStore::disabled());
    assert!(!orch.cancel(OperationClass::Search));
    assert!(!orch.cancel(OperationClass::Search));
  }

  #[test]
  fn reserve_supersedes_previous_claim() {
    let orch = Orchestrator::new("yt-dlp", 10, RecoveryStore::disabled());
    let first = orch.reserve(OperationClass::FormatDiscovery);
    let other = orch.reserve(OperationClass::Download);
    let second = orch.reserve(OperationClass::FormatDiscovery);
    assert!(first.token.is_cancelled());
    assert!(!second.token.is_cancelled());
    assert!(!other.token.is_cancelled());
  }

  #[tokio::test]
  async fn direct_video_link_skips_the_tool() {
    let orch = Orchestrator::new("/nonexistent/yt-dlp", 10, RecoveryStore::disabled());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let source = ListingSource::Search { query: "https://youtu.be/abc123".into(), sort: Default::default() };
    orch.search(orch.reserve(OperationClass::Search), Ticket(1), source, &tx).await;
    match rx.recv().await {
      Some(Msg::DirectVideo { ticket, video_id }) => {
        assert_eq!(ticket, Ticket(1));
        assert_eq!(video_id, "abc123");
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn missing_tool_reports_tool_not_found() {
    let orch = Orchestrator::new("/nonexistent/yt-dlp", 10, RecoveryStore::disabled());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let source = ListingSource::Search { query: "lofi".into(), sort: Default::default() };
    orch.search(orch.reserve(OperationClass::Search), Ticket(2), source, &tx).await;
    match rx.recv().await {
      Some(Msg::ListingFinished { result: Err(OpError::ToolNotFound(_)), .. }) => {}
      other => panic!("unexpected {:?}", other),
    }
  }

  // --- fake yt-dlp ---

  #[cfg(unix)]
  mod fake_tool {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const VERSION_GUARD: &str = "if [ \"$1\" = \"--version\" ]; then echo 2025.01.01; exit 0; fi\n";

    fn script(dir: &tempfile::TempDir, body: &str) -> String {
      let path = dir.path().join("yt-dlp");
      std::fs::write(&path, format!("#!/bin/sh\n{}{}", VERSION_GUARD, body)).unwrap();
      std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
      path.to_string_lossy().into_owned()
    }

    async fn wait_active(orch: &Orchestrator, class: OperationClass) {
      for _ in 0..200 {
        if orch.is_active(class) {
          return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
      panic!("{} never became active", class.label());
    }

    #[tokio::test]
    async fn listing_parses_entries() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(
        &dir,
        r#"echo '{"id":"a1","title":"First","duration":61,"view_count":1500,"uploader":"Chan"}'
echo '{"id":"b2","title":"Live","duration":0}'
"#,
      );
      let orch = Orchestrator::new(tool, 25, RecoveryStore::disabled());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let source = ListingSource::Channel { name: "@chan".into() };
      orch.search(orch.reserve(OperationClass::Search), Ticket(3), source, &tx).await;
      match rx.recv().await {
        Some(Msg::ListingFinished { ticket, result: Ok(entries) }) => {
          assert_eq!(ticket, Ticket(3));
          assert_eq!(entries.len(), 1);
          assert_eq!(entries[0].id, "a1");
          assert_eq!(entries[0].description, "1:01 • 1.5K views • Chan");
        }
        other => panic!("unexpected {:?}", other),
      }
    }

    #[tokio::test]
    async fn playlist_404_is_playlist_not_found() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "echo 'ERROR: [youtube:tab] PLnope: HTTP Error 404: Not Found' >&2\nexit 1\n");
      let orch = Orchestrator::new(tool, 25, RecoveryStore::disabled());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let source = ListingSource::Playlist { url: "https://www.youtube.com/playlist?list=PLnope".into() };
      orch.search(orch.reserve(OperationClass::Search), Ticket(4), source, &tx).await;
      match rx.recv().await {
        Some(Msg::ListingFinished { result: Err(err), .. }) => {
          assert_eq!(err, OpError::ResourceNotFound(crate::error::ResourceKind::Playlist));
          assert_eq!(err.to_string(), "Playlist not found");
        }
        other => panic!("unexpected {:?}", other),
      }
    }

    #[tokio::test]
    async fn empty_listing_is_no_results() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exit 0\n");
      let orch = Orchestrator::new(tool, 25, RecoveryStore::disabled());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let source = ListingSource::Search { query: "nothing".into(), sort: Default::default() };
      orch.search(orch.reserve(OperationClass::Search), Ticket(5), source, &tx).await;
      assert!(matches!(rx.recv().await, Some(Msg::ListingFinished { result: Err(OpError::NoResults), .. })));
    }

    #[tokio::test]
    async fn formats_are_classified() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(
        &dir,
        r#"echo '{"formats":[{"format_id":"140","acodec":"aac","vcodec":"none"},{"format_id":"137","acodec":"none","vcodec":"avc1","resolution":"1920x1080"}]}'
"#,
      );
      let orch = Orchestrator::new(tool, 25, RecoveryStore::disabled());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let res = orch.reserve(OperationClass::FormatDiscovery);
      orch.formats(res, Ticket(6), "https://www.youtube.com/watch?v=abc".into(), &tx).await;
      match rx.recv().await {
        Some(Msg::FormatsFinished { result: Ok(set), .. }) => {
          assert_eq!(set.audio.len(), 1);
          assert_eq!(set.audio[0].selector, "140");
          assert!(set.video.iter().any(|f| f.selector == "137+140"));
        }
        other => panic!("unexpected {:?}", other),
      }
    }

    #[tokio::test]
    async fn garbage_format_output_is_parse_failure() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "echo 'not json'\n");
      let orch = Orchestrator::new(tool, 25, RecoveryStore::disabled());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let res = orch.reserve(OperationClass::FormatDiscovery);
      orch.formats(res, Ticket(7), "https://www.youtube.com/watch?v=abc".into(), &tx).await;
      assert!(matches!(rx.recv().await, Some(Msg::FormatsFinished { result: Err(OpError::ParseFailure(_)), .. })));
    }

    #[tokio::test]
    async fn download_streams_progress_then_finishes() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(
        &dir,
        r#"printf '[download] Destination: /tmp/videos/Song.mp4\n'
printf '[download]  10.0%% of 1.00MiB at 1.00MiB/s ETA 00:01\r'
printf '[download] 100.0%% of 1.00MiB at 1.00MiB/s ETA 00:00\n'
"#,
      );
      let store = RecoveryStore::at(dir.path().join("unfinished.json"));
      let orch = Orchestrator::new(tool, 25, store.clone());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let req = request("https://www.youtube.com/watch?v=abc", vec![]);
      orch.download(orch.reserve(OperationClass::Download), Ticket(8), req, &tx).await;
      drop(tx);

      let mut percents = Vec::new();
      let mut destination = None;
      let mut finished = None;
      while let Some(msg) = rx.recv().await {
        match msg {
          Msg::Progress { event, .. } => {
            assert!(finished.is_none(), "progress after terminal message");
            percents.extend(event.percent);
            destination = destination.or(event.destination);
          }
          Msg::DownloadFinished { result, .. } => finished = Some(result),
          other => panic!("unexpected {:?}", other),
        }
      }
      assert_eq!(finished, Some(Ok(())));
      assert_eq!(percents, vec![10.0, 100.0]);
      assert_eq!(destination.as_deref(), Some("/tmp/videos/Song.mp4"));
      assert!(!store.contains("https://www.youtube.com/watch?v=abc"));
    }

    #[tokio::test]
    async fn failed_download_keeps_recovery_record() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "echo 'ERROR: Video unavailable' >&2\nexit 1\n");
      let store = RecoveryStore::at(dir.path().join("unfinished.json"));
      let orch = Orchestrator::new(tool, 25, store.clone());
      let (tx, mut rx) = mpsc::unbounded_channel();
      let req = request("https://www.youtube.com/watch?v=gone", vec![]);
      orch.download(orch.reserve(OperationClass::Download), Ticket(9), req, &tx).await;
      match rx.recv().await {
        Some(Msg::DownloadFinished { result: Err(err), .. }) => {
          assert_eq!(err, OpError::ResourceNotFound(crate::error::ResourceKind::Video));
        }
        other => panic!("unexpected {:?}", other),
      }
      assert!(store.contains("https://www.youtube.com/watch?v=gone"));
    }

    #[tokio::test]
    async fn cancel_is_class_scoped_and_kills_the_download() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exec sleep 30\n");
      let store = RecoveryStore::at(dir.path().join("unfinished.json"));
      let orch = Arc::new(Orchestrator::new(tool, 25, store.clone()));
      let (tx, mut rx) = mpsc::unbounded_channel();

      let res = orch.reserve(OperationClass::Download);
      let runner = Arc::clone(&orch);
      let req = request("https://www.youtube.com/watch?v=long", vec![]);
      let task = tokio::spawn(async move { runner.download(res, Ticket(10), req, &tx).await });
      wait_active(&orch, OperationClass::Download).await;

      assert!(!orch.cancel(OperationClass::Search));
      assert!(orch.is_active(OperationClass::Download));

      assert!(orch.cancel(OperationClass::Download));
      task.await.unwrap();
      assert!(matches!(rx.recv().await, Some(Msg::DownloadFinished { result: Err(OpError::Cancelled), .. })));
      assert!(!orch.is_active(OperationClass::Download));
      assert!(store.contains("https://www.youtube.com/watch?v=long"));
    }

    #[tokio::test]
    async fn exited_download_is_not_signalled_while_pipes_drain() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(
        &dir,
        r#"printf '[download]  10.0%%\n'
(sleep 2; printf '[download] 100.0%%\n') &
sleep 0.2
exit 0
"#,
      );
      let orch = Arc::new(Orchestrator::new(tool, 25, RecoveryStore::disabled()));
      let (tx, mut rx) = mpsc::unbounded_channel();

      let res = orch.reserve(OperationClass::Download);
      let runner = Arc::clone(&orch);
      let req = request("https://www.youtube.com/watch?v=abc", vec![]);
      let task = tokio::spawn(async move { runner.download(res, Ticket(15), req, &tx).await });
      assert!(matches!(rx.recv().await, Some(Msg::Progress { .. })));

      for _ in 0..100 {
        if !orch.is_active(OperationClass::Download) {
          break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
      assert!(!orch.is_active(OperationClass::Download));
      assert!(!task.is_finished(), "background writer still holds the pipe");
      assert_eq!(orch.pause(OperationClass::Download), SignalAck::NoProcess);

      task.await.unwrap();
      let mut finished = None;
      while let Ok(msg) = rx.try_recv() {
        if let Msg::DownloadFinished { result, .. } = msg {
          finished = Some(result);
        }
      }
      assert_eq!(finished, Some(Ok(())));
    }

    #[tokio::test]
    async fn pause_and_resume_a_live_download() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exec sleep 30\n");
      let orch = Arc::new(Orchestrator::new(tool, 25, RecoveryStore::disabled()));
      let (tx, mut rx) = mpsc::unbounded_channel();

      let res = orch.reserve(OperationClass::Download);
      let runner = Arc::clone(&orch);
      let req = request("https://www.youtube.com/watch?v=long", vec![]);
      let task = tokio::spawn(async move { runner.download(res, Ticket(11), req, &tx).await });
      wait_active(&orch, OperationClass::Download).await;

      assert_eq!(orch.pause(OperationClass::Download), SignalAck::Applied);
      assert!(orch.is_paused(OperationClass::Download));
      assert_eq!(orch.resume(OperationClass::Download), SignalAck::Applied);
      assert!(!orch.is_paused(OperationClass::Download));

      orch.cancel(OperationClass::Download);
      task.await.unwrap();
      assert!(matches!(rx.recv().await, Some(Msg::DownloadFinished { result: Err(OpError::Cancelled), .. })));
    }

    #[derive(Default)]
    struct CountingSignals {
      stops: std::sync::atomic::AtomicUsize,
      conts: std::sync::atomic::AtomicUsize,
    }

    impl SuspendStrategy for CountingSignals {
      fn supports_suspend(&self) -> bool {
        true
      }

      fn suspend(&self, _pid: u32) -> std::io::Result<()> {
        self.stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
      }

      fn resume(&self, _pid: u32) -> std::io::Result<()> {
        self.conts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
      }
    }

    #[tokio::test]
    async fn repeated_pause_signals_once() {
      use std::sync::atomic::Ordering;

      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exec sleep 30\n");
      let signals = Arc::new(CountingSignals::default());
      let orch = Arc::new(Orchestrator::with_suspend(tool, 25, RecoveryStore::disabled(), signals.clone()));
      let (tx, _rx) = mpsc::unbounded_channel();

      let res = orch.reserve(OperationClass::Download);
      let runner = Arc::clone(&orch);
      let req = request("https://www.youtube.com/watch?v=long", vec![]);
      let task = tokio::spawn(async move { runner.download(res, Ticket(14), req, &tx).await });
      wait_active(&orch, OperationClass::Download).await;

      assert_eq!(orch.resume(OperationClass::Download), SignalAck::Applied);
      assert_eq!(orch.pause(OperationClass::Download), SignalAck::Applied);
      assert_eq!(orch.pause(OperationClass::Download), SignalAck::Applied);
      assert_eq!(signals.stops.load(Ordering::SeqCst), 1);
      assert_eq!(signals.conts.load(Ordering::SeqCst), 0);
      assert_eq!(orch.resume(OperationClass::Download), SignalAck::Applied);
      assert_eq!(signals.conts.load(Ordering::SeqCst), 1);

      orch.cancel(OperationClass::Download);
      task.await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_platform_acknowledges_without_signalling() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exec sleep 30\n");
      let orch = Arc::new(Orchestrator::with_suspend(
        tool,
        25,
        RecoveryStore::disabled(),
        Arc::new(crate::process::NoSuspend),
      ));
      let (tx, _rx) = mpsc::unbounded_channel();

      let res = orch.reserve(OperationClass::Download);
      let runner = Arc::clone(&orch);
      let req = request("https://www.youtube.com/watch?v=long", vec![]);
      let task = tokio::spawn(async move { runner.download(res, Ticket(12), req, &tx).await });
      wait_active(&orch, OperationClass::Download).await;

      assert_eq!(orch.pause(OperationClass::Download), SignalAck::Unsupported);
      assert!(!orch.is_paused(OperationClass::Download));
      orch.cancel(OperationClass::Download);
      task.await.unwrap();
    }

    #[tokio::test]
    async fn new_start_supersedes_running_one() {
      let dir = tempfile::tempdir().unwrap();
      let tool = script(&dir, "exec sleep 30\n");
      let orch = Arc::new(Orchestrator::new(tool, 25, RecoveryStore::disabled()));
      let (tx, mut rx) = mpsc::unbounded_channel();

      let first = orch.reserve(OperationClass::FormatDiscovery);
      let runner = Arc::clone(&orch);
      let tx1 = tx.clone();
      let task = tokio::spawn(async move { runner.formats(first, Ticket(13), "u1".into(), &tx1).await });
      wait_active(&orch, OperationClass::FormatDiscovery).await;

      // Reserving again cancels the first run; its terminal message says so.
      let _second = orch.reserve(OperationClass::FormatDiscovery);
      task.await.unwrap();
      match rx.recv().await {
        Some(Msg::FormatsFinished { ticket, result }) => {
          assert_eq!(ticket, Ticket(13));
          assert_eq!(result, Err(OpError::Cancelled));
        }
        other => panic!("unexpected {:?}", other),
      }
      drop(tx);
    }
  }
}
