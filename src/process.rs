//! Platform process control: suspend/continue and external tool probes.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::debug;

use crate::error::OpError;

// --- Suspend capability ---

/// Pause/resume contract for a running child process.
pub trait SuspendStrategy: Send + Sync {
  /// `false` means `suspend`/`resume` are never attempted.
  fn supports_suspend(&self) -> bool;
  fn suspend(&self, pid: u32) -> io::Result<()>;
  fn resume(&self, pid: u32) -> io::Result<()>;
}

/// SIGSTOP / SIGCONT.
#[cfg(unix)]
pub struct PosixSignals;

#[cfg(unix)]
impl PosixSignals {
  fn send(pid: u32, sig: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: kill(2) has no memory-safety preconditions; an invalid pid is reported through errno.
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
  }
}

#[cfg(unix)]
impl SuspendStrategy for PosixSignals {
  fn supports_suspend(&self) -> bool {
    true
  }

  fn suspend(&self, pid: u32) -> io::Result<()> {
    Self::send(pid, libc::SIGSTOP)
  }

  fn resume(&self, pid: u32) -> io::Result<()> {
    Self::send(pid, libc::SIGCONT)
  }
}

/// Platforms without job-control signals.
#[cfg(any(test, not(unix)))]
pub struct NoSuspend;

#[cfg(any(test, not(unix)))]
impl SuspendStrategy for NoSuspend {
  fn supports_suspend(&self) -> bool {
    false
  }

  fn suspend(&self, _pid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }

  fn resume(&self, _pid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }
}

/// Strategy for the current platform, chosen once at startup.
pub fn platform_strategy() -> Arc<dyn SuspendStrategy> {
  #[cfg(unix)]
  let strategy: Arc<dyn SuspendStrategy> = Arc::new(PosixSignals);
  #[cfg(not(unix))]
  let strategy: Arc<dyn SuspendStrategy> = Arc::new(NoSuspend);
  strategy
}

// --- Tool probes ---

/// Run `<program> <flag>` and report whether it exited successfully.
async fn probe(program: &str, flag: &str) -> io::Result<bool> {
  let status = Command::new(program)
    .arg(flag)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .kill_on_drop(true)
    .status()
    .await?;
  Ok(status.success())
}

/// Fast `--version` probe run before every listing.
pub async fn check_yt_dlp(program: &str) -> Result<(), OpError> {
  match probe(program, "--version").await {
    Ok(true) => Ok(()),
    Ok(false) => Err(OpError::ToolNotFound(format!("{} --version failed", program))),
    Err(e) => {
      debug!(program, err = %e, "process: yt-dlp probe failed");
      Err(OpError::from_spawn(&e))
    }
  }
}

/// `ffmpeg -version`. Absence only disables the embed flags.
pub async fn has_ffmpeg(program: &str) -> bool {
  let found = probe(program, "-version").await.unwrap_or(false);
  debug!(program, found, "process: ffmpeg probe");
  found
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_suspend_reports_unsupported() {
    let s = NoSuspend;
    assert!(!s.supports_suspend());
    assert_eq!(s.suspend(1).unwrap_err().kind(), io::ErrorKind::Unsupported);
    assert_eq!(s.resume(1).unwrap_err().kind(), io::ErrorKind::Unsupported);
  }

  #[tokio::test]
  async fn missing_tool_is_tool_not_found() {
    let err = check_yt_dlp("/nonexistent/definitely-not-yt-dlp").await.unwrap_err();
    assert!(matches!(err, OpError::ToolNotFound(_)));
    assert!(!has_ffmpeg("/nonexistent/definitely-not-ffmpeg").await);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn present_tool_passes_probe() {
    assert!(check_yt_dlp("true").await.is_ok());
    assert!(matches!(check_yt_dlp("false").await, Err(OpError::ToolNotFound(_))));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn posix_signals_stop_and_continue_a_child() {
    let mut child = Command::new("sleep").arg("5").kill_on_drop(true).spawn().unwrap();
    let pid = child.id().unwrap();
    let s = PosixSignals;
    assert!(s.supports_suspend());
    s.suspend(pid).unwrap();
    s.resume(pid).unwrap();
    child.kill().await.unwrap();
  }
}
