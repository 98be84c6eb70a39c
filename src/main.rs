mod app;
mod config;
mod constants;
mod error;
mod formats;
mod history;
mod input;
mod message;
mod orchestrator;
mod process;
mod progress;
mod recovery;
mod runtime;
mod theme;
mod ui;
mod youtube;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use directories::ProjectDirs;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use history::History;
use orchestrator::Orchestrator;
use recovery::RecoveryStore;
use runtime::Dispatcher;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Directory downloads are written to (overrides the config file)
  #[arg(long)]
  download_dir: Option<String>,

  /// Number of results fetched per search
  #[arg(long)]
  search_limit: Option<u32>,

  /// Path to the yt-dlp executable
  #[arg(long)]
  yt_dlp: Option<String>,

  /// Path to the ffmpeg executable
  #[arg(long)]
  ffmpeg: Option<String>,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Print shell completions to stdout
  Completions { shell: clap_complete::Shell },
}

impl Args {
  fn apply_to(&self, config: &mut Config) {
    if let Some(dir) = &self.download_dir {
      config.download_dir = dir.clone();
    }
    if let Some(limit) = self.search_limit {
      config.search_limit = limit.max(1);
    }
    if let Some(path) = &self.yt_dlp {
      config.yt_dlp_path = Some(path.clone());
    }
    if let Some(path) = &self.ffmpeg {
      config.ffmpeg_path = Some(path.clone());
    }
  }
}

// --- Logging ---

/// Log to `<data_dir>/yd.log`, filtered by `YD_LOG` (default `info`). The
/// terminal belongs to the UI, so nothing goes to stderr. Returns `None`
/// when the log file cannot be opened; the session then runs unlogged.
fn init_tracing() -> Option<WorkerGuard> {
  let dir = ProjectDirs::from("", "", "yd")?.data_dir().to_path_buf();
  std::fs::create_dir_all(&dir).ok()?;
  let appender = RollingFileAppender::builder().rotation(Rotation::NEVER).filename_prefix("yd.log").build(&dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("YD_LOG")
    .or_else(|_| EnvFilter::try_new("info"))
    .unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).try_init().ok()?;
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(Cmd::Completions { shell }) = args.command {
    clap_complete::generate(shell, &mut Args::command(), "yd", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_tracing();
  info!(version = env!("CARGO_PKG_VERSION"), "yd starting");

  let mut config = Config::load();
  args.apply_to(&mut config);

  let has_ffmpeg = process::has_ffmpeg(config.ffmpeg()).await;
  let recovery = RecoveryStore::open_default();
  let orch = Arc::new(Orchestrator::new(config.yt_dlp(), config.search_limit as usize, recovery.clone()));
  let (tx, mut rx) = mpsc::unbounded_channel();
  let dispatcher = Dispatcher::new(orch, tx.clone());
  let mut app = App::new(config, History::open_default(), recovery, has_ffmpeg);

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  runtime::spawn_input_reader(tx);
  let result = runtime::run(&mut terminal, &mut app, &dispatcher, &mut rx).await;
  ratatui::restore();
  drop(rx);

  dispatcher.shutdown();
  app.save_preferences();
  info!("yd exiting");
  result
}
