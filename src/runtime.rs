//! Event loop plumbing: terminal input thread, command dispatch and the
//! draw/update cycle.

use anyhow::{Context, Result};
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::App;
use crate::message::{Command, Msg, OperationClass, SignalKind};
use crate::orchestrator::{MsgSender, Orchestrator};
use crate::ui;

/// Redraw cadence while idle, so the spinner and elapsed time keep moving.
const TICK: Duration = Duration::from_millis(100);

// --- Dispatch ---

/// Turns state-machine commands into orchestrator calls.
#[derive(Clone)]
pub struct Dispatcher {
  orch: Arc<Orchestrator>,
  tx: MsgSender,
}

impl Dispatcher {
  pub fn new(orch: Arc<Orchestrator>, tx: MsgSender) -> Self {
    Self { orch, tx }
  }

  /// Start commands reserve their class slot before returning, so a later
  /// command in the same batch always supersedes an earlier one.
  pub fn dispatch(&self, cmd: Command) {
    match cmd {
      Command::StartListing { ticket, source } => {
        let res = self.orch.reserve(OperationClass::Search);
        let (orch, tx) = (self.orch.clone(), self.tx.clone());
        tokio::spawn(async move { orch.search(res, ticket, source, &tx).await });
      }
      Command::StartFormatDiscovery { ticket, url } => {
        let res = self.orch.reserve(OperationClass::FormatDiscovery);
        let (orch, tx) = (self.orch.clone(), self.tx.clone());
        tokio::spawn(async move { orch.formats(res, ticket, url, &tx).await });
      }
      Command::StartDownload { ticket, request } => {
        let res = self.orch.reserve(OperationClass::Download);
        let (orch, tx) = (self.orch.clone(), self.tx.clone());
        tokio::spawn(async move { orch.download(res, ticket, request, &tx).await });
      }
      Command::Pause => {
        let ack = self.orch.pause(OperationClass::Download);
        let _ = self.tx.send(Msg::Signal { kind: SignalKind::Pause, ack });
      }
      Command::Resume => {
        let ack = self.orch.resume(OperationClass::Download);
        let _ = self.tx.send(Msg::Signal { kind: SignalKind::Resume, ack });
      }
      Command::Cancel(class) => {
        let was_active = self.orch.cancel(class);
        debug!(class = class.label(), was_active, "dispatch: cancel");
      }
    }
  }

  /// Cancel every class; child processes are killed.
  pub fn shutdown(&self) {
    for class in OperationClass::ALL {
      self.orch.cancel(class);
    }
  }
}

// --- Terminal input ---

/// Forward terminal events on a dedicated thread. Stops once the receiver is gone.
pub fn spawn_input_reader(tx: MsgSender) -> std::thread::JoinHandle<()> {
  std::thread::spawn(move || {
    loop {
      match event::poll(TICK) {
        Ok(true) => {}
        Ok(false) => {
          if tx.is_closed() {
            break;
          }
          continue;
        }
        Err(e) => {
          debug!(err = %e, "input: poll failed");
          break;
        }
      }
      let msg = match event::read() {
        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Msg::Key(key),
        Ok(Event::Resize(..)) => Msg::Resize,
        Ok(_) => continue,
        Err(e) => {
          debug!(err = %e, "input: read failed");
          break;
        }
      };
      if tx.send(msg).is_err() {
        break;
      }
    }
  })
}

// --- Loop ---

/// Apply a message and dispatch what it asks for.
fn apply(app: &mut App, dispatcher: &Dispatcher, msg: Msg) {
  for cmd in app.update(msg) {
    dispatcher.dispatch(cmd);
  }
}

pub async fn run(
  terminal: &mut DefaultTerminal,
  app: &mut App,
  dispatcher: &Dispatcher,
  rx: &mut mpsc::UnboundedReceiver<Msg>,
) -> Result<()> {
  info!("runtime: event loop started");
  loop {
    terminal.draw(|frame| ui::ui(frame, app)).context("Failed to draw frame")?;

    match tokio::time::timeout(TICK, rx.recv()).await {
      Ok(Some(msg)) => apply(app, dispatcher, msg),
      Ok(None) => break,
      Err(_) => {}
    }
    while !app.should_quit
      && let Ok(msg) = rx.try_recv()
    {
      apply(app, dispatcher, msg);
    }

    if app.should_quit {
      break;
    }
  }
  info!("runtime: event loop finished");
  Ok(())
}
