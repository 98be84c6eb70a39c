use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;

use crate::app::{App, FormatTab, Screen};
use crate::message::{Command, DownloadFlag};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Apply a line-editing key to `text`. Returns `false` when the key is not an edit.
fn edit_line(text: &mut String, cursor: &mut usize, code: KeyCode) -> bool {
  match code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(text, *cursor);
      text.insert(byte_idx, c);
      *cursor += 1;
    }
    KeyCode::Backspace => {
      if *cursor > 0 {
        *cursor -= 1;
        let byte_idx = char_to_byte_index(text, *cursor);
        text.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if *cursor < text.chars().count() {
        let byte_idx = char_to_byte_index(text, *cursor);
        text.remove(byte_idx);
      }
    }
    KeyCode::Left => *cursor = cursor.saturating_sub(1),
    KeyCode::Right => {
      if *cursor < text.chars().count() {
        *cursor += 1;
      }
    }
    KeyCode::Home => *cursor = 0,
    KeyCode::End => *cursor = text.chars().count(),
    _ => return false,
  }
  true
}

fn select_next(state: &mut ListState, count: usize) {
  if count > 0 {
    let i = state.selected().map_or(0, |i| (i + 1) % count);
    state.select(Some(i));
  }
}

fn select_prev(state: &mut ListState, count: usize) {
  if count > 0 {
    let i = state.selected().map_or(0, |i| if i == 0 { count.saturating_sub(1) } else { i.saturating_sub(1) });
    state.select(Some(i));
  }
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Vec<Command> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Vec::new();
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Vec::new();
  }

  match app.screen {
    Screen::SearchInput => handle_search_key(app, key),
    Screen::Loading(_) => match key.code {
      KeyCode::Esc | KeyCode::Char('c') => app.cancel_loading(),
      _ => Vec::new(),
    },
    Screen::VideoList => handle_video_list_key(app, key),
    Screen::FormatList => handle_format_list_key(app, key),
    Screen::Download => handle_download_key(app, key),
    Screen::ResumeList => handle_resume_list_key(app, key),
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
  app.clear_error();

  if key.modifiers.contains(KeyModifiers::CONTROL) {
    let flag = match key.code {
      KeyCode::Char('s') => Some(DownloadFlag::EmbedSubtitles),
      KeyCode::Char('e') => Some(DownloadFlag::EmbedMetadata),
      KeyCode::Char('l') => Some(DownloadFlag::EmbedChapters),
      _ => None,
    };
    if let Some(flag) = flag {
      app.toggle_option(flag);
    }
    return Vec::new();
  }

  match key.code {
    KeyCode::Enter => return app.submit_query(),
    KeyCode::Tab => app.tab_search(true),
    KeyCode::BackTab => app.tab_search(false),
    KeyCode::Up => {
      let current = app.input.clone();
      if let Some(text) = app.history.older(&current).map(str::to_string) {
        app.set_input(&text);
      }
    }
    KeyCode::Down => {
      if let Some(text) = app.history.newer() {
        app.set_input(&text);
      }
    }
    KeyCode::Esc => {
      if app.show_help {
        app.show_help = false;
      } else if !app.input.is_empty() {
        app.clear_input();
      } else {
        app.should_quit = true;
      }
    }
    code => {
      app.info_message = None;
      edit_line(&mut app.input, &mut app.cursor_position, code);
    }
  }
  Vec::new()
}

fn handle_video_list_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
  let count = app.videos.len();
  match key.code {
    KeyCode::Enter => return app.select_video(),
    KeyCode::Down | KeyCode::Char('j') => select_next(&mut app.video_state, count),
    KeyCode::Up | KeyCode::Char('k') => select_prev(&mut app.video_state, count),
    KeyCode::Esc | KeyCode::Char('b') => app.leave_video_list(),
    _ => {}
  }
  Vec::new()
}

fn handle_format_list_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
  if app.format_tab == FormatTab::Custom {
    match key.code {
      KeyCode::Enter => return app.choose_format(),
      KeyCode::Tab => {
        if !app.complete_custom() {
          app.set_format_tab(FormatTab::Custom.next());
        }
      }
      KeyCode::BackTab => app.set_format_tab(FormatTab::Custom.prev()),
      KeyCode::Esc => app.set_format_tab(FormatTab::Video),
      code => {
        edit_line(&mut app.custom_input, &mut app.custom_cursor, code);
      }
    }
    return Vec::new();
  }

  let count = app.current_formats().len();
  match key.code {
    KeyCode::Enter => return app.choose_format(),
    KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => app.set_format_tab(app.format_tab.next()),
    KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => app.set_format_tab(app.format_tab.prev()),
    KeyCode::Down | KeyCode::Char('j') => select_next(&mut app.format_state, count),
    KeyCode::Up | KeyCode::Char('k') => select_prev(&mut app.format_state, count),
    KeyCode::Esc | KeyCode::Char('b') => app.leave_format_list(),
    _ => {}
  }
  Vec::new()
}

fn handle_download_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
  match key.code {
    KeyCode::Char('p') | KeyCode::Char(' ') => {
      if app.download.paused {
        app.request_resume()
      } else {
        app.request_pause()
      }
    }
    KeyCode::Char('c') => app.request_cancel_download(),
    KeyCode::Esc => {
      if app.download_running() {
        app.request_cancel_download()
      } else {
        app.finish_download();
        Vec::new()
      }
    }
    KeyCode::Enter => {
      app.finish_download();
      Vec::new()
    }
    KeyCode::Char('b') => {
      app.back_to_formats();
      Vec::new()
    }
    _ => Vec::new(),
  }
}

fn handle_resume_list_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
  let count = app.resume_records.len();
  match key.code {
    KeyCode::Enter => return app.resume_selected(),
    KeyCode::Down | KeyCode::Char('j') => select_next(&mut app.resume_state, count),
    KeyCode::Up | KeyCode::Char('k') => select_prev(&mut app.resume_state, count),
    KeyCode::Char('d') => app.delete_selected_record(),
    KeyCode::Esc | KeyCode::Char('b') => {
      app.clear_error();
      app.screen = Screen::SearchInput;
    }
    _ => {}
  }
  Vec::new()
}
