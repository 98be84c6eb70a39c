use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Gauge, List, ListItem, Padding, Paragraph, Tabs, Wrap},
};

use crate::app::{App, FormatTab, LoadingKind, SLASH_COMMANDS, Screen, slash_suggestions};
use crate::formats::FormatEntry;
use crate::theme::Theme;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn rounded<'a>(theme: &Theme) -> Block<'a> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

fn titled<'a>(theme: &Theme, title: impl Into<Line<'a>>) -> Block<'a> {
  rounded(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
}

fn striped_bg(theme: &Theme, i: usize, selected: bool) -> ratatui::style::Color {
  if selected {
    theme.highlight_bg
  } else if i % 2 == 1 {
    theme.stripe_bg
  } else {
    theme.bg
  }
}

/// Keep the cursor column visible inside `inner_w` cells and return the visible slice.
fn scroll_into_view(text: &str, cursor: usize, scroll: &mut usize, inner_w: usize) -> (String, usize) {
  let cursor_col = display_width(text, cursor);
  if cursor_col < *scroll {
    *scroll = cursor_col;
  } else if cursor_col >= *scroll + inner_w {
    *scroll = cursor_col.saturating_sub(inner_w) + 1;
  }
  let offset = *scroll;
  let visible: String = text
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= offset)
    .take_while(|(start, _, _)| *start < offset + inner_w)
    .map(|(_, _, c)| c)
    .collect();
  (visible, cursor_col - offset)
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let input_h = if app.screen == Screen::SearchInput { 3 } else { 0 };
  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(input_h),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  match app.screen {
    Screen::SearchInput => render_search(frame, app, main_area),
    Screen::Loading(kind) => render_loading(frame, app, kind, main_area),
    Screen::VideoList => render_videos(frame, app, main_area),
    Screen::FormatList => render_formats(frame, app, main_area),
    Screen::Download => render_download(frame, app, main_area),
    Screen::ResumeList => render_resume(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  if input_h > 0 {
    render_input(frame, app, input_area);
  }
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ⇣ yd ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

// --- Search ---

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let [body_area, options_area] = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

  let suggestions = slash_suggestions(&app.input);
  if app.show_help {
    render_help(frame, theme, body_area);
  } else if !suggestions.is_empty() {
    let items: Vec<ListItem> = suggestions
      .iter()
      .map(|c| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<24}", c.usage), Style::default().fg(theme.accent)),
          Span::styled(c.description, Style::default().fg(theme.muted)),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(titled(theme, " Commands ").padding(Padding::horizontal(1))), body_area);
  } else {
    let text = vec![
      Line::from(""),
      Line::from(Span::styled("⇣  Welcome to yd", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
      Line::from(""),
      Line::from(Span::styled("Search YouTube. Pick a format. Download.", Style::default().fg(theme.fg))),
      Line::from(""),
      Line::from(Span::styled(
        "Type a query or paste a link, then press Enter. /help lists commands.",
        Style::default().fg(theme.muted),
      )),
    ];
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme)), body_area);
  }

  let mut spans = vec![
    Span::styled(" Sort ", Style::default().fg(theme.muted)),
    Span::styled(app.sort.label(), Style::default().fg(theme.accent)),
    Span::raw("   "),
  ];
  for opt in &app.download_options {
    let available = app.option_available(opt.flag);
    let (mark, color) = match (available, opt.enabled) {
      (false, _) => ("–", theme.muted),
      (true, true) => ("✓", theme.status),
      (true, false) => ("✗", theme.muted),
    };
    spans.push(Span::styled(format!("^{} ", opt.flag.key()), Style::default().fg(theme.muted)));
    spans.push(Span::styled(format!("{} {}", mark, opt.flag.label()), Style::default().fg(color)));
    spans.push(Span::raw("  "));
  }
  if !app.has_ffmpeg {
    spans.push(Span::styled("(ffmpeg not found)", Style::default().fg(theme.error)));
  }
  frame.render_widget(Line::from(spans), options_area);
}

fn render_help(frame: &mut Frame, theme: &Theme, area: Rect) {
  let mut lines = vec![Line::from("")];
  for c in &SLASH_COMMANDS {
    lines.push(Line::from(vec![
      Span::styled(format!("{:<24}", c.usage), Style::default().fg(theme.accent)),
      Span::styled(c.description, Style::default().fg(theme.fg)),
    ]));
  }
  lines.push(Line::from(""));
  let keys = [
    ("Tab / Shift+Tab", "Change sort order"),
    ("↑ / ↓", "Browse search history"),
    ("Ctrl+S / Ctrl+E / Ctrl+L", "Toggle subtitles, metadata, chapters"),
    ("Ctrl+T", "Switch theme"),
    ("Ctrl+C", "Quit"),
  ];
  for (key, action) in keys {
    lines.push(Line::from(vec![
      Span::styled(format!("{:<24}", key), Style::default().fg(theme.muted)),
      Span::styled(action, Style::default().fg(theme.fg)),
    ]));
  }
  frame.render_widget(Paragraph::new(lines).block(titled(theme, " Help ").padding(Padding::horizontal(1))), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let input_block = rounded(theme)
    .title(" Search YouTube ")
    .title_style(Style::default().fg(theme.accent))
    .border_style(Style::default().fg(theme.accent))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let (visible, cursor_x) = scroll_into_view(&app.input, app.cursor_position, &mut app.input_scroll, inner_w);
  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block), area);
  frame.set_cursor_position((area.x + 2 + cursor_x as u16, area.y + 1));
}

// --- Loading ---

fn render_loading(frame: &mut Frame, app: &App, kind: LoadingKind, area: Rect) {
  let theme = app.theme();
  let tick = (app.started_at.elapsed().as_millis() / 100) as usize;
  let subject = match kind {
    LoadingKind::Formats => app.selected_video.as_ref().map(|v| v.title.clone()).unwrap_or_default(),
    _ => app.listing.as_ref().map(|s| s.url()).unwrap_or_default(),
  };
  let inner_w = area.width.saturating_sub(4) as usize;
  let text = vec![
    Line::from(""),
    Line::from(vec![
      Span::styled(SPINNER[tick % SPINNER.len()], Style::default().fg(theme.accent)),
      Span::styled(format!(" {}…", kind.label()), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)),
    ]),
    Line::from(""),
    Line::from(Span::styled(truncate_str(&subject, inner_w), Style::default().fg(theme.muted))),
    Line::from(""),
    Line::from(Span::styled("Press Esc to cancel", Style::default().fg(theme.muted))),
  ];
  frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme)), area);
}

// --- Video list ---

fn render_videos(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .videos
    .iter()
    .enumerate()
    .map(|(i, v)| {
      let is_selected = Some(i) == app.video_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let meta = if is_selected { theme.highlight_fg } else { theme.muted };
      ListItem::new(vec![
        Line::from(Span::styled(truncate_str(&v.title, inner_w), Style::default().fg(fg).add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(truncate_str(&v.description, inner_w), Style::default().fg(meta))),
      ])
      .bg(striped_bg(theme, i, is_selected))
    })
    .collect();

  let title = match &app.listing {
    Some(crate::message::ListingSource::Channel { name }) => format!(" Channel {} — {} videos ", name, app.videos.len()),
    Some(crate::message::ListingSource::Playlist { .. }) => format!(" Playlist — {} videos ", app.videos.len()),
    _ if !app.current_query.is_empty() => format!(" Results for '{}' ", app.current_query),
    _ => " Results ".to_string(),
  };

  let list = List::new(items)
    .block(titled(theme, title))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, &mut app.video_state);
}

// --- Format list ---

fn format_line<'a>(theme: &Theme, f: &FormatEntry, selected: bool, inner_w: usize) -> Line<'a> {
  let fg = if selected { theme.highlight_fg } else { theme.fg };
  let meta = if selected { theme.highlight_fg } else { theme.muted };
  let mut right = format!("{}  {}", f.resolution, f.size);
  if let Some(lang) = &f.language {
    right = format!("{}  {}", lang, right);
  }
  let right_w = right.chars().count();
  let title = truncate_str(&f.title, inner_w.saturating_sub(right_w + 2));
  let gap = inner_w.saturating_sub(title.chars().count() + right_w);
  Line::from(vec![
    Span::styled(title, Style::default().fg(fg)),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(meta)),
  ])
}

fn render_formats(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let [head_area, tabs_area, body_area] =
    Layout::vertical([Constraint::Length(1), Constraint::Length(1), Constraint::Min(3)]).areas(area);

  let title = app.selected_video.as_ref().map(|v| v.title.as_str()).unwrap_or("");
  frame.render_widget(
    Line::from(Span::styled(
      format!(" {}", truncate_str(title, area.width.saturating_sub(2) as usize)),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    head_area,
  );

  let titles: Vec<Line> = FormatTab::ALL
    .iter()
    .map(|t| {
      let count = match t {
        FormatTab::Video => Some(app.formats.video.len()),
        FormatTab::Audio => Some(app.formats.audio.len()),
        FormatTab::Thumbnail => Some(app.formats.thumbnail.len()),
        FormatTab::Custom => None,
      };
      match count {
        Some(n) => Line::from(format!("{} ({})", t.label(), n)),
        None => Line::from(t.label()),
      }
    })
    .collect();
  let selected_tab = FormatTab::ALL.iter().position(|t| *t == app.format_tab).unwrap_or(0);
  let tabs = Tabs::new(titles)
    .select(selected_tab)
    .style(Style::default().fg(theme.muted))
    .highlight_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD | Modifier::UNDERLINED))
    .divider("│");
  frame.render_widget(tabs, tabs_area);

  if app.format_tab == FormatTab::Custom {
    render_custom(frame, app, body_area);
    return;
  }

  let inner_w = body_area.width.saturating_sub(4) as usize;
  let selected = app.format_state.selected();
  let items: Vec<ListItem> = app
    .current_formats()
    .iter()
    .enumerate()
    .map(|(i, f)| {
      let is_selected = Some(i) == selected;
      ListItem::new(format_line(theme, f, is_selected, inner_w)).bg(striped_bg(theme, i, is_selected))
    })
    .collect();
  if items.is_empty() {
    let empty = Paragraph::new(Span::styled("No formats in this category", Style::default().fg(theme.muted)))
      .alignment(Alignment::Center)
      .block(rounded(theme));
    frame.render_widget(empty, body_area);
    return;
  }
  let list = List::new(items)
    .block(rounded(theme))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, body_area, &mut app.format_state);
}

fn render_custom(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let [input_area, list_area] = Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(area);

  let block =
    titled(theme, " Format selector ").border_style(Style::default().fg(theme.accent)).padding(Padding::horizontal(1));
  let inner_w = input_area.width.saturating_sub(4) as usize;
  let mut scroll = 0;
  let (visible, cursor_x) = scroll_into_view(&app.custom_input, app.custom_cursor, &mut scroll, inner_w);
  let paragraph = if app.custom_input.is_empty() {
    Paragraph::new(Span::styled(
      "Enter format id (e.g. 140+137 or bestvideo+bestaudio)",
      Style::default().fg(theme.muted),
    ))
  } else {
    Paragraph::new(visible).style(Style::default().fg(theme.fg))
  };
  frame.render_widget(paragraph.block(block), input_area);
  frame.set_cursor_position((input_area.x + 2 + cursor_x as u16, input_area.y + 1));

  let inner_w = list_area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = app
    .custom_suggestions()
    .into_iter()
    .enumerate()
    .map(|(i, f)| {
      let mut line = format_line(theme, f, false, inner_w.saturating_sub(f.selector.chars().count() + 2));
      line.spans.insert(0, Span::styled(format!("{}  ", f.selector), Style::default().fg(theme.accent)));
      ListItem::new(line).bg(striped_bg(theme, i, false))
    })
    .collect();
  frame.render_widget(List::new(items).block(rounded(theme).title(" Tab completes ")), list_area);
}

// --- Download ---

fn render_download(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let d = &app.download;
  let block = titled(theme, " Download ").padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [head_area, gauge_area, detail_area] =
    Layout::vertical([Constraint::Length(5), Constraint::Length(1), Constraint::Min(1)]).areas(inner);

  let (heading, color) = if d.completed {
    ("✓ Download Complete", theme.status)
  } else if d.cancelled {
    ("✕ Cancelled", theme.error)
  } else if d.paused {
    ("⏸ Paused", theme.muted)
  } else {
    ("⇣ Downloading", theme.accent)
  };
  let w = inner.width as usize;
  let head = vec![
    Line::from(Span::styled(heading, Style::default().fg(color).add_modifier(Modifier::BOLD))),
    Line::from(Span::styled(truncate_str(&d.title, w), Style::default().fg(theme.fg))),
    Line::from(Span::styled(
      truncate_str(app.selected_video.as_ref().map(|v| v.description.as_str()).unwrap_or(""), w),
      Style::default().fg(theme.muted),
    )),
    Line::from(vec![
      Span::styled("Format  ", Style::default().fg(theme.muted)),
      Span::styled(d.selector.as_str(), Style::default().fg(theme.fg)),
    ]),
  ];
  frame.render_widget(Paragraph::new(head), head_area);

  let gauge = Gauge::default()
    .ratio((d.percent / 100.0).clamp(0.0, 1.0))
    .label(format!("{:.1}%", d.percent))
    .gauge_style(Style::default().fg(color).bg(theme.stripe_bg));
  frame.render_widget(gauge, gauge_area);

  let mut lines = vec![Line::from("")];
  if d.completed {
    let saved = d.file_destination.clone().unwrap_or_else(|| d.destination.display().to_string());
    lines.push(Line::from(Span::styled(format!("Video saved to {}", saved), Style::default().fg(theme.fg))));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Press Enter to continue", Style::default().fg(theme.muted))));
  } else if d.cancelled {
    lines.push(Line::from(Span::styled("Download was cancelled.", Style::default().fg(theme.fg))));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Press Enter to continue", Style::default().fg(theme.muted))));
  } else {
    let field = |label: &'static str, value: String| {
      Line::from(vec![
        Span::styled(format!("{:<16}", label), Style::default().fg(theme.muted)),
        Span::styled(value, Style::default().fg(theme.fg)),
      ])
    };
    let or_dash = |s: &str| if s.is_empty() { "–".to_string() } else { s.to_string() };
    lines.push(field("Speed:", or_dash(&d.speed)));
    lines.push(field("Time remaining:", or_dash(&d.eta)));
    let dest = d.file_destination.clone().unwrap_or_else(|| d.destination.display().to_string());
    lines.push(field("Destination:", truncate_str(&dest, w.saturating_sub(16))));
    if !d.phase.is_empty() {
      lines.push(Line::from(""));
      let phase = d.phase.strip_prefix("[download] ").unwrap_or(&d.phase).trim();
      lines.push(Line::from(Span::styled(phase.to_string(), Style::default().fg(theme.muted))));
    }
  }
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), detail_area);
}

// --- Resume list ---

fn render_resume(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  if app.resume_records.is_empty() {
    let empty = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("No unfinished downloads", Style::default().fg(theme.muted))),
    ])
    .alignment(Alignment::Center)
    .block(titled(theme, " Resume "));
    frame.render_widget(empty, area);
    return;
  }

  let inner_w = area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = app
    .resume_records
    .iter()
    .enumerate()
    .map(|(i, r)| {
      let is_selected = Some(i) == app.resume_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let meta = if is_selected { theme.highlight_fg } else { theme.muted };
      let when = r.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M");
      ListItem::new(vec![
        Line::from(Span::styled(truncate_str(&r.title, inner_w), Style::default().fg(fg).add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(
          truncate_str(&format!("{}  •  {}  •  {}", when, r.format_id, r.url), inner_w),
          Style::default().fg(meta),
        )),
      ])
      .bg(striped_bg(theme, i, is_selected))
    })
    .collect();

  let list = List::new(items)
    .block(titled(theme, format!(" Resume — {} unfinished ", app.resume_records.len())))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, &mut app.resume_state);
}

// --- Status & footer ---

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(msg) = &app.info_message {
    (format!(" ℹ  {}", msg), Style::default().fg(theme.status))
  } else if let Some(class) = app.active_operation() {
    (format!(" ⏳ {} in progress", class.label()), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn footer_keys(app: &App) -> Vec<(&'static str, &'static str)> {
  match app.screen {
    Screen::SearchInput => {
      let mut k = vec![("Enter", "Search"), ("Tab", "Sort"), ("↑↓", "History"), ("^t", "Theme")];
      k.push(if app.input.is_empty() && !app.show_help { ("Esc", "Quit") } else { ("Esc", "Clear") });
      k
    }
    Screen::Loading(_) => vec![("Esc", "Cancel")],
    Screen::VideoList => vec![("Enter", "Formats"), ("j/k", "Navigate"), ("Esc", "Back")],
    Screen::FormatList if app.format_tab == FormatTab::Custom => {
      vec![("Enter", "Download"), ("Tab", "Complete"), ("S-Tab", "Tabs"), ("Esc", "Video tab")]
    }
    Screen::FormatList => vec![("Enter", "Download"), ("Tab", "Category"), ("j/k", "Navigate"), ("Esc", "Back")],
    Screen::Download if app.download.is_terminal() => vec![("Enter", "Continue"), ("b", "Formats")],
    Screen::Download => {
      let pause = if app.download.paused { "Resume" } else { "Pause" };
      vec![("p", pause), ("c", "Cancel")]
    }
    Screen::ResumeList => vec![("Enter", "Resume"), ("d", "Delete"), ("Esc", "Back")],
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys = footer_keys(app);

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::history::History;
  use crate::recovery::RecoveryStore;
  use ratatui::{Terminal, backend::TestBackend};

  fn app() -> App {
    App::new(Config::default(), History::in_memory(vec![]), RecoveryStore::disabled(), false)
  }

  // --- helpers ---

  #[test]
  fn truncate_adds_ellipsis() {
    assert_eq!(truncate_str("hello", 10), "hello");
    assert_eq!(truncate_str("hello world", 6), "hello…");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("日本", 1), 2);
  }

  #[test]
  fn scroll_follows_cursor() {
    let mut scroll = 0;
    let (visible, x) = scroll_into_view("abcdefghij", 10, &mut scroll, 5);
    assert_eq!(scroll, 6);
    assert_eq!(visible, "ghij");
    assert_eq!(x, 4);
    let (visible, x) = scroll_into_view("abcdefghij", 0, &mut scroll, 5);
    assert_eq!((visible.as_str(), x, scroll), ("abcde", 0, 0));
  }

  // --- rendering ---

  fn render(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
    terminal.draw(|frame| ui(frame, app)).unwrap();
    let buffer = terminal.backend().buffer().clone();
    buffer.content().iter().map(|c| c.symbol()).collect()
  }

  #[test]
  fn search_screen_renders_welcome_and_missing_ffmpeg() {
    let mut app = app();
    let screen = render(&mut app);
    assert!(screen.contains("Welcome to yd"));
    assert!(screen.contains("ffmpeg not found"));
  }

  #[test]
  fn download_screen_shows_completion() {
    let mut app = app();
    app.screen = Screen::Download;
    app.download.completed = true;
    app.download.percent = 100.0;
    app.download.file_destination = Some("/tmp/out.mp4".into());
    let screen = render(&mut app);
    assert!(screen.contains("Download Complete"));
    assert!(screen.contains("Video saved to /tmp/out.mp4"));
  }

  #[test]
  fn every_screen_renders() {
    let mut app = app();
    for screen in [
      Screen::SearchInput,
      Screen::Loading(LoadingKind::Search),
      Screen::VideoList,
      Screen::FormatList,
      Screen::Download,
      Screen::ResumeList,
    ] {
      app.screen = screen;
      render(&mut app);
    }
    app.screen = Screen::FormatList;
    app.set_format_tab(FormatTab::Custom);
    render(&mut app);
  }
}
