use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 4] = [
  Theme {
    name: "Pastel",
    bg: Color::Rgb(30, 30, 46),
    fg: Color::Rgb(205, 214, 244),
    accent: Color::Rgb(245, 194, 231),
    muted: Color::Rgb(127, 132, 156),
    border: Color::Rgb(88, 91, 112),
    highlight_fg: Color::Rgb(30, 30, 46),
    highlight_bg: Color::Rgb(203, 166, 247),
    stripe_bg: Color::Rgb(36, 36, 54),
    status: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
    key_fg: Color::Rgb(30, 30, 46),
    key_bg: Color::Rgb(180, 190, 254),
  },
  Theme {
    name: "Mint",
    bg: Color::Rgb(24, 34, 32),
    fg: Color::Rgb(220, 240, 232),
    accent: Color::Rgb(130, 224, 190),
    muted: Color::Rgb(120, 146, 138),
    border: Color::Rgb(70, 96, 88),
    highlight_fg: Color::Rgb(24, 34, 32),
    highlight_bg: Color::Rgb(130, 224, 190),
    stripe_bg: Color::Rgb(30, 42, 40),
    status: Color::Rgb(190, 230, 150),
    error: Color::Rgb(240, 128, 128),
    key_fg: Color::Rgb(24, 34, 32),
    key_bg: Color::Rgb(160, 210, 200),
  },
  Theme {
    name: "Peach",
    bg: Color::Rgb(40, 30, 30),
    fg: Color::Rgb(245, 228, 220),
    accent: Color::Rgb(250, 179, 135),
    muted: Color::Rgb(150, 128, 120),
    border: Color::Rgb(100, 80, 74),
    highlight_fg: Color::Rgb(40, 30, 30),
    highlight_bg: Color::Rgb(250, 179, 135),
    stripe_bg: Color::Rgb(48, 36, 36),
    status: Color::Rgb(220, 210, 140),
    error: Color::Rgb(240, 110, 120),
    key_fg: Color::Rgb(40, 30, 30),
    key_bg: Color::Rgb(242, 205, 205),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Green,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];
