//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Board and HUD colours.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Border of a hole holding a cat.
    pub cat: Color,
    /// Border of a hole holding a trap.
    pub trap: Color,
    /// Flash over a petted hole.
    pub flash: Color,
    /// Border of an empty hole.
    pub hole: Color,
    /// Board background.
    pub bg: Color,
    /// Panel borders.
    pub div_line: Color,
    /// Text (score, level, timer).
    pub main_fg: Color,
    /// Titles and highlights.
    pub title: Color,
    /// Hints and secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark, matching onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            cat: Color::Rgb(0x98, 0xC3, 0x79),
            trap: Color::Rgb(0xE0, 0x6C, 0x75),
            flash: Color::Rgb(0xE5, 0xC0, 0x7B),
            hole: Color::Rgb(0x3F, 0x44, 0x4F),
            bg: Color::Rgb(0x31, 0x35, 0x3F),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark if `path` is None or missing, then applies `palette`.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))
            }
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Cat/trap colours that stay distinguishable for the chosen palette.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.cat = Color::Rgb(0x00, 0xFF, 0x00);
                self.trap = Color::Rgb(0xFF, 0x00, 0x00);
                self.flash = Color::Rgb(0xFF, 0xFF, 0x00);
                self.main_fg = Color::White;
            }
            crate::Palette::Colorblind => {
                // Blue vs orange instead of green vs red.
                self.cat = Color::Rgb(0x00, 0x77, 0xBB);
                self.trap = Color::Rgb(0xEE, 0x77, 0x33);
                self.flash = Color::Rgb(0xBB, 0xBB, 0x00);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()));
        let d = Self::onedark_default();
        Self {
            cat: get(&["mem_box", "cpu_start"]).unwrap_or(d.cat),
            trap: get(&["cpu_end", "temp_end"]).unwrap_or(d.trap),
            flash: get(&["hi_fg", "title"]).unwrap_or(d.flash),
            hole: get(&["div_line"]).unwrap_or(d.hole),
            bg: get(&["meter_bg"]).unwrap_or(d.bg),
            div_line: get(&["div_line"]).unwrap_or(d.div_line),
            main_fg: get(&["main_fg"]).unwrap_or(d.main_fg),
            title: get(&["title"]).unwrap_or(d.title),
            inactive_fg: get(&["inactive_fg"]).unwrap_or(d.inactive_fg),
        }
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some((key, rest)) = stripped.split_once(']') else {
            continue;
        };
        let Some((_, value)) = rest.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?),
        3 => (
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        ),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
