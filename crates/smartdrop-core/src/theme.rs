//! Menu palette derived from the `[theme]` config section.
//!
//! `MenuPalette` resolves the colours for every row intent (plain, selected,
//! destructive, disabled) and the surrounding surfaces, and can emit the CSS
//! custom properties a web host needs.

use serde::Serialize;

use crate::config::ThemeConfig;

/// Background tint applied behind selected rows.
const SELECTED_BACKGROUND_OPACITY: f64 = 0.08;

/// Opacity of disabled rows.
const DISABLED_OPACITY: f64 = 0.4;

/// Backdrop behind the bottom sheet.
const BACKDROP_OPACITY: f64 = 0.4;

const DARK_LUMINANCE_THRESHOLD: f64 = 0.179;

/// Parse a hex color string to RGB tuple. Returns None if invalid.
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let color = color.trim().trim_start_matches('#');

    // Expand shorthand (e.g., "fff" -> "ffffff")
    let color = if color.len() == 3 {
        color.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        color.to_string()
    };

    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let r = u8::from_str_radix(&color[0..2], 16).ok()?;
    let g = u8::from_str_radix(&color[2..4], 16).ok()?;
    let b = u8::from_str_radix(&color[4..6], 16).ok()?;

    Some((r, g, b))
}

/// Calculate relative luminance per WCAG formula (0.0 = black, 1.0 = white).
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    fn channel(c: u8) -> f64 {
        let c_srgb = c as f64 / 255.0;
        if c_srgb <= 0.03928 {
            c_srgb / 12.92
        } else {
            ((c_srgb + 0.055) / 1.055).powf(2.4)
        }
    }

    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

/// Return true if the color is considered dark (low luminance).
pub fn is_dark_color(color: &str) -> bool {
    match parse_hex_color(color) {
        Some((r, g, b)) => relative_luminance(r, g, b) < DARK_LUMINANCE_THRESHOLD,
        None => true,
    }
}

pub fn rgba_str(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({}, {}, {}, {})", r, g, b, a)
}

/// "r g b" triplet, the form used inside `rgb(var(--name))`.
pub fn rgb_triplet(color: &str) -> Option<String> {
    let (r, g, b) = parse_hex_color(color)?;
    Some(format!("{} {} {}", r, g, b))
}

/// Visual intent flags of a menu row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowIntent {
    pub selected: bool,
    pub disabled: bool,
    pub destructive: bool,
}

/// Resolved colours for one menu row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowColors {
    pub foreground: String,
    pub background: String,
    pub opacity: f64,
}

/// Resolved palette for menu surfaces and rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuPalette {
    pub is_dark: bool,
    pub accent: String,
    pub error: String,
    pub text: String,
    pub muted: String,
    pub card: String,
    pub border: String,
    pub surface: String,
}

impl MenuPalette {
    pub fn from_config(theme: &ThemeConfig) -> Self {
        let is_dark = match theme.mode.as_str() {
            "dark" => true,
            "light" => false,
            _ => is_dark_color(&theme.card),
        };

        Self {
            is_dark,
            accent: theme.accent.clone(),
            error: theme.error.clone(),
            text: theme.text.clone(),
            muted: theme.muted.clone(),
            card: theme.card.clone(),
            border: theme.border.clone(),
            surface: theme.surface.clone(),
        }
    }

    /// Colours for a row with the given intent.
    ///
    /// Destructive wins over selected for the foreground; only selected rows
    /// get a tinted background.
    pub fn row_colors(&self, intent: RowIntent) -> RowColors {
        let foreground = if intent.destructive {
            self.error.clone()
        } else if intent.selected {
            self.accent.clone()
        } else {
            self.text.clone()
        };

        let background = if intent.selected {
            match parse_hex_color(&self.accent) {
                Some((r, g, b)) => rgba_str(r, g, b, SELECTED_BACKGROUND_OPACITY),
                None => "transparent".to_string(),
            }
        } else {
            "transparent".to_string()
        };

        let opacity = if intent.disabled {
            DISABLED_OPACITY
        } else {
            1.0
        };

        RowColors {
            foreground,
            background,
            opacity,
        }
    }

    /// Backdrop colour drawn behind the bottom sheet.
    pub fn backdrop(&self) -> String {
        rgba_str(0, 0, 0, BACKDROP_OPACITY)
    }

    /// CSS custom properties (`--card: 255 255 255;` ...) for web hosts.
    pub fn css_vars_block(&self) -> String {
        let mut out = String::from(":root {\n");
        for (name, value) in [
            ("card", &self.card),
            ("border", &self.border),
            ("surface", &self.surface),
            ("copy-primary", &self.text),
            ("copy-muted", &self.muted),
            ("cta", &self.accent),
            ("error", &self.error),
        ] {
            if let Some(triplet) = rgb_triplet(value) {
                out.push_str(&format!("    --{}: {};\n", name, triplet));
            }
        }
        out.push('}');
        out
    }
}

impl Default for MenuPalette {
    fn default() -> Self {
        Self::from_config(&ThemeConfig::default())
    }
}
