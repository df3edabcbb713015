//! Configuration types and parsing.
//!
//! `Config` is the tuning schema for the overlay engine: breakpoint, desktop
//! panel geometry and timing, bottom sheet gesture thresholds, search copy and
//! the colour palette. It stays plain and serialization-friendly; derived
//! values (palettes, durations) are computed by accessors and by the `theme`
//! module.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Table;

use crate::error::{Error, Result};
use crate::theme::parse_hex_color;

/// Known valid values for theme.mode.
const VALID_THEME_MODES: &[&str] = &["auto", "dark", "light"];

/// Embedded default configuration TOML, compiled into the binary.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../config.toml");

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Path where config was found, if any.
    pub source: Option<PathBuf>,
    /// Whether defaults were used (no config file found).
    pub used_defaults: bool,
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Viewport classification.
    pub breakpoint: BreakpointConfig,

    /// Anchored panel used on wide viewports.
    pub desktop: DesktopConfig,

    /// Bottom sheet used on narrow viewports.
    pub sheet: SheetConfig,

    /// Search-as-you-type content mode.
    pub search: SearchConfig,

    /// Colour palette for menu rows and surfaces.
    pub theme: ThemeConfig,
}

impl Config {
    /// Load configuration from the embedded default TOML string.
    pub fn from_default_toml() -> Result<Self> {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, merging with embedded defaults.
    ///
    /// Returns an error if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_with_defaults(&content)
    }

    /// Parse a TOML string, deep-merging it over the embedded defaults.
    pub fn load_with_defaults(user_toml: &str) -> Result<Self> {
        let mut base: Table = toml::from_str(DEFAULT_CONFIG_TOML)?;
        let user: Table = toml::from_str(user_toml)?;

        deep_merge_toml(&mut base, user);

        let config: Config = base.try_into()?;
        Ok(config)
    }

    /// Find and load configuration using the XDG lookup chain.
    ///
    /// If `explicit_path` is `Some`, that path is used directly and an error
    /// is returned if it doesn't exist or can't be parsed (no fallback).
    ///
    /// If `explicit_path` is `None`, searches in order:
    /// 1. `$XDG_CONFIG_HOME/smartdrop/config.toml`
    /// 2. `~/.config/smartdrop/config.toml`
    /// 3. `./config.toml` (current working directory)
    ///
    /// If no config file is found in the search chain, the embedded defaults
    /// are used.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<ConfigLoadResult> {
        if let Some(path) = explicit_path {
            let config = Self::load(path)?;
            return Ok(ConfigLoadResult {
                config,
                source: Some(path.to_path_buf()),
                used_defaults: false,
            });
        }

        // A config file that exists but fails to load is an error, never a
        // silent fallback to defaults.
        let search_paths = Self::config_search_paths();
        let mut first_error: Option<(PathBuf, Error)> = None;

        for path in &search_paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        return Ok(ConfigLoadResult {
                            config,
                            source: Some(path.clone()),
                            used_defaults: false,
                        });
                    }
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some((path.clone(), e));
                        }
                    }
                }
            }
        }

        if let Some((path, error)) = first_error {
            tracing::error!("Config file {:?} exists but failed to load: {}", path, error);
            return Err(error);
        }

        tracing::info!("No config file found, using built-in default config");
        tracing::debug!(
            "Searched: {}",
            search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ConfigLoadResult {
            config: Self::from_default_toml()?,
            source: None,
            used_defaults: true,
        })
    }

    /// Get the list of paths to search for config files.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_config).join("smartdrop/config.toml"));
        }

        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/smartdrop/config.toml"));
        }

        paths.push(PathBuf::from("config.toml"));

        paths
    }

    /// Validate the configuration, returning errors for invalid values.
    ///
    /// Every violation is collected so a single run reports all of them.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.breakpoint.mobile_below_px == 0 {
            errors.push("breakpoint.mobile_below_px: must be greater than 0".to_string());
        }

        for (key, value) in [
            ("desktop.offset_px", self.desktop.offset_px),
            ("desktop.edge_margin_px", self.desktop.edge_margin_px),
            ("desktop.min_width_px", self.desktop.min_width_px),
            ("desktop.max_width_px", self.desktop.max_width_px),
            ("desktop.max_height_px", self.desktop.max_height_px),
            ("desktop.estimated_width_px", self.desktop.estimated_width_px),
            ("sheet.dismiss_threshold_px", self.sheet.dismiss_threshold_px),
            ("sheet.max_height_fraction", self.sheet.max_height_fraction),
            ("sheet.content_max_fraction", self.sheet.content_max_fraction),
        ] {
            if !value.is_finite() {
                errors.push(format!(
                    "{}: invalid value '{}', must be a finite number",
                    key, value
                ));
            }
        }

        if self.desktop.offset_px < 0.0 {
            errors.push(format!(
                "desktop.offset_px: invalid value '{}', must not be negative",
                self.desktop.offset_px
            ));
        }

        if self.desktop.edge_margin_px < 0.0 {
            errors.push(format!(
                "desktop.edge_margin_px: invalid value '{}', must not be negative",
                self.desktop.edge_margin_px
            ));
        }

        if self.desktop.exit_duration_ms == 0 {
            errors.push("desktop.exit_duration_ms: must be greater than 0".to_string());
        }

        if self.desktop.min_width_px > self.desktop.max_width_px {
            errors.push(format!(
                "desktop.min_width_px: {} exceeds desktop.max_width_px {}",
                self.desktop.min_width_px, self.desktop.max_width_px
            ));
        }

        if self.desktop.max_height_px <= 0.0 {
            errors.push("desktop.max_height_px: must be greater than 0".to_string());
        }

        if self.sheet.exit_duration_ms == 0 {
            errors.push("sheet.exit_duration_ms: must be greater than 0".to_string());
        }

        if self.sheet.dismiss_threshold_px <= 0.0 {
            errors.push(format!(
                "sheet.dismiss_threshold_px: invalid value '{}', must be greater than 0",
                self.sheet.dismiss_threshold_px
            ));
        }

        for (key, value) in [
            ("sheet.max_height_fraction", self.sheet.max_height_fraction),
            ("sheet.content_max_fraction", self.sheet.content_max_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(format!(
                    "{}: invalid value '{}', must be in (0.0, 1.0]",
                    key, value
                ));
            }
        }

        if !VALID_THEME_MODES.contains(&self.theme.mode.as_str()) {
            errors.push(format!(
                "theme.mode: invalid value '{}', expected one of: {}",
                self.theme.mode,
                VALID_THEME_MODES.join(", ")
            ));
        }

        for (key, value) in self.theme.colors() {
            if !value.starts_with('#') || parse_hex_color(value).is_none() {
                errors.push(format!(
                    "theme.{}: invalid value '{}', expected a hex color like '#3b82f6'",
                    key, value
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors))
        }
    }

    /// Check for potential configuration issues and return warnings.
    ///
    /// Unlike `validate()`, these are non-fatal.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.sheet.content_max_fraction > self.sheet.max_height_fraction {
            warnings.push(format!(
                "sheet.content_max_fraction ({}) exceeds sheet.max_height_fraction ({}); \
                 the item list will be cut off by the sheet",
                self.sheet.content_max_fraction, self.sheet.max_height_fraction
            ));
        }

        if self.desktop.focus_delay_ms >= self.desktop.exit_duration_ms {
            warnings.push(format!(
                "desktop.focus_delay_ms ({}) is not shorter than desktop.exit_duration_ms ({}); \
                 quick open/close cycles will never move focus into the menu",
                self.desktop.focus_delay_ms, self.desktop.exit_duration_ms
            ));
        }

        let narrowest_desktop = self.breakpoint.mobile_below_px as f64;
        if self.desktop.min_width_px + 2.0 * self.desktop.edge_margin_px > narrowest_desktop {
            warnings.push(format!(
                "desktop.min_width_px plus margins does not fit the narrowest desktop viewport ({}px)",
                self.breakpoint.mobile_below_px
            ));
        }

        if self.sheet.exit_duration_ms < self.desktop.exit_duration_ms {
            warnings.push(
                "sheet.exit_duration_ms is shorter than desktop.exit_duration_ms; \
                 the taller sheet will appear to snap away"
                    .to_string(),
            );
        }

        warnings
    }

    /// Print a human-readable summary of the configuration.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push("Breakpoint:".to_string());
        lines.push(format!(
            "  mobile below: {}px",
            self.breakpoint.mobile_below_px
        ));

        lines.push("\nDesktop panel:".to_string());
        lines.push(format!(
            "  offset: {}px, edge margin: {}px",
            self.desktop.offset_px, self.desktop.edge_margin_px
        ));
        lines.push(format!(
            "  width: {}-{}px, list height: {}px",
            self.desktop.min_width_px, self.desktop.max_width_px, self.desktop.max_height_px
        ));
        lines.push(format!(
            "  exit: {}ms, focus delay: {}ms",
            self.desktop.exit_duration_ms, self.desktop.focus_delay_ms
        ));

        lines.push("\nBottom sheet:".to_string());
        lines.push(format!(
            "  exit: {}ms, dismiss threshold: {}px",
            self.sheet.exit_duration_ms, self.sheet.dismiss_threshold_px
        ));
        lines.push(format!(
            "  height cap: {}%, list cap: {}%",
            self.sheet.max_height_fraction * 100.0,
            self.sheet.content_max_fraction * 100.0
        ));

        lines.push("\nSearch:".to_string());
        lines.push(format!("  placeholder: {:?}", self.search.placeholder));

        lines.push("\nTheme:".to_string());
        lines.push(format!("  mode: {}", self.theme.mode));
        for (key, value) in self.theme.colors() {
            lines.push(format!("  {}: {}", key, value));
        }

        lines.join("\n")
    }
}

/// Deep merge two TOML tables, with `overlay` values taking precedence.
///
/// For nested tables, recursively merges. For arrays and other values,
/// the overlay value completely replaces the base value.
fn deep_merge_toml(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge_toml(base_table, overlay_table);
            }
            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}

/// Viewport classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakpointConfig {
    /// Widths strictly below this are mobile; at or above are desktop.
    pub mobile_below_px: u32,
}

impl Default for BreakpointConfig {
    fn default() -> Self {
        Self {
            mobile_below_px: 640,
        }
    }
}

/// Anchored panel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesktopConfig {
    /// Distance between trigger and panel.
    pub offset_px: f64,

    /// Minimum distance between panel and viewport edges.
    pub edge_margin_px: f64,

    /// Exit transition length before unmount.
    pub exit_duration_ms: u64,

    /// Delay before focusing the first enabled item.
    pub focus_delay_ms: u64,

    pub min_width_px: f64,

    pub max_width_px: f64,

    /// Height of the scrolling item list.
    pub max_height_px: f64,

    /// Panel width assumed before the panel has been measured.
    pub estimated_width_px: f64,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            offset_px: 4.0,
            edge_margin_px: 8.0,
            exit_duration_ms: 150,
            focus_delay_ms: 50,
            min_width_px: 180.0,
            max_width_px: 320.0,
            max_height_px: 280.0,
            estimated_width_px: 220.0,
        }
    }
}

impl DesktopConfig {
    pub fn exit_duration(&self) -> Duration {
        Duration::from_millis(self.exit_duration_ms)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }
}

/// Bottom sheet configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Exit transition length before unmount. Longer than the desktop
    /// value because the sheet travels further.
    pub exit_duration_ms: u64,

    /// Drag distance that commits a dismissal on release.
    pub dismiss_threshold_px: f64,

    /// Sheet height cap as a fraction of the viewport height.
    pub max_height_fraction: f64,

    /// Scrolling list cap as a fraction of the viewport height.
    pub content_max_fraction: f64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            exit_duration_ms: 300,
            dismiss_threshold_px: 100.0,
            max_height_fraction: 0.85,
            content_max_fraction: 0.6,
        }
    }
}

impl SheetConfig {
    pub fn exit_duration(&self) -> Duration {
        Duration::from_millis(self.exit_duration_ms)
    }
}

/// Search input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Placeholder used when the content does not supply one.
    pub placeholder: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            placeholder: "Search...".to_string(),
        }
    }
}

/// Colour palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// "auto", "dark" or "light". "auto" derives the mode from `card`.
    pub mode: String,
    /// Selected rows and call-to-action colour.
    pub accent: String,
    /// Destructive rows.
    pub error: String,
    /// Primary row text.
    pub text: String,
    /// Labels, placeholders and empty states.
    pub muted: String,
    /// Panel background.
    pub card: String,
    /// Separators and panel border.
    pub border: String,
    /// Search field and hover background.
    pub surface: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            mode: "auto".to_string(),
            accent: "#3b82f6".to_string(),
            error: "#ef4444".to_string(),
            text: "#1f2937".to_string(),
            muted: "#6b7280".to_string(),
            card: "#ffffff".to_string(),
            border: "#e5e7eb".to_string(),
            surface: "#f3f4f6".to_string(),
        }
    }
}

impl ThemeConfig {
    /// All colour keys with their values, in schema order.
    pub fn colors(&self) -> [(&'static str, &str); 7] {
        [
            ("accent", &self.accent),
            ("error", &self.error),
            ("text", &self.text),
            ("muted", &self.muted),
            ("card", &self.card),
            ("border", &self.border),
            ("surface", &self.surface),
        ]
    }
}
