//! Shared configuration, theming and logging for smartdrop.

pub mod config;
pub mod error;
pub mod logging;
pub mod theme;

pub use config::{
    BreakpointConfig, Config, ConfigLoadResult, DesktopConfig, SearchConfig, SheetConfig,
    ThemeConfig,
};
pub use error::{Error, Result};
pub use theme::{MenuPalette, RowColors, RowIntent};
