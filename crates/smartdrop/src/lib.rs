//! smartdrop - floating menu overlays for pointer and touch layouts.
//!
//! A [`Dropdown`] controller toggles content from a bound trigger and paints
//! it with one of two surfaces chosen by viewport width: a panel anchored to
//! the trigger that flips above it when space runs out, or a bottom sheet
//! that can be dragged away. All platform access goes through the [`Host`]
//! trait; [`HeadlessHost`] runs the engine in memory.

pub mod content;
pub mod controller;
pub mod error;
pub mod host;
pub mod interaction;
pub mod layout_math;
pub mod presence;
pub mod primitives;
pub mod replay;
pub mod scroll_lock;
pub mod trigger;
pub mod widgets;

pub use content::ContentConfig;
pub use controller::{Dropdown, DropdownOptions, OverlayNodes, OverlayView};
pub use error::{Error, Result};
pub use host::{HeadlessHost, Host};
pub use layout_math::{Align, ViewportClass};
pub use primitives::{Item, MenuEntry, MenuScope};
pub use trigger::TriggerHandle;
