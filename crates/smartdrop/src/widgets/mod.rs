//! Rendering surfaces for the overlay.
//!
//! Exactly one surface is mounted at a time, chosen by viewport class:
//! - `AnchoredPanel` - fixed panel next to the trigger (desktop)
//! - `BottomSheet` - bottom-pinned sheet with drag-to-dismiss (mobile)

mod anchored;
mod bottom_sheet;

pub use anchored::{AnchoredPanel, AnchoredView, Placement};
pub use bottom_sheet::{BottomSheet, DismissCallback, DragState, SheetView};
