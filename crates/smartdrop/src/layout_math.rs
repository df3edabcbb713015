//! Pure geometry for overlay placement and sheet gestures.
//!
//! These functions have no host dependencies and are unit tested directly.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which rendering engine paints the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportClass {
    Mobile,
    Desktop,
}

impl ViewportClass {
    /// Classify a viewport width: strictly below the breakpoint is mobile.
    ///
    /// ```
    /// use smartdrop::layout_math::ViewportClass;
    ///
    /// assert_eq!(ViewportClass::from_width(639.0, 640), ViewportClass::Mobile);
    /// assert_eq!(ViewportClass::from_width(640.0, 640), ViewportClass::Desktop);
    /// ```
    pub fn from_width(width: f64, mobile_below_px: u32) -> Self {
        if width < mobile_below_px as f64 {
            ViewportClass::Mobile
        } else {
            ViewportClass::Desktop
        }
    }
}

/// Horizontal alignment of the panel against its trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

/// Anchor point of the enter/exit scale transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformOrigin {
    /// Panel below the trigger grows downward from its top edge.
    Top,
    /// Flipped panel grows upward from its bottom edge.
    Bottom,
}

/// Computed placement of the anchored panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
    /// Trigger width, used as the panel's minimum width hint.
    pub width: f64,
    /// Panel placed above the trigger.
    pub flipped: bool,
}

impl Position {
    pub fn transform_origin(&self) -> TransformOrigin {
        if self.flipped {
            TransformOrigin::Bottom
        } else {
            TransformOrigin::Top
        }
    }
}

/// Inputs for [`compute_position`].
#[derive(Debug, Clone, Copy)]
pub struct PlacementInput {
    pub trigger: Rect,
    pub panel: Size,
    pub align: Align,
    pub offset: f64,
    pub margin: f64,
    pub viewport: Viewport,
}

/// Clamp a coordinate so a span of `extent` stays `margin` away from both
/// edges of `[0, limit]`.
///
/// When the span cannot fit, the coordinate pins to `margin`.
///
/// ```
/// use smartdrop::layout_math::clamp_to_edges;
///
/// assert_eq!(clamp_to_edges(100.0, 200.0, 1000.0, 8.0), 100.0);
/// assert_eq!(clamp_to_edges(900.0, 200.0, 1000.0, 8.0), 792.0);
/// assert_eq!(clamp_to_edges(-50.0, 200.0, 1000.0, 8.0), 8.0);
/// // Too wide to fit: pin to the leading margin
/// assert_eq!(clamp_to_edges(0.0, 1200.0, 1000.0, 8.0), 8.0);
/// ```
pub fn clamp_to_edges(value: f64, extent: f64, limit: f64, margin: f64) -> f64 {
    let max = limit - extent - margin;
    // f64::clamp panics when min > max
    if max >= margin {
        value.clamp(margin, max)
    } else {
        margin
    }
}

/// Limit a panel width to `[min, max]`.
///
/// Unlike `f64::clamp` this never panics: a NaN bound is ignored and an
/// inverted range resolves to `min`.
///
/// ```
/// use smartdrop::layout_math::limit_width;
///
/// assert_eq!(limit_width(900.0, 180.0, 320.0), 320.0);
/// assert_eq!(limit_width(60.0, 180.0, 320.0), 180.0);
/// assert_eq!(limit_width(250.0, f64::NAN, 320.0), 250.0);
/// assert_eq!(limit_width(250.0, 400.0, 300.0), 400.0);
/// ```
pub fn limit_width(width: f64, min: f64, max: f64) -> f64 {
    width.min(max).max(min)
}

/// Compute the fixed on-screen position of the anchored panel.
///
/// The panel goes below the trigger unless the space below cannot hold it and
/// the space above is larger, in which case it flips above. Horizontally it
/// aligns to the trigger's start, center or end, and both axes are then kept
/// inside the viewport minus `margin`.
pub fn compute_position(input: PlacementInput) -> Position {
    let PlacementInput {
        trigger,
        panel,
        align,
        offset,
        margin,
        viewport,
    } = input;

    let space_below = viewport.height - trigger.bottom() - offset;
    let space_above = trigger.top() - offset;
    let flipped = space_below < panel.height && space_above > space_below;

    let top = if flipped {
        trigger.top() - offset - panel.height
    } else {
        trigger.bottom() + offset
    };

    let left = match align {
        Align::Start => trigger.left(),
        Align::Center => trigger.center_x() - panel.width / 2.0,
        Align::End => trigger.right() - panel.width,
    };

    Position {
        top: clamp_to_edges(top, panel.height, viewport.height, margin),
        left: clamp_to_edges(left, panel.width, viewport.width, margin),
        width: trigger.width,
        flipped,
    }
}

/// Downward-only drag distance. Upward movement clamps to 0.
pub fn drag_delta(start_y: f64, current_y: f64) -> f64 {
    (current_y - start_y).max(0.0)
}

/// What releasing a sheet drag does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragOutcome {
    /// Animate offscreen, then close.
    Dismiss,
    /// Animate back to rest; the overlay stays open.
    SnapBack,
}

/// Strictly past the threshold dismisses; at or below snaps back.
pub fn resolve_drag(delta: f64, threshold: f64) -> DragOutcome {
    if delta > threshold {
        DragOutcome::Dismiss
    } else {
        DragOutcome::SnapBack
    }
}

/// Height caps of the bottom sheet for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetMetrics {
    /// Whole sheet.
    pub max_height: f64,
    /// Scrolling item list inside it.
    pub content_max_height: f64,
}

pub fn sheet_metrics(viewport: Viewport, max_fraction: f64, content_fraction: f64) -> SheetMetrics {
    SheetMetrics {
        max_height: (viewport.height * max_fraction).floor(),
        content_max_height: (viewport.height * content_fraction).floor(),
    }
}

/// Rotation of the trigger's chevron indicator.
pub fn chevron_rotation(open: bool) -> f64 {
    if open { 180.0 } else { 0.0 }
}
