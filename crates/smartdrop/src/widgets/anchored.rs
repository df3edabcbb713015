//! Desktop surface: a fixed-position panel anchored to the trigger.
//!
//! The panel is measured after its content is built, placed with
//! [`compute_position`], and re-placed on ancestor scroll (capture phase) and
//! window resize for as long as tracking is attached. While closing or closed
//! it stays idle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use smartdrop_core::DesktopConfig;
use tracing::{debug, warn};

use crate::host::{EventKind, Host, ListenerId, ListenerTarget, NodeId, Phase};
use crate::layout_math::{
    Align, PlacementInput, Position, Size, TransformOrigin, compute_position, limit_width,
};

/// Measured widths at or below this are treated as "not laid out yet".
const MIN_VALID_WIDTH: f64 = 20.0;

/// Where the panel goes relative to the trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub align: Align,
    pub offset: f64,
}

/// Snapshot of the desktop surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchoredView {
    pub position: Option<Position>,
    pub transform_origin: Option<TransformOrigin>,
    pub visible: bool,
    pub tracking: bool,
}

pub struct AnchoredPanel {
    host: Rc<dyn Host>,
    settings: DesktopConfig,
    placement: Placement,
    trigger: Option<NodeId>,
    panel: NodeId,
    position: Cell<Option<Position>>,
    visible: Cell<bool>,
    tracking: RefCell<Vec<ListenerId>>,
    torn_down: Cell<bool>,
}

impl AnchoredPanel {
    /// Create the panel node in the overlay portal.
    pub fn mount(
        host: Rc<dyn Host>,
        settings: &DesktopConfig,
        placement: Placement,
        trigger: Option<NodeId>,
        content_id: &str,
    ) -> Rc<Self> {
        let panel = host.create_node(None);
        host.set_attribute(panel, "id", content_id);
        host.set_attribute(panel, "role", "menu");
        host.set_attribute(panel, "data-state", "closed");

        debug!("Anchored panel {} mounted", content_id);

        Rc::new(Self {
            host,
            settings: settings.clone(),
            placement,
            trigger,
            panel,
            position: Cell::new(None),
            visible: Cell::new(false),
            tracking: RefCell::new(Vec::new()),
            torn_down: Cell::new(false),
        })
    }

    /// Node content is built into.
    pub fn node(&self) -> NodeId {
        self.panel
    }

    pub fn position(&self) -> Option<Position> {
        self.position.get()
    }

    pub fn is_tracking(&self) -> bool {
        !self.tracking.borrow().is_empty()
    }

    /// Panel size used for placement: the measured size with an estimate for
    /// unmeasured widths, limited to the configured width range. The height is
    /// taken as measured; `max_height_px` only caps the scrolling list.
    pub fn panel_size(&self) -> Size {
        let measured = self.host.bounding_rect(self.panel);
        let width = if measured.width > MIN_VALID_WIDTH {
            measured.width
        } else {
            self.settings.estimated_width_px
        };

        Size {
            width: limit_width(
                width,
                self.settings.min_width_px,
                self.settings.max_width_px,
            ),
            height: measured.height,
        }
    }

    /// Recompute and apply the position. Safe to call any number of times.
    pub fn reposition(&self) -> Option<Position> {
        if self.torn_down.get() {
            return None;
        }
        let Some(trigger) = self.trigger else {
            warn!("Anchored panel has no trigger to position against");
            return None;
        };

        let position = compute_position(PlacementInput {
            trigger: self.host.bounding_rect(trigger),
            panel: self.panel_size(),
            align: self.placement.align,
            offset: self.placement.offset,
            margin: self.settings.edge_margin_px,
            viewport: self.host.viewport(),
        });

        if position.flipped && !self.position.get().is_some_and(|p| p.flipped) {
            debug!("Anchored panel flipped above trigger");
        }

        let origin = match position.transform_origin() {
            TransformOrigin::Top => "top",
            TransformOrigin::Bottom => "bottom",
        };
        self.host.set_attribute(
            self.panel,
            "style",
            &format!(
                "position: fixed; top: {}px; left: {}px; min-width: {}px; max-width: {}px; transform-origin: {};",
                position.top,
                position.left,
                position.width.max(self.settings.min_width_px),
                self.settings.max_width_px,
                origin
            ),
        );
        self.host.set_attribute(
            self.panel,
            "data-side",
            if position.flipped { "top" } else { "bottom" },
        );

        self.position.set(Some(position));
        Some(position)
    }

    /// Follow scroll and resize. Idempotent.
    pub fn attach_tracking(self: &Rc<Self>) {
        if self.torn_down.get() || self.is_tracking() {
            return;
        }

        let mut ids = Vec::with_capacity(2);
        for (kind, phase) in [
            (EventKind::Scroll, Phase::Capture),
            (EventKind::Resize, Phase::Bubble),
        ] {
            let weak = Rc::downgrade(self);
            ids.push(self.host.add_listener(
                ListenerTarget::Window,
                kind,
                phase,
                Rc::new(move |_| {
                    if let Some(panel) = weak.upgrade() {
                        panel.reposition();
                    }
                }),
            ));
        }
        *self.tracking.borrow_mut() = ids;
    }

    pub fn detach_tracking(&self) {
        let ids = std::mem::take(&mut *self.tracking.borrow_mut());
        for id in ids {
            self.host.remove_listener(id);
        }
    }

    pub fn show(&self) {
        self.visible.set(true);
        self.host.set_attribute(self.panel, "data-state", "open");
    }

    pub fn hide(&self) {
        self.visible.set(false);
        self.detach_tracking();
        self.host.set_attribute(self.panel, "data-state", "closed");
    }

    /// Remove listeners and the panel node. Idempotent.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.detach_tracking();
        self.host.remove_node(self.panel);
        debug!("Anchored panel unmounted");
    }

    pub fn view(&self) -> AnchoredView {
        let position = self.position.get();
        AnchoredView {
            position,
            transform_origin: position.map(|p| p.transform_origin()),
            visible: self.visible.get(),
            tracking: self.is_tracking(),
        }
    }
}

impl Drop for AnchoredPanel {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Event, HeadlessHost};
    use crate::layout_math::{Rect, Viewport};

    fn setup(trigger_rect: Rect) -> (Rc<HeadlessHost>, Rc<AnchoredPanel>) {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let trigger = host.add_element(trigger_rect);
        let panel = AnchoredPanel::mount(
            host.clone(),
            &DesktopConfig::default(),
            Placement {
                align: Align::Start,
                offset: 4.0,
            },
            Some(trigger),
            "smartdrop-content-test",
        );
        (host, panel)
    }

    #[test]
    fn test_reposition_flips_near_bottom() {
        let (_host, panel) = setup(Rect::new(100.0, 650.0, 120.0, 50.0));
        let position = panel.reposition().unwrap();

        assert!(position.flipped);
        assert_eq!(position.top, 366.0);
        assert_eq!(position.left, 100.0);
        assert_eq!(
            panel.view().transform_origin,
            Some(TransformOrigin::Bottom)
        );
    }

    #[test]
    fn test_panel_size_estimate_and_limits() {
        let (host, panel) = setup(Rect::new(100.0, 100.0, 120.0, 40.0));

        // Title and search input add to the list cap
        host.set_rect(panel.node(), Rect::new(0.0, 0.0, 0.0, 500.0));
        assert_eq!(panel.panel_size(), Size { width: 220.0, height: 500.0 });

        host.set_rect(panel.node(), Rect::new(0.0, 0.0, 900.0, 120.0));
        assert_eq!(panel.panel_size(), Size { width: 320.0, height: 120.0 });

        host.set_rect(panel.node(), Rect::new(0.0, 0.0, 60.0, 120.0));
        assert_eq!(panel.panel_size().width, 180.0);
    }

    #[test]
    fn test_panel_size_survives_nan_width_bounds() {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let trigger = host.add_element(Rect::new(100.0, 100.0, 120.0, 40.0));
        let settings = DesktopConfig {
            min_width_px: f64::NAN,
            ..DesktopConfig::default()
        };
        let panel = AnchoredPanel::mount(
            host.clone(),
            &settings,
            Placement {
                align: Align::Start,
                offset: 4.0,
            },
            Some(trigger),
            "smartdrop-content-test",
        );

        host.set_rect(panel.node(), Rect::new(0.0, 0.0, 900.0, 120.0));
        assert_eq!(panel.panel_size().width, 320.0);
        assert!(panel.reposition().is_some());
    }

    #[test]
    fn test_tall_panel_flips_on_measured_height() {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let trigger = host.add_element(Rect::new(100.0, 420.0, 120.0, 40.0));
        let panel = AnchoredPanel::mount(
            host.clone(),
            &DesktopConfig::default(),
            Placement {
                align: Align::Start,
                offset: 4.0,
            },
            Some(trigger),
            "smartdrop-content-test",
        );
        host.set_rect(panel.node(), Rect::new(0.0, 0.0, 220.0, 340.0));

        // Below: 800 - 460 - 4 = 336 < 340, above: 416
        let position = panel.reposition().unwrap();
        assert!(position.flipped);
        assert_eq!(position.top, 420.0 - 4.0 - 340.0);
    }

    #[test]
    fn test_tracking_follows_scroll_and_resize() {
        let (host, panel) = setup(Rect::new(100.0, 100.0, 120.0, 40.0));
        panel.reposition();
        panel.attach_tracking();
        panel.attach_tracking();
        assert_eq!(host.listener_count(), 2);

        let trigger_node = panel.trigger.unwrap();
        host.set_rect(trigger_node, Rect::new(100.0, 40.0, 120.0, 40.0));
        host.dispatch(Event::Scroll { target: None });
        assert_eq!(panel.position().unwrap().top, 84.0);

        panel.hide();
        assert_eq!(host.listener_count(), 0);
        host.set_rect(trigger_node, Rect::new(100.0, 10.0, 120.0, 40.0));
        host.dispatch(Event::Resize);
        // Idle while closed
        assert_eq!(panel.position().unwrap().top, 84.0);
    }

    #[test]
    fn test_missing_trigger_skips_positioning() {
        let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
        let panel = AnchoredPanel::mount(
            host.clone(),
            &DesktopConfig::default(),
            Placement {
                align: Align::Center,
                offset: 4.0,
            },
            None,
            "smartdrop-content-test",
        );
        assert_eq!(panel.reposition(), None);
    }

    #[test]
    fn test_teardown_removes_everything() {
        let (host, panel) = setup(Rect::new(100.0, 100.0, 120.0, 40.0));
        panel.attach_tracking();
        panel.teardown();
        panel.teardown();

        assert_eq!(host.listener_count(), 0);
        assert!(!host.is_attached(panel.node()));
        assert_eq!(panel.reposition(), None);
    }
}
