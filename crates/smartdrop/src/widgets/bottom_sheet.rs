//! Mobile surface: a bottom-pinned sheet with drag-to-dismiss.
//!
//! The sheet slides between fully offscreen and rest. A touch on the handle
//! starts a drag; each move writes the downward delta straight to the host's
//! transform with transitions off. Release past the threshold slides the
//! sheet away and asks the owner to close once the exit duration has passed;
//! anything shorter snaps back. While mounted the sheet holds the document
//! scroll lock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use smartdrop_core::SheetConfig;
use tracing::debug;

use crate::host::{
    Event, EventKind, Host, ListenerId, ListenerTarget, NodeId, Phase, TimerId, Translate,
};
use crate::layout_math::{DragOutcome, SheetMetrics, drag_delta, resolve_drag, sheet_metrics};
use crate::scroll_lock::{ScrollLockId, ScrollLockTracker};

/// In-flight touch drag. `translate_y` is never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DragState {
    pub start_y: f64,
    pub current_y: f64,
    pub translate_y: f64,
    pub is_dragging: bool,
}

pub type DismissCallback = Rc<dyn Fn()>;

/// Snapshot of the mobile surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetView {
    pub visible: bool,
    pub offscreen: bool,
    pub translate_y: f64,
    pub drag: Option<DragState>,
    pub dismissing: bool,
    pub metrics: SheetMetrics,
}

pub struct BottomSheet {
    host: Rc<dyn Host>,
    settings: SheetConfig,
    backdrop: NodeId,
    sheet: NodeId,
    handle: NodeId,
    body: NodeId,
    metrics: Cell<SheetMetrics>,
    translate: Cell<Translate>,
    drag: Cell<Option<DragState>>,
    shown: Cell<bool>,
    dismiss_timer: Cell<Option<TimerId>>,
    on_dismiss: DismissCallback,
    listeners: RefCell<Vec<ListenerId>>,
    lock: Cell<Option<ScrollLockId>>,
    torn_down: Cell<bool>,
}

impl BottomSheet {
    /// Create backdrop, sheet, handle and body nodes, lock document scroll
    /// and start listening for handle drags.
    pub fn mount(
        host: Rc<dyn Host>,
        settings: &SheetConfig,
        content_id: &str,
        backdrop_color: &str,
        on_dismiss: DismissCallback,
    ) -> Rc<Self> {
        let backdrop = host.create_node(None);
        host.set_attribute(backdrop, "data-role", "backdrop");
        host.set_attribute(backdrop, "data-state", "closed");
        host.set_attribute(backdrop, "style", &format!("background: {};", backdrop_color));

        let sheet = host.create_node(None);
        host.set_attribute(sheet, "id", content_id);
        host.set_attribute(sheet, "role", "dialog");
        host.set_attribute(sheet, "aria-modal", "true");
        host.set_attribute(sheet, "data-state", "closed");

        let handle = host.create_node(Some(sheet));
        host.set_attribute(handle, "data-role", "handle");

        let body = host.create_node(Some(sheet));
        host.set_attribute(body, "data-role", "body");

        // Start offscreen without a transition so the entrance can animate
        host.set_translate_y(sheet, Translate::Offscreen, false);

        let lock = ScrollLockTracker::global().acquire(host.clone());

        let this = Rc::new(Self {
            host,
            settings: settings.clone(),
            backdrop,
            sheet,
            handle,
            body,
            metrics: Cell::new(SheetMetrics {
                max_height: 0.0,
                content_max_height: 0.0,
            }),
            translate: Cell::new(Translate::Offscreen),
            drag: Cell::new(None),
            shown: Cell::new(false),
            dismiss_timer: Cell::new(None),
            on_dismiss,
            listeners: RefCell::new(Vec::new()),
            lock: Cell::new(Some(lock)),
            torn_down: Cell::new(false),
        });
        this.relayout();
        this.attach_gesture();

        debug!("Bottom sheet {} mounted", content_id);
        this
    }

    /// The sheet panel; pointer-downs inside it are not outside clicks.
    pub fn node(&self) -> NodeId {
        self.sheet
    }

    /// Node content is built into.
    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn handle(&self) -> NodeId {
        self.handle
    }

    pub fn backdrop(&self) -> NodeId {
        self.backdrop
    }

    pub fn metrics(&self) -> SheetMetrics {
        self.metrics.get()
    }

    pub fn drag_state(&self) -> Option<DragState> {
        self.drag.get()
    }

    pub fn is_dismissing(&self) -> bool {
        self.dismiss_timer.get().is_some()
    }

    /// Recompute height caps from the current viewport.
    pub fn relayout(&self) {
        let metrics = sheet_metrics(
            self.host.viewport(),
            self.settings.max_height_fraction,
            self.settings.content_max_fraction,
        );
        self.metrics.set(metrics);
        self.host.set_attribute(
            self.sheet,
            "style",
            &format!(
                "position: fixed; left: 0; right: 0; bottom: 0; max-height: {}px;",
                metrics.max_height
            ),
        );
        self.host.set_attribute(
            self.body,
            "style",
            &format!("overflow-y: auto; max-height: {}px;", metrics.content_max_height),
        );
    }

    pub fn show(&self) {
        self.shown.set(true);
        self.write_translate(Translate::Px(0.0), true);
        self.host.set_attribute(self.sheet, "data-state", "open");
        self.host.set_attribute(self.backdrop, "data-state", "open");
    }

    /// Slide away. Any drag in progress is dropped without being evaluated.
    pub fn hide(&self) {
        self.shown.set(false);
        self.discard_drag();
        self.write_translate(Translate::Offscreen, true);
        self.host.set_attribute(self.sheet, "data-state", "closed");
        self.host.set_attribute(self.backdrop, "data-state", "closed");
    }

    /// Forget the current drag and any pending dismissal.
    pub fn discard_drag(&self) {
        if self.drag.take().is_some() {
            debug!("Bottom sheet drag discarded");
        }
        if let Some(id) = self.dismiss_timer.take() {
            self.host.clear_timer(id);
        }
    }

    pub fn touch_start(&self, y: f64) {
        if !self.shown.get() || self.is_dismissing() {
            return;
        }
        self.drag.set(Some(DragState {
            start_y: y,
            current_y: y,
            translate_y: 0.0,
            is_dragging: true,
        }));
    }

    pub fn touch_move(&self, y: f64) {
        let Some(mut drag) = self.drag.get() else {
            return;
        };
        drag.current_y = y;
        drag.translate_y = drag_delta(drag.start_y, y);
        self.drag.set(Some(drag));
        self.write_translate(Translate::Px(drag.translate_y), false);
    }

    pub fn touch_end(self: &Rc<Self>) {
        let Some(drag) = self.drag.take() else {
            return;
        };

        let outcome = resolve_drag(drag.translate_y, self.settings.dismiss_threshold_px);
        debug!(
            "Bottom sheet drag released at {}px: {:?}",
            drag.translate_y, outcome
        );

        match outcome {
            DragOutcome::Dismiss => {
                self.write_translate(Translate::Offscreen, true);
                let weak = Rc::downgrade(self);
                let id = self.host.set_timeout(
                    self.settings.exit_duration(),
                    Box::new(move || {
                        if let Some(sheet) = weak.upgrade() {
                            sheet.dismiss_timer.set(None);
                            (sheet.on_dismiss)();
                            // Close declined (controlled mode): come back to rest
                            if sheet.shown.get() && !sheet.torn_down.get() {
                                debug!("Bottom sheet dismissal declined, snapping back");
                                sheet.write_translate(Translate::Px(0.0), true);
                            }
                        }
                    }),
                );
                self.dismiss_timer.set(Some(id));
            }
            DragOutcome::SnapBack => {
                self.write_translate(Translate::Px(0.0), true);
            }
        }
    }

    /// Remove listeners, timers, nodes and the scroll lock. Idempotent.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.discard_drag();
        let ids = std::mem::take(&mut *self.listeners.borrow_mut());
        for id in ids {
            self.host.remove_listener(id);
        }
        if let Some(lock) = self.lock.take() {
            ScrollLockTracker::global().release(lock);
        }
        self.host.remove_node(self.sheet);
        self.host.remove_node(self.backdrop);
        debug!("Bottom sheet unmounted");
    }

    pub fn view(&self) -> SheetView {
        let (offscreen, translate_y) = match self.translate.get() {
            Translate::Offscreen => (true, 0.0),
            Translate::Px(y) => (false, y),
        };
        SheetView {
            visible: self.shown.get(),
            offscreen,
            translate_y,
            drag: self.drag.get(),
            dismissing: self.is_dismissing(),
            metrics: self.metrics.get(),
        }
    }

    fn attach_gesture(self: &Rc<Self>) {
        let mut ids = Vec::with_capacity(3);
        for kind in [EventKind::TouchStart, EventKind::TouchMove, EventKind::TouchEnd] {
            let weak = Rc::downgrade(self);
            ids.push(self.host.add_listener(
                ListenerTarget::Node(self.handle),
                kind,
                Phase::Bubble,
                Rc::new(move |event| {
                    let Some(sheet) = weak.upgrade() else {
                        return;
                    };
                    match event {
                        Event::TouchStart { y, .. } => sheet.touch_start(*y),
                        Event::TouchMove { y, .. } => sheet.touch_move(*y),
                        Event::TouchEnd { .. } => sheet.touch_end(),
                        _ => {}
                    }
                }),
            ));
        }
        *self.listeners.borrow_mut() = ids;
    }

    fn write_translate(&self, translate: Translate, animated: bool) {
        self.translate.set(translate);
        self.host.set_translate_y(self.sheet, translate, animated);
    }
}

impl Drop for BottomSheet {
    fn drop(&mut self) {
        self.teardown();
    }
}
