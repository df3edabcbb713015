//! In-memory [`Host`] with a manual clock.
//!
//! Nothing happens until the caller drives it: [`HeadlessHost::dispatch`]
//! delivers an event, [`HeadlessHost::run_frame`] runs one animation frame and
//! [`HeadlessHost::advance`] moves the clock, firing due timeouts in order.
//! Inspection helpers expose the node tree, listener table and timer queue so
//! tests can assert that nothing leaks.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use super::{
    Callback, Event, EventHandler, EventKind, Host, ListenerId, ListenerTarget, NodeId, Phase,
    TimerId, Translate,
};
use crate::layout_math::{Rect, Size, Viewport};

/// Size given to nodes that have no explicit rect.
const DEFAULT_NODE_SIZE: Size = Size {
    width: 220.0,
    height: 280.0,
};

/// Upper bound on frame batches run by [`HeadlessHost::flush_frames`].
const MAX_FRAME_BATCHES: usize = 32;

#[derive(Default)]
struct NodeData {
    parent: Option<NodeId>,
    rect: Option<Rect>,
    attributes: BTreeMap<String, String>,
    translate: Option<(Translate, bool)>,
}

struct Registration {
    id: ListenerId,
    target: ListenerTarget,
    kind: EventKind,
    phase: Phase,
    handler: EventHandler,
}

struct PendingTimeout {
    id: TimerId,
    due: Duration,
    callback: Callback,
}

pub struct HeadlessHost {
    viewport: Cell<Viewport>,
    default_size: Cell<Size>,
    nodes: RefCell<HashMap<NodeId, NodeData>>,
    next_node: Cell<u64>,
    listeners: RefCell<Vec<Registration>>,
    next_listener: Cell<u64>,
    frames: RefCell<Vec<(TimerId, Callback)>>,
    timeouts: RefCell<Vec<PendingTimeout>>,
    next_timer: Cell<u64>,
    now: Cell<Duration>,
    focused: Cell<Option<NodeId>>,
    root_styles: RefCell<HashMap<String, String>>,
}

impl HeadlessHost {
    pub fn new(viewport: Viewport) -> Rc<Self> {
        Rc::new(Self {
            viewport: Cell::new(viewport),
            default_size: Cell::new(DEFAULT_NODE_SIZE),
            nodes: RefCell::new(HashMap::new()),
            next_node: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            timeouts: RefCell::new(Vec::new()),
            next_timer: Cell::new(1),
            now: Cell::new(Duration::ZERO),
            focused: Cell::new(None),
            root_styles: RefCell::new(HashMap::new()),
        })
    }

    /// Change the viewport and deliver a resize event.
    pub fn resize(&self, width: f64, height: f64) {
        self.viewport.set(Viewport::new(width, height));
        self.dispatch(Event::Resize);
    }

    /// Size reported for nodes without an explicit rect.
    pub fn set_default_size(&self, size: Size) {
        self.default_size.set(size);
    }

    /// Create a detached node standing in for a caller-owned element.
    pub fn add_element(&self, rect: Rect) -> NodeId {
        let id = self.create_node(None);
        self.set_rect(id, rect);
        id
    }

    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node) {
            data.rect = Some(rect);
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&node)
            .and_then(|data| data.attributes.get(name).cloned())
    }

    /// Last transform written to `node`, with its `animated` flag.
    pub fn translate(&self, node: NodeId) -> Option<(Translate, bool)> {
        self.nodes.borrow().get(&node).and_then(|data| data.translate)
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.borrow().contains_key(&node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .nodes
            .borrow()
            .iter()
            .filter(|(_, data)| data.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Frames plus timeouts not yet run.
    pub fn pending_timers(&self) -> usize {
        self.frames.borrow().len() + self.timeouts.borrow().len()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Run the frame callbacks queued before this call. Frames requested while
    /// running land in the next batch. Returns how many callbacks ran.
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut *self.frames.borrow_mut());
        let count = batch.len();
        for (id, callback) in batch {
            trace!("frame {:?}", id);
            callback();
        }
        count
    }

    /// Run frame batches until none are queued.
    pub fn flush_frames(&self) {
        for _ in 0..MAX_FRAME_BATCHES {
            if self.run_frame() == 0 {
                return;
            }
        }
    }

    /// Move the clock forward, firing every timeout that falls due, in due
    /// order. Timeouts scheduled by a callback fire in the same call if they
    /// fall due before the new time.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let next = {
                let mut timeouts = self.timeouts.borrow_mut();
                let earliest = timeouts
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(index, _)| index);
                earliest.map(|index| timeouts.remove(index))
            };
            let Some(timeout) = next else {
                break;
            };
            self.now.set(timeout.due);
            trace!("timeout {:?} at {:?}", timeout.id, timeout.due);
            (timeout.callback)();
        }
        self.now.set(target);
    }

    /// Convenience for `advance(Duration::from_millis(ms))`.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Deliver an event: capture listeners on window and document, then node
    /// listeners from the target up through its ancestors, then bubble
    /// listeners on document and window.
    pub fn dispatch(&self, event: Event) {
        let kind = event.kind();
        let mut order: Vec<ListenerId> = Vec::new();

        {
            let listeners = self.listeners.borrow();
            let global = |target: ListenerTarget, phase: Phase| {
                listeners
                    .iter()
                    .filter(move |r| r.target == target && r.kind == kind && r.phase == phase)
                    .map(|r| r.id)
            };

            order.extend(global(ListenerTarget::Window, Phase::Capture));
            order.extend(global(ListenerTarget::Document, Phase::Capture));

            for node in self.ancestry(event.target()) {
                order.extend(
                    listeners
                        .iter()
                        .filter(|r| r.target == ListenerTarget::Node(node) && r.kind == kind)
                        .map(|r| r.id),
                );
            }

            order.extend(global(ListenerTarget::Document, Phase::Bubble));
            order.extend(global(ListenerTarget::Window, Phase::Bubble));
        }

        for id in order {
            // A handler may have removed a later listener; skip it if so.
            let handler = self
                .listeners
                .borrow()
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.handler.clone());
            if let Some(handler) = handler {
                handler(&event);
            }
        }
    }

    /// Pointer-down followed by click, like a mouse press on `node`.
    pub fn click(&self, node: NodeId) {
        self.dispatch(Event::PointerDown { target: node });
        self.dispatch(Event::Click { target: node });
    }

    /// Target node followed by its ancestors.
    fn ancestry(&self, target: Option<NodeId>) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut chain = Vec::new();
        let mut current = target;
        while let Some(node) = current {
            chain.push(node);
            current = nodes.get(&node).and_then(|data| data.parent);
        }
        chain
    }

    fn next_timer_id(&self) -> TimerId {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        TimerId(id)
    }
}

impl Host for HeadlessHost {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        let default = self.default_size.get();
        self.nodes
            .borrow()
            .get(&node)
            .and_then(|data| data.rect)
            .unwrap_or(Rect::new(0.0, 0.0, default.width, default.height))
    }

    fn create_node(&self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_node.get());
        self.next_node.set(id.0 + 1);
        self.nodes.borrow_mut().insert(
            id,
            NodeData {
                parent,
                ..Default::default()
            },
        );
        id
    }

    fn remove_node(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let mut doomed = vec![node];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index];
            doomed.extend(
                nodes
                    .iter()
                    .filter(|(_, data)| data.parent == Some(current))
                    .map(|(id, _)| *id),
            );
            index += 1;
        }
        for id in doomed {
            nodes.remove(&id);
            if self.focused.get() == Some(id) {
                self.focused.set(None);
            }
        }
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestry(Some(node)).contains(&ancestor)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node) {
            data.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn set_translate_y(&self, node: NodeId, translate: Translate, animated: bool) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(&node) {
            data.translate = Some((translate, animated));
        }
    }

    fn focus(&self, node: NodeId) {
        if self.is_attached(node) {
            self.focused.set(Some(node));
        }
    }

    fn root_style(&self, property: &str) -> Option<String> {
        self.root_styles.borrow().get(property).cloned()
    }

    fn set_root_style(&self, property: &str, value: Option<&str>) {
        let mut styles = self.root_styles.borrow_mut();
        match value {
            Some(value) => {
                styles.insert(property.to_string(), value.to_string());
            }
            None => {
                styles.remove(property);
            }
        }
    }

    fn add_listener(
        &self,
        target: ListenerTarget,
        kind: EventKind,
        phase: Phase,
        handler: EventHandler,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push(Registration {
            id,
            target,
            kind,
            phase,
            handler,
        });
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|r| r.id != id);
    }

    fn request_frame(&self, callback: Callback) -> TimerId {
        let id = self.next_timer_id();
        self.frames.borrow_mut().push((id, callback));
        id
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerId {
        let id = self.next_timer_id();
        self.timeouts.borrow_mut().push(PendingTimeout {
            id,
            due: self.now.get() + delay,
            callback,
        });
        id
    }

    fn clear_timer(&self, id: TimerId) {
        self.frames.borrow_mut().retain(|(frame_id, _)| *frame_id != id);
        self.timeouts.borrow_mut().retain(|t| t.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Rc<HeadlessHost> {
        HeadlessHost::new(Viewport::new(1280.0, 800.0))
    }

    #[test]
    fn test_contains_walks_ancestors() {
        let host = host();
        let root = host.create_node(None);
        let child = host.create_node(Some(root));
        let grandchild = host.create_node(Some(child));
        let other = host.create_node(None);

        assert!(host.contains(root, grandchild));
        assert!(host.contains(root, root));
        assert!(!host.contains(child, root));
        assert!(!host.contains(root, other));
    }

    #[test]
    fn test_remove_node_removes_descendants() {
        let host = host();
        let root = host.create_node(None);
        let child = host.create_node(Some(root));
        host.focus(child);

        host.remove_node(root);

        assert!(!host.is_attached(root));
        assert!(!host.is_attached(child));
        assert_eq!(host.focused(), None);
    }

    #[test]
    fn test_dispatch_order_capture_target_bubble() {
        let host = host();
        let node = host.create_node(None);
        let log = Rc::new(RefCell::new(Vec::new()));

        for (target, phase, tag) in [
            (ListenerTarget::Document, Phase::Bubble, "doc-bubble"),
            (ListenerTarget::Node(node), Phase::Bubble, "node"),
            (ListenerTarget::Document, Phase::Capture, "doc-capture"),
        ] {
            let log = log.clone();
            host.add_listener(
                target,
                EventKind::PointerDown,
                phase,
                Rc::new(move |_| log.borrow_mut().push(tag)),
            );
        }

        host.dispatch(Event::PointerDown { target: node });

        assert_eq!(*log.borrow(), vec!["doc-capture", "node", "doc-bubble"]);
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let host = host();
        let hits = Rc::new(Cell::new(0));
        let second: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        {
            let host_ref = host.clone();
            let second = second.clone();
            host.add_listener(
                ListenerTarget::Document,
                EventKind::Resize,
                Phase::Capture,
                Rc::new(move |_| {
                    if let Some(id) = second.get() {
                        host_ref.remove_listener(id);
                    }
                }),
            );
        }
        let hits_ref = hits.clone();
        let id = host.add_listener(
            ListenerTarget::Document,
            EventKind::Resize,
            Phase::Bubble,
            Rc::new(move |_| hits_ref.set(hits_ref.get() + 1)),
        );
        second.set(Some(id));

        host.dispatch(Event::Resize);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_frames_run_one_batch_at_a_time() {
        let host = host();
        let ran = Rc::new(Cell::new(0));
        {
            let host_ref = host.clone();
            let ran = ran.clone();
            host.request_frame(Box::new(move || {
                ran.set(ran.get() + 1);
                let ran = ran.clone();
                host_ref.request_frame(Box::new(move || ran.set(ran.get() + 1)));
            }));
        }

        assert_eq!(host.run_frame(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(host.run_frame(), 1);
        assert_eq!(ran.get(), 2);
        assert_eq!(host.run_frame(), 0);
    }

    #[test]
    fn test_advance_fires_in_due_order() {
        let host = host();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (ms, tag) in [(30, "c"), (10, "a"), (20, "b"), (50, "late")] {
            let log = log.clone();
            host.set_timeout(
                Duration::from_millis(ms),
                Box::new(move || log.borrow_mut().push(tag)),
            );
        }

        host.advance_ms(40);

        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(host.now(), Duration::from_millis(40));
        assert_eq!(host.pending_timers(), 1);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let host = host();
        let fired = Rc::new(Cell::new(false));
        let fired_ref = fired.clone();
        let id = host.set_timeout(
            Duration::from_millis(10),
            Box::new(move || fired_ref.set(true)),
        );

        host.clear_timer(id);
        host.advance_ms(100);

        assert!(!fired.get());
        // Clearing again is a no-op
        host.clear_timer(id);
    }

    #[test]
    fn test_root_style_roundtrip() {
        let host = host();
        assert_eq!(host.root_style("overflow"), None);
        host.set_root_style("overflow", Some("hidden"));
        assert_eq!(host.root_style("overflow").as_deref(), Some("hidden"));
        host.set_root_style("overflow", None);
        assert_eq!(host.root_style("overflow"), None);
    }

    #[test]
    fn test_default_rect_for_unsized_nodes() {
        let host = host();
        let node = host.create_node(None);
        assert_eq!(host.bounding_rect(node).size(), DEFAULT_NODE_SIZE);

        host.set_rect(node, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(host.bounding_rect(node), Rect::new(1.0, 2.0, 3.0, 4.0));
    }
}
