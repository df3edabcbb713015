//! Platform seam consumed by the overlay engine.
//!
//! The engine never touches a toolkit directly. Geometry queries, the portal
//! node tree, event streams, timers, focus and the document scroll lock all go
//! through [`Host`]. A web binding implements it over the DOM; the bundled
//! [`HeadlessHost`] implements it in memory for tests and script replay.

mod headless;

pub use headless::HeadlessHost;

use std::rc::Rc;
use std::time::Duration;

use crate::layout_math::{Rect, Viewport};

/// Opaque handle to a node in the host's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Handle returned by [`Host::request_frame`] and [`Host::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Handle returned by [`Host::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTarget {
    Window,
    Document,
    Node(NodeId),
}

/// Dispatch phase for window/document listeners.
///
/// Capture listeners run before the event reaches its target, bubble
/// listeners after. Node listeners always run in the target phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    ArrowDown,
    ArrowUp,
    Home,
    End,
    Enter,
    Other(String),
}

impl Key {
    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            "ArrowDown" | "Down" => Key::ArrowDown,
            "ArrowUp" | "Up" => Key::ArrowUp,
            "Home" => Key::Home,
            "End" => Key::End,
            "Enter" => Key::Enter,
            other => Key::Other(other.to_string()),
        }
    }
}

/// Input and layout events delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PointerDown { target: NodeId },
    Click { target: NodeId },
    KeyDown { key: Key },
    Input { target: NodeId, value: String },
    TouchStart { target: NodeId, y: f64 },
    TouchMove { target: NodeId, y: f64 },
    TouchEnd { target: NodeId },
    Scroll { target: Option<NodeId> },
    Resize,
}

/// Discriminant of [`Event`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    Click,
    KeyDown,
    Input,
    TouchStart,
    TouchMove,
    TouchEnd,
    Scroll,
    Resize,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PointerDown { .. } => EventKind::PointerDown,
            Event::Click { .. } => EventKind::Click,
            Event::KeyDown { .. } => EventKind::KeyDown,
            Event::Input { .. } => EventKind::Input,
            Event::TouchStart { .. } => EventKind::TouchStart,
            Event::TouchMove { .. } => EventKind::TouchMove,
            Event::TouchEnd { .. } => EventKind::TouchEnd,
            Event::Scroll { .. } => EventKind::Scroll,
            Event::Resize => EventKind::Resize,
        }
    }

    /// The node the event was dispatched at, if any.
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Event::PointerDown { target }
            | Event::Click { target }
            | Event::Input { target, .. }
            | Event::TouchStart { target, .. }
            | Event::TouchMove { target, .. }
            | Event::TouchEnd { target } => Some(*target),
            Event::Scroll { target } => *target,
            Event::KeyDown { .. } | Event::Resize => None,
        }
    }
}

/// Vertical translation applied to a panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Translate {
    /// Fully below the viewport edge (translateY(100%)).
    Offscreen,
    /// Pixel offset from the resting position.
    Px(f64),
}

pub type EventHandler = Rc<dyn Fn(&Event)>;
pub type Callback = Box<dyn FnOnce()>;

/// Platform primitives the engine consumes.
///
/// All methods are called on the UI thread. Handlers and callbacks must not be
/// invoked re-entrantly from inside the registering call.
pub trait Host {
    /// Current viewport dimensions.
    fn viewport(&self) -> Viewport;

    /// Bounding box of a node in viewport coordinates.
    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Create a node. `None` mounts it in the overlay portal.
    fn create_node(&self, parent: Option<NodeId>) -> NodeId;

    /// Remove a node and its descendants.
    fn remove_node(&self, node: NodeId);

    /// Whether `node` is `ancestor` or lies inside it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    /// Write a node's vertical transform directly, outside any render cycle.
    /// `animated = false` disables the transition for this write.
    fn set_translate_y(&self, node: NodeId, translate: Translate, animated: bool);

    fn focus(&self, node: NodeId);

    /// Read a style property of the document root.
    fn root_style(&self, property: &str) -> Option<String>;

    /// Write (or with `None`, clear) a style property of the document root.
    fn set_root_style(&self, property: &str, value: Option<&str>);

    fn add_listener(
        &self,
        target: ListenerTarget,
        kind: EventKind,
        phase: Phase,
        handler: EventHandler,
    ) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Run `callback` on the next animation frame.
    fn request_frame(&self, callback: Callback) -> TimerId;

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerId;

    /// Cancel a frame or timeout. Unknown or already-fired ids are ignored.
    fn clear_timer(&self, id: TimerId);
}
