//! Trigger binding: toggle behaviour and accessibility metadata attached to a
//! caller-owned element.
//!
//! The binder never owns the element. It adds one click listener and writes
//! `aria-haspopup`, `aria-expanded` and `aria-controls`; unbinding removes the
//! listener and leaves the element otherwise as it was handed over.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::host::{EventKind, Host, ListenerId, ListenerTarget, NodeId, Phase};
use crate::layout_math::chevron_rotation;

static NEXT_CONTENT_ID: AtomicU64 = AtomicU64::new(1);

/// Fresh DOM id linking a trigger to its content via `aria-controls`.
pub fn next_content_id() -> String {
    format!(
        "smartdrop-content-{}",
        NEXT_CONTENT_ID.fetch_add(1, Ordering::Relaxed)
    )
}

/// Non-owning reference to the bound trigger element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerHandle {
    node: NodeId,
}

impl TriggerHandle {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Live binding held by the controller.
#[derive(Debug)]
pub struct TriggerBinding {
    node: NodeId,
    listener: ListenerId,
}

impl TriggerBinding {
    /// Decorate `node` and route its clicks to `on_toggle`.
    pub fn bind(
        host: &dyn Host,
        node: NodeId,
        content_id: &str,
        expanded: bool,
        on_toggle: Rc<dyn Fn()>,
    ) -> Self {
        host.set_attribute(node, "aria-haspopup", "menu");
        host.set_attribute(node, "aria-controls", content_id);
        let listener = host.add_listener(
            ListenerTarget::Node(node),
            EventKind::Click,
            Phase::Bubble,
            Rc::new(move |_| on_toggle()),
        );
        let binding = Self { node, listener };
        binding.set_expanded(host, expanded);
        binding
    }

    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle { node: self.node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Mirror the open state onto the element.
    pub fn set_expanded(&self, host: &dyn Host, expanded: bool) {
        host.set_attribute(
            self.node,
            "aria-expanded",
            if expanded { "true" } else { "false" },
        );
        host.set_attribute(
            self.node,
            "data-state",
            if expanded { "open" } else { "closed" },
        );
        host.set_attribute(
            self.node,
            "data-chevron-rotation",
            &chevron_rotation(expanded).to_string(),
        );
    }

    pub fn unbind(self, host: &dyn Host) {
        host.remove_listener(self.listener);
    }
}
