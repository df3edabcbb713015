//! Document-level scroll lock shared by every bottom sheet on the thread.
//!
//! Only one sheet may hold the lock. The `overflow` value that was on the
//! document root before the first acquire is restored exactly on release.
//! Holders are identified by a unique ID so a sheet that was displaced cannot
//! release someone else's lock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::host::Host;

thread_local! {
    static SCROLL_LOCK_INSTANCE: RefCell<Option<Rc<ScrollLockTracker>>> = const { RefCell::new(None) };
}

/// Root style property the lock writes.
pub const LOCKED_PROPERTY: &str = "overflow";

/// Value written while locked.
pub const LOCKED_VALUE: &str = "hidden";

/// Unique identifier for a lock holder.
pub type ScrollLockId = u64;

struct Held {
    id: ScrollLockId,
    host: Rc<dyn Host>,
    prior: Option<String>,
}

pub struct ScrollLockTracker {
    held: RefCell<Option<Held>>,
    next_id: Cell<ScrollLockId>,
}

impl Default for ScrollLockTracker {
    fn default() -> Self {
        Self {
            held: RefCell::new(None),
            next_id: Cell::new(1),
        }
    }
}

impl ScrollLockTracker {
    pub fn global() -> Rc<Self> {
        SCROLL_LOCK_INSTANCE.with(|cell| {
            cell.borrow_mut()
                .get_or_insert_with(|| Rc::new(ScrollLockTracker::default()))
                .clone()
        })
    }

    /// Lock document scrolling on `host`.
    ///
    /// If another holder still has the lock it is released first (its saved
    /// value restored), so the value saved here is always the unlocked one.
    #[must_use = "the returned ScrollLockId must be passed to release() on unmount"]
    pub fn acquire(&self, host: Rc<dyn Host>) -> ScrollLockId {
        let previous = self.held.borrow_mut().take();
        if let Some(previous) = previous {
            warn!(
                "Scroll lock {} still held while another sheet mounts; releasing it",
                previous.id
            );
            restore(&previous);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let prior = host.root_style(LOCKED_PROPERTY);
        host.set_root_style(LOCKED_PROPERTY, Some(LOCKED_VALUE));
        debug!("Scroll lock {} acquired (prior overflow: {:?})", id, prior);

        *self.held.borrow_mut() = Some(Held { id, host, prior });
        id
    }

    /// Restore the saved `overflow` value if `id` still holds the lock.
    pub fn release(&self, id: ScrollLockId) {
        let is_same = self
            .held
            .borrow()
            .as_ref()
            .is_some_and(|held| held.id == id);
        if !is_same {
            return;
        }

        let held = self.held.borrow_mut().take();
        if let Some(held) = held {
            restore(&held);
            debug!("Scroll lock {} released", held.id);
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.borrow().is_some()
    }

    /// ID of the current holder.
    pub fn holder(&self) -> Option<ScrollLockId> {
        self.held.borrow().as_ref().map(|held| held.id)
    }
}

fn restore(held: &Held) {
    held.host
        .set_root_style(LOCKED_PROPERTY, held.prior.as_deref());
}
