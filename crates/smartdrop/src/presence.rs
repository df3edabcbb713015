//! Presence state machine: decouples "mounted" from "visible".
//!
//! ```text
//! Closed ──open──▶ Opening ──2 frames──▶ Open ──close──▶ Closing ──exit──▶ Closed
//!                     ▲                                     │
//!                     └────────────────open─────────────────┘
//! ```
//!
//! Mounting is synchronous with the open request; the overlay becomes visible
//! only after two animation frames so the initial unanimated style is applied
//! first. Unmounting waits for the exit duration, and a newer open cancels a
//! pending unmount. Every scheduled callback also checks a generation counter,
//! so a stale timer that slipped past cancellation is ignored.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::host::{Host, TimerId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresencePhase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// Mounted/visible pair. `visible` implies `mounted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub mounted: bool,
    pub visible: bool,
}

impl PresencePhase {
    pub fn record(self) -> PresenceRecord {
        match self {
            PresencePhase::Closed => PresenceRecord {
                mounted: false,
                visible: false,
            },
            PresencePhase::Opening | PresencePhase::Closing => PresenceRecord {
                mounted: true,
                visible: false,
            },
            PresencePhase::Open => PresenceRecord {
                mounted: true,
                visible: true,
            },
        }
    }
}

/// Side effects the owner performs on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Content enters the tree (Closed → Opening).
    Mount,
    /// Enter transition starts (Opening → Open).
    Show,
    /// Exit transition starts (Opening/Open → Closing).
    Hide,
    /// Content leaves the tree (Closing → Closed).
    Unmount,
}

pub type PresenceObserver = Box<dyn Fn(PresenceEvent)>;

pub struct Presence {
    host: Rc<dyn Host>,
    phase: Cell<PresencePhase>,
    frame_timer: Cell<Option<TimerId>>,
    unmount_timer: Cell<Option<TimerId>>,
    generation: Cell<u64>,
    observer: PresenceObserver,
}

impl Presence {
    pub fn new(host: Rc<dyn Host>, observer: PresenceObserver) -> Rc<Self> {
        Rc::new(Self {
            host,
            phase: Cell::new(PresencePhase::Closed),
            frame_timer: Cell::new(None),
            unmount_timer: Cell::new(None),
            generation: Cell::new(0),
            observer,
        })
    }

    pub fn phase(&self) -> PresencePhase {
        self.phase.get()
    }

    pub fn record(&self) -> PresenceRecord {
        self.phase.get().record()
    }

    pub fn is_mounted(&self) -> bool {
        self.record().mounted
    }

    /// Begin (or resume) opening. No-op while already opening or open.
    pub fn request_open(self: &Rc<Self>) {
        match self.phase.get() {
            PresencePhase::Opening | PresencePhase::Open => return,
            PresencePhase::Closing => {
                self.clear_unmount_timer();
                self.bump_generation();
                self.enter(PresencePhase::Opening);
                debug!("Presence: closing → opening, pending unmount cancelled");
            }
            PresencePhase::Closed => {
                self.bump_generation();
                self.enter(PresencePhase::Opening);
                (self.observer)(PresenceEvent::Mount);
            }
        }
        self.schedule_show();
    }

    /// Begin closing; content unmounts after `exit`. No-op while closing or
    /// closed.
    pub fn request_close(self: &Rc<Self>, exit: Duration) {
        match self.phase.get() {
            PresencePhase::Closed | PresencePhase::Closing => return,
            PresencePhase::Opening | PresencePhase::Open => {}
        }

        self.clear_frame_timer();
        let generation = self.bump_generation();
        self.enter(PresencePhase::Closing);
        (self.observer)(PresenceEvent::Hide);

        // The Hide handler may have re-entered with an open request
        if self.phase.get() != PresencePhase::Closing {
            return;
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.host.set_timeout(
            exit,
            Box::new(move || {
                if let Some(presence) = weak.upgrade() {
                    presence.unmount_timer.set(None);
                    presence.finish_close(generation);
                }
            }),
        );
        self.unmount_timer.set(Some(id));
    }

    /// Drop every pending timer and return to Closed without notifying the
    /// observer. Used when the owner tears itself down.
    pub fn cancel(&self) {
        self.clear_frame_timer();
        self.clear_unmount_timer();
        self.bump_generation();
        self.phase.set(PresencePhase::Closed);
    }

    /// Whether a frame or unmount timer is outstanding.
    pub fn has_pending_timer(&self) -> bool {
        self.frame_timer.get().is_some() || self.unmount_timer.get().is_some()
    }

    fn schedule_show(self: &Rc<Self>) {
        self.clear_frame_timer();
        let generation = self.generation.get();
        let weak = Rc::downgrade(self);
        let id = self.host.request_frame(Box::new(move || {
            let Some(presence) = weak.upgrade() else {
                return;
            };
            if presence.generation.get() != generation {
                return;
            }
            // Second frame: the first only lets the initial style land
            let weak = Rc::downgrade(&presence);
            let id = presence.host.request_frame(Box::new(move || {
                if let Some(presence) = weak.upgrade() {
                    presence.frame_timer.set(None);
                    presence.finish_open(generation);
                }
            }));
            presence.frame_timer.set(Some(id));
        }));
        self.frame_timer.set(Some(id));
    }

    fn finish_open(&self, generation: u64) {
        if self.generation.get() != generation || self.phase.get() != PresencePhase::Opening {
            return;
        }
        self.enter(PresencePhase::Open);
        (self.observer)(PresenceEvent::Show);
    }

    fn finish_close(&self, generation: u64) {
        if self.generation.get() != generation || self.phase.get() != PresencePhase::Closing {
            debug!("Presence: ignoring stale unmount");
            return;
        }
        self.enter(PresencePhase::Closed);
        (self.observer)(PresenceEvent::Unmount);
    }

    fn enter(&self, phase: PresencePhase) {
        debug!("Presence: {:?} → {:?}", self.phase.get(), phase);
        self.phase.set(phase);
    }

    fn bump_generation(&self) -> u64 {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        next
    }

    fn clear_frame_timer(&self) {
        if let Some(id) = self.frame_timer.take() {
            self.host.clear_timer(id);
        }
    }

    fn clear_unmount_timer(&self) {
        if let Some(id) = self.unmount_timer.take() {
            self.host.clear_timer(id);
        }
    }
}

impl Drop for Presence {
    fn drop(&mut self) {
        self.clear_frame_timer();
        self.clear_unmount_timer();
    }
}
