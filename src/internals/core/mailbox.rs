use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::models::position_sample::PositionSample;

pub type PositionMailbox = Mailbox<PositionSample>;

/// Single-slot, latest-wins hand-off between one producer thread and one
/// consumer thread. Every publish overwrites the slot whether or not the
/// previous value was consumed.
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    available: Condvar,
}

struct Slot<T> {
    value: Option<T>,
    fresh: bool,
    closed: bool,
    published: u64,
}

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                fresh: false,
                closed: false,
                published: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Store `value` as the newest and wake a blocked reader. Ignored once
    /// the mailbox is closed.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock();
        if slot.closed {
            trace!("Dropping value published after close.");
            return;
        }
        slot.value = Some(value);
        slot.fresh = true;
        slot.published += 1;
        self.available.notify_all();
    }

    /// Block until a value newer than the last consumed one exists and
    /// return it. Returns `None` once the mailbox is closed and nothing
    /// fresh is left.
    pub fn consume(&self) -> Option<T> {
        self.consume_numbered().map(|(_, value)| value)
    }

    /// Like `consume`, also returning the value's publish sequence number
    /// (1 for the first publish).
    pub fn consume_numbered(&self) -> Option<(u64, T)> {
        let mut slot = self.slot.lock();
        while !slot.fresh && !slot.closed {
            self.available.wait(&mut slot);
        }
        Self::take_fresh(&mut slot)
    }

    /// Number of values published so far.
    pub fn published(&self) -> u64 {
        self.slot.lock().published
    }

    /// Stop accepting values and release every blocked reader. A value
    /// published before the close can still be consumed.
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    fn take_fresh(slot: &mut Slot<T>) -> Option<(u64, T)> {
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        slot.value.clone().map(|value| (slot.published, value))
    }
}

impl<T: Clone> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
