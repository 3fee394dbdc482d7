//! Simulated clock and pending-event queue.
//!
//! The queue is a binary min-heap keyed by fire time. Events at the same
//! timestamp run by [`EventPriority`] (highest first) and then in insertion
//! order, which keeps runs reproducible.
//!
//! Entries are never removed from the heap. Cancellation flips a liveness flag
//! that the event checks when it fires; a fired-but-cancelled event is a no-op.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;

use crate::aura::AuraId;
use crate::error::{KernelError, SimResult};
use crate::periodic::PeriodicId;
use crate::sim::Simulation;
use crate::time::SimTime;

/// Ordering among events that share a timestamp. Higher runs first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    Low = 0,
    #[default]
    Default = 1,
    /// Periodic damage ticks land before an aura expiring at the same instant.
    Dot = 2,
    High = 3,
}

/// Callback scheduled through [`Simulation::schedule_at`].
pub type EventCallback = Box<dyn FnOnce(&mut Simulation) -> SimResult<()>>;

/// Liveness flag shared between a scheduled callback and its owner.
#[derive(Clone, Debug)]
pub struct EventHandle {
    live: Rc<Cell<bool>>,
}

impl EventHandle {
    pub(crate) fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(true)),
        }
    }

    /// The callback becomes a no-op when it fires.
    pub fn cancel(&self) {
        self.live.set(false);
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }
}

pub(crate) enum EventKind {
    AuraExpiry { aura: AuraId, serial: u64 },
    PeriodicTick { action: PeriodicId },
    Callback { handle: EventHandle, callback: EventCallback },
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuraExpiry { aura, serial } => f
                .debug_struct("AuraExpiry")
                .field("aura", aura)
                .field("serial", serial)
                .finish(),
            Self::PeriodicTick { action } => f
                .debug_struct("PeriodicTick")
                .field("action", action)
                .finish(),
            Self::Callback { handle, .. } => f
                .debug_struct("Callback")
                .field("live", &handle.is_live())
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScheduledEvent {
    pub at: SimTime,
    pub priority: EventPriority,
    seq: u64,
    pub kind: EventKind,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Reversed so `BinaryHeap` pops the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then(self.priority.cmp(&other.priority))
            .then(other.seq.cmp(&self.seq))
    }
}

/// Current simulated time plus every pending event.
#[derive(Debug, Default)]
pub struct Clock {
    now: SimTime,
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Fire time of the earliest pending event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|event| event.at)
    }

    pub(crate) fn schedule(
        &mut self,
        at: SimTime,
        priority: EventPriority,
        kind: EventKind,
    ) -> SimResult<()> {
        if at < self.now {
            return Err(KernelError::ScheduledInPast { at, now: self.now });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent {
            at,
            priority,
            seq,
            kind,
        });
        Ok(())
    }

    /// Pop the next event firing at or before `until`, moving time to it.
    pub(crate) fn pop_due(&mut self, until: SimTime) -> Option<ScheduledEvent> {
        if self.queue.peek()?.at > until {
            return None;
        }
        let event = self.queue.pop()?;
        self.now = event.at;
        Some(event)
    }

    /// Move time forward without firing anything. Never moves backwards.
    pub(crate) fn advance_to(&mut self, at: SimTime) {
        if at > self.now {
            self.now = at;
        }
    }

    /// Drop all pending events and rewind to trial start.
    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.now = SimTime::ZERO;
        self.next_seq = 0;
    }
}
