//! Periodic actions: repeating callbacks driven by the clock.
//!
//! Each fire reschedules the next one `period` later until the tick budget is
//! spent, the action is cancelled, or its owning aura activation ends. A stale
//! tick (cancelled action, reused slot, expired owner) is a silent no-op.
//!
//! Slots are recycled; a [`PeriodicId`] carries the slot generation so an old
//! handle can never touch the action that later reuses its slot.

use std::fmt;
use std::time::Duration;

use tracing::trace;

use crate::aura::AuraId;
use crate::clock::{EventKind, EventPriority};
use crate::error::{KernelError, SimResult};
use crate::sim::Simulation;
use crate::time::SimTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodicId {
    index: u32,
    generation: u32,
}

impl fmt::Display for PeriodicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "periodic#{}.{}", self.index, self.generation)
    }
}

pub type TickCallback = Box<dyn FnMut(&mut Simulation, PeriodicId) -> SimResult<()>>;

pub struct PeriodicConfig {
    pub period: Duration,
    /// `None` repeats until cancelled.
    pub num_ticks: Option<u32>,
    /// Defaults to one period from now.
    pub first_fire: Option<SimTime>,
    /// Stop as soon as this aura's current activation ends.
    pub owner: Option<AuraId>,
    pub priority: EventPriority,
    pub on_tick: TickCallback,
}

impl PeriodicConfig {
    pub fn new(
        period: Duration,
        on_tick: impl FnMut(&mut Simulation, PeriodicId) -> SimResult<()> + 'static,
    ) -> Self {
        Self {
            period,
            num_ticks: None,
            first_fire: None,
            owner: None,
            priority: EventPriority::Default,
            on_tick: Box::new(on_tick),
        }
    }

    pub fn with_ticks(mut self, num_ticks: u32) -> Self {
        self.num_ticks = Some(num_ticks);
        self
    }

    pub fn starting_at(mut self, first_fire: SimTime) -> Self {
        self.first_fire = Some(first_fire);
        self
    }

    pub fn owned_by(mut self, aura: AuraId) -> Self {
        self.owner = Some(aura);
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for PeriodicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicConfig")
            .field("period", &self.period)
            .field("num_ticks", &self.num_ticks)
            .field("first_fire", &self.first_fire)
            .field("owner", &self.owner)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a running action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicStatus {
    pub period: Duration,
    pub next_fire: SimTime,
    pub remaining_ticks: Option<u32>,
    pub ticks_fired: u32,
}

struct Slot {
    generation: u32,
    live: bool,
    period: Duration,
    remaining: Option<u32>,
    next_fire: SimTime,
    ticks_fired: u32,
    owner: Option<(AuraId, u64)>,
    priority: EventPriority,
    on_tick: Option<TickCallback>,
}

impl Slot {
    fn matches(&self, id: PeriodicId) -> bool {
        self.live && self.generation == id.generation
    }
}

/// Slot storage with a free list.
#[derive(Default)]
pub(crate) struct PeriodicArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl PeriodicArena {
    fn get(&self, id: PeriodicId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.matches(id))
    }

    fn get_mut(&mut self, id: PeriodicId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.matches(id))
    }

    fn release(&mut self, id: PeriodicId) {
        if let Some(slot) = self.get_mut(id) {
            slot.live = false;
            slot.on_tick = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    /// Stop every action. Outstanding handles go stale.
    pub(crate) fn reset(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.live {
                slot.live = false;
                slot.on_tick = None;
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        // Hand out low slots first for stable ids across trials.
        self.free.reverse();
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }
}

impl Simulation {
    pub fn start_periodic(&mut self, config: PeriodicConfig) -> SimResult<PeriodicId> {
        if config.period.is_zero() {
            return Err(KernelError::ZeroPeriod);
        }
        let now = self.now();
        let first_fire = config.first_fire.unwrap_or(now + config.period);
        if first_fire < now {
            return Err(KernelError::ScheduledInPast {
                at: first_fire,
                now,
            });
        }
        let owner = match config.owner {
            Some(aura) => Some((aura, self.aura(aura)?.activation_serial)),
            None => None,
        };

        let slot = Slot {
            generation: 0,
            live: true,
            period: config.period,
            remaining: config.num_ticks,
            next_fire: first_fire,
            ticks_fired: 0,
            owner,
            priority: config.priority,
            on_tick: Some(config.on_tick),
        };
        let id = match self.periodics.free.pop() {
            Some(index) => {
                let existing = &mut self.periodics.slots[index as usize];
                let generation = existing.generation;
                *existing = Slot { generation, ..slot };
                PeriodicId { index, generation }
            }
            None => {
                let index = self.periodics.slots.len() as u32;
                self.periodics.slots.push(slot);
                PeriodicId {
                    index,
                    generation: 0,
                }
            }
        };

        if config.num_ticks == Some(0) {
            self.periodics.release(id);
            return Ok(id);
        }

        trace!(periodic = %id, first_fire = %first_fire, period = ?config.period, "periodic started");
        self.clock
            .schedule(first_fire, config.priority, EventKind::PeriodicTick { action: id })?;
        Ok(id)
    }

    /// Stop an action. Unknown or finished handles are ignored.
    pub fn cancel_periodic(&mut self, id: PeriodicId) {
        if self.periodics.get(id).is_some() {
            trace!(periodic = %id, at = %self.now(), "periodic cancelled");
        }
        self.periodics.release(id);
    }

    pub fn is_periodic_active(&self, id: PeriodicId) -> bool {
        self.periodics.get(id).is_some()
    }

    pub fn periodic_status(&self, id: PeriodicId) -> Option<PeriodicStatus> {
        self.periodics.get(id).map(|slot| PeriodicStatus {
            period: slot.period,
            next_fire: slot.next_fire,
            remaining_ticks: slot.remaining,
            ticks_fired: slot.ticks_fired,
        })
    }

    pub(crate) fn fire_periodic(&mut self, id: PeriodicId) -> SimResult<()> {
        let Some(slot) = self.periodics.get(id) else {
            return Ok(());
        };
        if slot.next_fire != self.now() {
            return Ok(());
        }
        if let Some((aura, serial)) = slot.owner {
            let owner_alive = self
                .aura(aura)
                .is_ok_and(|a| a.active && a.activation_serial == serial);
            if !owner_alive {
                self.periodics.release(id);
                return Ok(());
            }
        }

        let Some(slot) = self.periodics.get_mut(id) else {
            return Ok(());
        };
        let Some(mut on_tick) = slot.on_tick.take() else {
            return Ok(());
        };
        slot.ticks_fired += 1;
        if let Some(remaining) = slot.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        trace!(periodic = %id, at = %self.now(), "periodic tick");

        let result = on_tick(self, id);

        // The callback may have cancelled this action.
        let now = self.now();
        let Some(slot) = self.periodics.get_mut(id) else {
            return result;
        };
        if slot.remaining == Some(0) {
            self.periodics.release(id);
            return result;
        }
        slot.on_tick = Some(on_tick);
        slot.next_fire = now + slot.period;
        let (at, priority) = (slot.next_fire, slot.priority);
        result?;
        self.clock
            .schedule(at, priority, EventKind::PeriodicTick { action: id })
    }
}
