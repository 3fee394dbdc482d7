//! The simulation: owner of every unit, aura, timer and pending event.
//!
//! A simulation has two phases. During the **build phase** content registers
//! units, auras, dependencies and RNG labels, and may change stats freely;
//! none of it has to be reversible. [`Simulation::finalize`] snapshots that
//! starting state. Every trial then starts from the snapshot
//! ([`Simulation::reset`]) and only reversible, notified changes happen
//! during combat.

mod stats;
mod trial;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

pub use trial::{AuraSummary, TrialSummary, UnitSummary};

use crate::aura::{Aura, ExclusiveCategory, ExclusiveCategoryId, ExclusiveEffect};
use crate::clock::{Clock, EventCallback, EventHandle, EventKind, EventPriority};
use crate::config::SimConfig;
use crate::dot::Dot;
use crate::error::{KernelError, SimResult};
use crate::periodic::PeriodicArena;
use crate::rng::RngRegistry;
use crate::stats::Stats;
use crate::time::SimTime;
use crate::timer::{Cooldown, Timer, TimerId};
use crate::unit::{Unit, UnitId};

pub type ResetEffect = Rc<dyn Fn(&mut Simulation) -> SimResult<()>>;
pub type PostFinalizeEffect = Box<dyn FnOnce(&mut Simulation) -> SimResult<()>>;

pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) finalized: bool,
    pub(crate) clock: Clock,
    pub(crate) rng: RngRegistry,

    pub(crate) units: Vec<Unit>,
    pub(crate) auras: Vec<Aura>,
    pub(crate) categories: Vec<ExclusiveCategory>,
    pub(crate) category_index: BTreeMap<(UnitId, String), ExclusiveCategoryId>,
    pub(crate) effects: Vec<ExclusiveEffect>,
    pub(crate) periodics: PeriodicArena,
    pub(crate) timers: Vec<Timer>,
    pub(crate) dots: Vec<Dot>,

    pub(crate) reset_effects: Vec<ResetEffect>,
    pub(crate) post_finalize: Vec<PostFinalizeEffect>,
    pub(crate) trials_run: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let rng = RngRegistry::new(config.master_seed, config.rng_label_policy);
        Self {
            config,
            finalized: false,
            clock: Clock::new(),
            rng,
            units: Vec::new(),
            auras: Vec::new(),
            categories: Vec::new(),
            category_index: BTreeMap::new(),
            effects: Vec::new(),
            periodics: PeriodicArena::default(),
            timers: Vec::new(),
            dots: Vec::new(),
            reset_effects: Vec::new(),
            post_finalize: Vec::new(),
            trials_run: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn encounter_duration(&self) -> Duration {
        self.config.encounter_duration
    }

    pub fn trials_run(&self) -> u64 {
        self.trials_run
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Add a combatant. Only allowed during the build phase.
    pub fn add_unit(&mut self, label: impl Into<String>, base: Stats) -> SimResult<UnitId> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }
        let id = UnitId(self.units.len() as u32);
        self.units.push(Unit::new(id, label.into(), base));
        Ok(id)
    }

    pub fn unit(&self, id: UnitId) -> SimResult<&Unit> {
        self.units
            .get(id.0 as usize)
            .ok_or(KernelError::UnknownUnit(id))
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> SimResult<&mut Unit> {
        self.units
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownUnit(id))
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    // ------------------------------------------------------------------
    // Random streams
    // ------------------------------------------------------------------

    /// Declare an RNG label. Required under the declared-label policy.
    pub fn declare_rng_label(&mut self, label: impl Into<String>) -> SimResult<()> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }
        self.rng.declare(label);
        Ok(())
    }

    pub fn roll_float(&mut self, label: &str) -> SimResult<f64> {
        self.rng.roll_float(label)
    }

    pub fn roll_uniform(&mut self, label: &str, min: f64, max: f64) -> SimResult<f64> {
        self.rng.roll_uniform(label, min, max)
    }

    pub fn rng(&self) -> &RngRegistry {
        &self.rng
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    pub fn new_timer(&mut self) -> TimerId {
        let id = TimerId(self.timers.len() as u32);
        self.timers.push(Timer::new());
        id
    }

    /// Allocate a fresh timer and pair it with `duration`.
    pub fn new_cooldown(&mut self, duration: Duration) -> Cooldown {
        Cooldown::new(self.new_timer(), duration)
    }

    pub fn timer(&self, id: TimerId) -> SimResult<&Timer> {
        self.timers.get(id.0 as usize).ok_or(KernelError::UnknownHandle {
            kind: "timer",
            index: id.0,
        })
    }

    fn timer_mut(&mut self, id: TimerId) -> SimResult<&mut Timer> {
        self.timers
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownHandle {
                kind: "timer",
                index: id.0,
            })
    }

    pub fn set_timer(&mut self, id: TimerId, ready_at: SimTime) -> SimResult<()> {
        self.timer_mut(id)?.set(ready_at);
        Ok(())
    }

    pub fn cooldown_ready(&self, cooldown: &Cooldown) -> SimResult<bool> {
        Ok(self.timer(cooldown.timer)?.is_ready(self.now()))
    }

    pub fn cooldown_time_to_ready(&self, cooldown: &Cooldown) -> SimResult<Duration> {
        Ok(self.timer(cooldown.timer)?.time_to_ready(self.now()))
    }

    /// Use the cooldown now: ready again after its duration.
    pub fn trigger_cooldown(&mut self, cooldown: &Cooldown) -> SimResult<()> {
        let ready_at = self.now() + cooldown.duration;
        self.set_timer(cooldown.timer, ready_at)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Run `callback` at `at`. Cancel it through the returned handle.
    pub fn schedule_at(
        &mut self,
        at: SimTime,
        priority: EventPriority,
        callback: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> SimResult<EventHandle> {
        let handle = EventHandle::new();
        let callback: EventCallback = Box::new(callback);
        self.clock.schedule(
            at,
            priority,
            EventKind::Callback {
                handle: handle.clone(),
                callback,
            },
        )?;
        Ok(handle)
    }

    pub fn schedule_after(
        &mut self,
        delay: Duration,
        priority: EventPriority,
        callback: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> SimResult<EventHandle> {
        let at = self.now() + delay;
        self.schedule_at(at, priority, callback)
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.clock.next_event_time()
    }

    /// Fire every event up to and including `end`, then move the clock to `end`.
    ///
    /// The first error raised by an event or hook stops the run.
    pub fn run_until(&mut self, end: SimTime) -> SimResult<()> {
        while let Some(event) = self.clock.pop_due(end) {
            self.dispatch(event.kind)?;
        }
        self.clock.advance_to(end);
        Ok(())
    }

    /// Fire the next pending event, if any. Returns whether one was fired.
    pub fn step(&mut self) -> SimResult<bool> {
        let Some(at) = self.clock.next_event_time() else {
            return Ok(false);
        };
        match self.clock.pop_due(at) {
            Some(event) => {
                self.dispatch(event.kind)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch(&mut self, kind: EventKind) -> SimResult<()> {
        match kind {
            EventKind::AuraExpiry { aura, serial } => self.expire_aura(aura, serial),
            EventKind::PeriodicTick { action } => self.fire_periodic(action),
            EventKind::Callback { handle, callback } if handle.is_live() => callback(self),
            EventKind::Callback { .. } => Ok(()),
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now())
            .field("finalized", &self.finalized)
            .field("units", &self.units.len())
            .field("auras", &self.auras.len())
            .field("pending_events", &self.clock.pending())
            .field("live_periodics", &self.periodics.live_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn callbacks_fire_in_order_and_respect_cancellation() {
        let mut sim = Simulation::new(SimConfig::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        for (millis, name) in [(300, "c"), (100, "a"), (200, "b")] {
            let sink = log.clone();
            sim.schedule_at(SimTime::from_millis(millis), EventPriority::Default, move |_| {
                sink.borrow_mut().push(name);
                Ok(())
            })
            .unwrap();
        }
        let sink = log.clone();
        let cancelled = sim
            .schedule_at(SimTime::from_millis(150), EventPriority::Default, move |_| {
                sink.borrow_mut().push("cancelled");
                Ok(())
            })
            .unwrap();
        cancelled.cancel();

        sim.run_until(SimTime::from_millis(1_000)).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(sim.now(), SimTime::from_millis(1_000));
    }

    #[test]
    fn callbacks_can_schedule_more_work() {
        let mut sim = Simulation::new(SimConfig::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        sim.schedule_after(Duration::from_secs(1), EventPriority::Default, move |sim| {
            sink.borrow_mut().push(sim.now());
            let inner = sink.clone();
            sim.schedule_after(Duration::from_secs(1), EventPriority::Default, move |sim| {
                inner.borrow_mut().push(sim.now());
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        while sim.step().unwrap() {}
        assert_eq!(
            *fired.borrow(),
            vec![SimTime::from_millis(1_000), SimTime::from_millis(2_000)]
        );
    }

    #[test]
    fn hook_errors_terminate_the_run() {
        let config = SimConfig::new().with_rng_label_policy(crate::config::RngLabelPolicy::Declared);
        let mut sim = Simulation::new(config);
        sim.declare_rng_label("Crit Roll").unwrap();
        let late = Rc::new(RefCell::new(false));
        let sink = late.clone();
        sim.schedule_at(SimTime::from_millis(10), EventPriority::Default, |sim| {
            sim.roll_float("Crit Roll")?;
            sim.roll_float("Glancing Roll").map(|_| ())
        })
        .unwrap();
        sim.schedule_at(SimTime::from_millis(20), EventPriority::Default, move |_| {
            *sink.borrow_mut() = true;
            Ok(())
        })
        .unwrap();

        let err = sim.run_until(SimTime::from_millis(100)).unwrap_err();
        assert_eq!(err, KernelError::UnknownRngLabel("Glancing Roll".into()));
        assert!(!*late.borrow());

        assert!(
            sim.schedule_at(SimTime::ZERO, EventPriority::Default, |_| Ok(()))
                .is_err()
        );
    }

    #[test]
    fn cooldowns_gate_until_duration_elapses() {
        let mut sim = Simulation::new(SimConfig::new());
        let cooldown = sim.new_cooldown(Duration::from_secs(6));

        assert!(sim.cooldown_ready(&cooldown).unwrap());
        sim.trigger_cooldown(&cooldown).unwrap();
        assert!(!sim.cooldown_ready(&cooldown).unwrap());

        sim.run_until(SimTime::from_millis(4_000)).unwrap();
        assert_eq!(
            sim.cooldown_time_to_ready(&cooldown).unwrap(),
            Duration::from_secs(2)
        );
        sim.run_until(SimTime::from_millis(6_000)).unwrap();
        assert!(sim.cooldown_ready(&cooldown).unwrap());
    }

    #[test]
    fn units_cannot_be_added_after_finalize() {
        let mut sim = Simulation::new(SimConfig::new());
        sim.add_unit("tank", Stats::new()).unwrap();
        sim.finalize().unwrap();
        assert_eq!(
            sim.add_unit("late", Stats::new()),
            Err(KernelError::AlreadyFinalized)
        );
    }
}
