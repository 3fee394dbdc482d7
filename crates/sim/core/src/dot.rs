//! Damage-over-time effects.
//!
//! A [`Dot`] is an aura on the target plus a ticker owned by that aura's
//! activation plus a damage snapshot. Ticks replay the snapshot:
//!
//! ```text
//! tick = snapshot_base_damage × snapshot_attacker_multiplier × target taken multiplier
//! ```
//!
//! The attacker side is frozen when the snapshot is taken; the target side is
//! read at every tick.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use crate::aura::{AuraConfig, AuraHooks, AuraId, NoHooks};
use crate::clock::EventPriority;
use crate::error::{KernelError, SimResult};
use crate::outcome::SpellHit;
use crate::periodic::{PeriodicConfig, PeriodicId};
use crate::sim::Simulation;
use crate::stats::SpellSchool;
use crate::time::AuraDuration;
use crate::unit::UnitId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DotId(pub u32);

impl fmt::Display for DotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dot#{}", self.0)
    }
}

/// Why a snapshot is being taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotReason {
    /// Fresh cast.
    Applied,
    /// Rollover of an active DoT configured to re-snapshot.
    Refreshed,
    /// A new stack was added; the aura already reports the new count.
    StackAdded,
}

pub type SnapshotCallback = Rc<dyn Fn(&mut Simulation, DotId, SnapshotReason) -> SimResult<()>>;
pub type DotTickCallback = Rc<dyn Fn(&mut Simulation, DotId, f64) -> SimResult<()>>;

pub struct DotConfig {
    pub label: String,
    pub caster: UnitId,
    pub target: UnitId,
    pub school: SpellSchool,
    pub num_ticks: u32,
    pub tick_length: Duration,
    pub max_stacks: u32,
    /// Per-tick damage per stack used by the default snapshot.
    pub base_tick_damage: f64,
    pub resnapshot_on_refresh: bool,
    /// Replaces the default snapshot.
    pub on_snapshot: Option<SnapshotCallback>,
    /// Runs after each tick's damage is dealt.
    pub on_tick: Option<DotTickCallback>,
    /// Extra lifecycle hooks on the DoT's aura.
    pub hooks: Rc<dyn AuraHooks>,
}

impl DotConfig {
    pub fn new(
        label: impl Into<String>,
        caster: UnitId,
        target: UnitId,
        num_ticks: u32,
        tick_length: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            caster,
            target,
            school: SpellSchool::Physical,
            num_ticks,
            tick_length,
            max_stacks: 0,
            base_tick_damage: 0.0,
            resnapshot_on_refresh: false,
            on_snapshot: None,
            on_tick: None,
            hooks: Rc::new(NoHooks),
        }
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn with_base_tick_damage(mut self, damage: f64) -> Self {
        self.base_tick_damage = damage;
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn resnapshot_on_refresh(mut self) -> Self {
        self.resnapshot_on_refresh = true;
        self
    }

    pub fn with_snapshot(
        mut self,
        f: impl Fn(&mut Simulation, DotId, SnapshotReason) -> SimResult<()> + 'static,
    ) -> Self {
        self.on_snapshot = Some(Rc::new(f));
        self
    }

    pub fn with_tick(mut self, f: impl Fn(&mut Simulation, DotId, f64) -> SimResult<()> + 'static) -> Self {
        self.on_tick = Some(Rc::new(f));
        self
    }

    pub fn with_aura_hooks(mut self, hooks: impl AuraHooks + 'static) -> Self {
        self.hooks = Rc::new(hooks);
        self
    }

    /// Full duration of one application.
    pub fn duration(&self) -> Duration {
        self.tick_length.saturating_mul(self.num_ticks)
    }
}

pub struct Dot {
    pub(crate) aura: AuraId,
    pub(crate) caster: UnitId,
    pub(crate) target: UnitId,
    pub(crate) school: SpellSchool,
    pub(crate) num_ticks: u32,
    pub(crate) tick_length: Duration,
    pub(crate) base_tick_damage: f64,
    pub(crate) resnapshot_on_refresh: bool,
    pub(crate) on_snapshot: Option<SnapshotCallback>,
    pub(crate) on_tick: Option<DotTickCallback>,

    pub(crate) ticker: Option<PeriodicId>,
    pub(crate) snapshot_base_damage: f64,
    pub(crate) snapshot_attacker_multiplier: f64,
    pub(crate) ticks_fired: u32,
    pub(crate) total_damage: f64,
}

impl Dot {
    pub fn aura(&self) -> AuraId {
        self.aura
    }

    pub fn caster(&self) -> UnitId {
        self.caster
    }

    pub fn target(&self) -> UnitId {
        self.target
    }

    pub fn school(&self) -> SpellSchool {
        self.school
    }

    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    pub fn num_ticks(&self) -> u32 {
        self.num_ticks
    }

    pub fn base_tick_damage(&self) -> f64 {
        self.base_tick_damage
    }

    pub fn snapshot_base_damage(&self) -> f64 {
        self.snapshot_base_damage
    }

    pub fn snapshot_attacker_multiplier(&self) -> f64 {
        self.snapshot_attacker_multiplier
    }

    /// Ticks dealt by the current application.
    pub fn ticks_fired(&self) -> u32 {
        self.ticks_fired
    }

    /// Damage dealt this trial.
    pub fn total_damage(&self) -> f64 {
        self.total_damage
    }

    pub(crate) fn reset(&mut self) {
        self.ticker = None;
        self.snapshot_base_damage = 0.0;
        self.snapshot_attacker_multiplier = 1.0;
        self.ticks_fired = 0;
        self.total_damage = 0.0;
    }
}

impl fmt::Debug for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dot")
            .field("aura", &self.aura)
            .field("caster", &self.caster)
            .field("target", &self.target)
            .field("snapshot_base_damage", &self.snapshot_base_damage)
            .field("snapshot_attacker_multiplier", &self.snapshot_attacker_multiplier)
            .field("ticker", &self.ticker)
            .finish_non_exhaustive()
    }
}

/// Ties the ticker to the aura's lifecycle, then defers to content hooks.
struct DotAuraHooks {
    dot: DotId,
    inner: Rc<dyn AuraHooks>,
}

impl AuraHooks for DotAuraHooks {
    fn on_init(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        self.inner.on_init(sim, aura)
    }

    fn on_reset(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        self.inner.on_reset(sim, aura)
    }

    fn on_gain(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        sim.restart_dot_ticker(self.dot)?;
        self.inner.on_gain(sim, aura)
    }

    fn on_refresh(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        sim.restart_dot_ticker(self.dot)?;
        self.inner.on_refresh(sim, aura)
    }

    fn on_expire(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        let ticker = sim.dot_mut(self.dot)?.ticker.take();
        if let Some(ticker) = ticker {
            sim.cancel_periodic(ticker);
        }
        self.inner.on_expire(sim, aura)
    }

    fn on_stacks_change(&self, sim: &mut Simulation, aura: AuraId, old: u32, new: u32) -> SimResult<()> {
        self.inner.on_stacks_change(sim, aura, old, new)
    }

    fn on_spell_hit_dealt(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        self.inner.on_spell_hit_dealt(sim, aura, hit)
    }

    fn on_spell_hit_taken(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        self.inner.on_spell_hit_taken(sim, aura, hit)
    }
}

impl Simulation {
    /// Register a DoT. Its aura lives on the target under `config.label`.
    pub fn register_dot(&mut self, config: DotConfig) -> SimResult<DotId> {
        if config.tick_length.is_zero() {
            return Err(KernelError::ZeroPeriod);
        }
        self.unit(config.caster)?;

        let id = DotId(self.dots.len() as u32);
        let aura = self.register_aura(
            config.target,
            AuraConfig::new(
                config.label.clone(),
                AuraDuration::Finite(config.duration()),
            )
            .with_max_stacks(config.max_stacks)
            .with_hooks(DotAuraHooks {
                dot: id,
                inner: config.hooks,
            }),
        )?;

        self.dots.push(Dot {
            aura,
            caster: config.caster,
            target: config.target,
            school: config.school,
            num_ticks: config.num_ticks,
            tick_length: config.tick_length,
            base_tick_damage: config.base_tick_damage,
            resnapshot_on_refresh: config.resnapshot_on_refresh,
            on_snapshot: config.on_snapshot,
            on_tick: config.on_tick,
            ticker: None,
            snapshot_base_damage: 0.0,
            snapshot_attacker_multiplier: 1.0,
            ticks_fired: 0,
            total_damage: 0.0,
        });
        Ok(id)
    }

    pub fn dot(&self, id: DotId) -> SimResult<&Dot> {
        self.dots.get(id.0 as usize).ok_or(KernelError::UnknownHandle {
            kind: "dot",
            index: id.0,
        })
    }

    pub(crate) fn dot_mut(&mut self, id: DotId) -> SimResult<&mut Dot> {
        self.dots.get_mut(id.0 as usize).ok_or(KernelError::UnknownHandle {
            kind: "dot",
            index: id.0,
        })
    }

    pub fn is_dot_active(&self, id: DotId) -> bool {
        self.dot(id).is_ok_and(|dot| self.is_active(dot.aura))
    }

    /// Fresh cast: take a new snapshot, then activate (or restart) the DoT.
    pub fn apply_dot(&mut self, id: DotId) -> SimResult<()> {
        let aura = self.dot(id)?.aura;
        self.take_dot_snapshot(id, SnapshotReason::Applied)?;
        self.activate_aura(aura)
    }

    /// Rollover: restart the duration and the tick schedule, keeping the
    /// snapshot unless the DoT is configured to re-snapshot. No-op when inactive.
    pub fn refresh_dot(&mut self, id: DotId) -> SimResult<()> {
        let dot = self.dot(id)?;
        let aura = dot.aura;
        if !self.is_active(aura) {
            return Ok(());
        }
        if dot.resnapshot_on_refresh {
            self.take_dot_snapshot(id, SnapshotReason::Refreshed)?;
        }
        self.refresh_aura(aura)
    }

    pub fn apply_or_refresh_dot(&mut self, id: DotId) -> SimResult<()> {
        if self.is_dot_active(id) {
            self.refresh_dot(id)
        } else {
            self.apply_dot(id)
        }
    }

    /// Add a stack, snapshot its contribution, and roll the duration over.
    ///
    /// At the stack cap only the rollover happens.
    pub fn add_dot_stack(&mut self, id: DotId) -> SimResult<()> {
        let aura = self.dot(id)?.aura;
        if !self.aura(aura)?.is_stacking() {
            return self.apply_or_refresh_dot(id);
        }

        if !self.is_active(aura) {
            self.activate_aura(aura)?;
            return self.take_dot_snapshot(id, SnapshotReason::StackAdded);
        }

        let before = self.stacks(aura);
        self.add_stack(aura)?;
        if self.stacks(aura) != before {
            self.take_dot_snapshot(id, SnapshotReason::StackAdded)?;
        }
        self.refresh_aura(aura)
    }

    pub fn cancel_dot(&mut self, id: DotId) -> SimResult<()> {
        let aura = self.dot(id)?.aura;
        self.deactivate_aura(aura)
    }

    /// Freeze base damage and attacker multiplier for upcoming ticks.
    pub fn set_dot_snapshot(&mut self, id: DotId, base_damage: f64, attacker_multiplier: f64) -> SimResult<()> {
        let dot = self.dot_mut(id)?;
        dot.snapshot_base_damage = base_damage;
        dot.snapshot_attacker_multiplier = attacker_multiplier;
        Ok(())
    }

    /// Damage the next tick would deal against the target's current state.
    pub fn dot_tick_damage(&self, id: DotId) -> SimResult<f64> {
        let dot = self.dot(id)?;
        let taken = self.unit(dot.target)?.pseudo.taken_multiplier(dot.school);
        Ok(dot.snapshot_base_damage * dot.snapshot_attacker_multiplier * taken)
    }

    fn take_dot_snapshot(&mut self, id: DotId, reason: SnapshotReason) -> SimResult<()> {
        let dot = self.dot(id)?;
        if let Some(on_snapshot) = dot.on_snapshot.clone() {
            return on_snapshot(self, id, reason);
        }

        let stacks = self.stacks(dot.aura).max(1);
        let base = dot.base_tick_damage * f64::from(stacks);
        let multiplier = self.attacker_multiplier(dot.caster, dot.school)?;
        trace!(dot = %id, %reason, base, multiplier, "dot snapshot");
        self.set_dot_snapshot(id, base, multiplier)
    }

    fn restart_dot_ticker(&mut self, id: DotId) -> SimResult<()> {
        let dot = self.dot_mut(id)?;
        let previous = dot.ticker.take();
        dot.ticks_fired = 0;
        let (aura, tick_length, num_ticks) = (dot.aura, dot.tick_length, dot.num_ticks);
        if let Some(previous) = previous {
            self.cancel_periodic(previous);
        }

        let ticker = self.start_periodic(
            PeriodicConfig::new(tick_length, move |sim, _| sim.tick_dot(id))
                .with_ticks(num_ticks)
                .owned_by(aura)
                .with_priority(EventPriority::Dot),
        )?;
        self.dot_mut(id)?.ticker = Some(ticker);
        Ok(())
    }

    fn tick_dot(&mut self, id: DotId) -> SimResult<()> {
        let damage = self.dot_tick_damage(id)?;
        let now = self.now();
        let dot = self.dot_mut(id)?;
        dot.ticks_fired += 1;
        dot.total_damage += damage;
        let (caster, target, school) = (dot.caster, dot.target, dot.school);
        let on_tick = dot.on_tick.clone();
        trace!(dot = %id, damage, tick = dot.ticks_fired, at = %now, "dot tick");

        self.deal_damage(caster, target, damage, school)?;
        match on_tick {
            Some(f) => f(self, id, damage),
            None => Ok(()),
        }
    }

    pub(crate) fn reset_dots(&mut self) {
        for dot in &mut self.dots {
            dot.reset();
        }
    }
}
