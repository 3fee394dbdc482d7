//! Auras: named, time-bounded, optionally stacking effects attached to a unit.
//!
//! Content describes an aura with an [`AuraConfig`] and reacts to its
//! lifecycle through [`AuraHooks`]. The kernel owns all bookkeeping (active
//! flag, stacks, expiry, exclusive-effect membership); hooks only see the
//! simulation and the aura's handle.
//!
//! Hooks take `&self`. Per-instance state that a hook needs to remember between
//! OnGain and OnExpire (a bonus amount, a snapshotted value) belongs in a
//! `Cell` field of the hooks type, not in captured variables.

mod array;
mod exclusive;
mod lifecycle;
mod uptime;

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

pub use array::AuraArray;
pub use exclusive::{
    ExclusiveCallback, ExclusiveCategory, ExclusiveCategoryId, ExclusiveEffect, ExclusiveEffectId,
};

use crate::error::SimResult;
use crate::outcome::SpellHit;
use crate::sim::Simulation;
use crate::time::{AuraDuration, SimTime};
use crate::unit::UnitId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraId(pub u32);

impl fmt::Display for AuraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aura#{}", self.0)
    }
}

/// Lifecycle callbacks. Every method defaults to doing nothing.
///
/// Whatever `on_gain` applies, `on_expire` must undo.
pub trait AuraHooks {
    /// Once, when the simulation is finalized.
    fn on_init(&self, _sim: &mut Simulation, _aura: AuraId) -> SimResult<()> {
        Ok(())
    }

    /// At the start of every trial, after the kernel has reset the aura.
    fn on_reset(&self, _sim: &mut Simulation, _aura: AuraId) -> SimResult<()> {
        Ok(())
    }

    fn on_gain(&self, _sim: &mut Simulation, _aura: AuraId) -> SimResult<()> {
        Ok(())
    }

    fn on_expire(&self, _sim: &mut Simulation, _aura: AuraId) -> SimResult<()> {
        Ok(())
    }

    /// The duration of an active aura was reset.
    fn on_refresh(&self, _sim: &mut Simulation, _aura: AuraId) -> SimResult<()> {
        Ok(())
    }

    fn on_stacks_change(
        &self,
        _sim: &mut Simulation,
        _aura: AuraId,
        _old: u32,
        _new: u32,
    ) -> SimResult<()> {
        Ok(())
    }

    /// The aura's owner completed an action.
    fn on_spell_hit_dealt(
        &self,
        _sim: &mut Simulation,
        _aura: AuraId,
        _hit: &SpellHit,
    ) -> SimResult<()> {
        Ok(())
    }

    /// The aura's owner was the target of an action.
    fn on_spell_hit_taken(
        &self,
        _sim: &mut Simulation,
        _aura: AuraId,
        _hit: &SpellHit,
    ) -> SimResult<()> {
        Ok(())
    }
}

/// Hooks with no behaviour.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl AuraHooks for NoHooks {}

pub type AuraCallback = Rc<dyn Fn(&mut Simulation, AuraId) -> SimResult<()>>;
pub type StacksCallback = Rc<dyn Fn(&mut Simulation, AuraId, u32, u32) -> SimResult<()>>;
pub type HitCallback = Rc<dyn Fn(&mut Simulation, AuraId, &SpellHit) -> SimResult<()>>;

/// Closure-backed [`AuraHooks`] for stateless auras.
#[derive(Clone, Default)]
pub struct AuraCallbacks {
    init: Option<AuraCallback>,
    reset: Option<AuraCallback>,
    gain: Option<AuraCallback>,
    expire: Option<AuraCallback>,
    refresh: Option<AuraCallback>,
    stacks_change: Option<StacksCallback>,
    hit_dealt: Option<HitCallback>,
    hit_taken: Option<HitCallback>,
}

impl AuraCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init(
        mut self,
        f: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.init = Some(Rc::new(f));
        self
    }

    pub fn with_reset(
        mut self,
        f: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.reset = Some(Rc::new(f));
        self
    }

    pub fn with_gain(
        mut self,
        f: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.gain = Some(Rc::new(f));
        self
    }

    pub fn with_expire(
        mut self,
        f: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.expire = Some(Rc::new(f));
        self
    }

    pub fn with_refresh(
        mut self,
        f: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.refresh = Some(Rc::new(f));
        self
    }

    pub fn with_stacks_change(
        mut self,
        f: impl Fn(&mut Simulation, AuraId, u32, u32) -> SimResult<()> + 'static,
    ) -> Self {
        self.stacks_change = Some(Rc::new(f));
        self
    }

    pub fn with_spell_hit_dealt(
        mut self,
        f: impl Fn(&mut Simulation, AuraId, &SpellHit) -> SimResult<()> + 'static,
    ) -> Self {
        self.hit_dealt = Some(Rc::new(f));
        self
    }

    pub fn with_spell_hit_taken(
        mut self,
        f: impl Fn(&mut Simulation, AuraId, &SpellHit) -> SimResult<()> + 'static,
    ) -> Self {
        self.hit_taken = Some(Rc::new(f));
        self
    }
}

fn call(callback: &Option<AuraCallback>, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
    match callback {
        Some(f) => f(sim, aura),
        None => Ok(()),
    }
}

impl AuraHooks for AuraCallbacks {
    fn on_init(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        call(&self.init, sim, aura)
    }

    fn on_reset(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        call(&self.reset, sim, aura)
    }

    fn on_gain(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        call(&self.gain, sim, aura)
    }

    fn on_expire(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        call(&self.expire, sim, aura)
    }

    fn on_refresh(&self, sim: &mut Simulation, aura: AuraId) -> SimResult<()> {
        call(&self.refresh, sim, aura)
    }

    fn on_stacks_change(
        &self,
        sim: &mut Simulation,
        aura: AuraId,
        old: u32,
        new: u32,
    ) -> SimResult<()> {
        match &self.stacks_change {
            Some(f) => f(sim, aura, old, new),
            None => Ok(()),
        }
    }

    fn on_spell_hit_dealt(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        match &self.hit_dealt {
            Some(f) => f(sim, aura, hit),
            None => Ok(()),
        }
    }

    fn on_spell_hit_taken(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        match &self.hit_taken {
            Some(f) => f(sim, aura, hit),
            None => Ok(()),
        }
    }
}

/// Everything needed to register an aura.
#[derive(Clone)]
pub struct AuraConfig {
    pub label: String,
    pub tag: Option<String>,
    pub duration: AuraDuration,
    /// Zero for non-stacking auras.
    pub max_stacks: u32,
    /// Activate at time zero of every trial.
    pub activate_on_reset: bool,
    /// Counted by [`Simulation::measure_build_phase_stats`].
    pub build_phase: bool,
    pub hooks: Rc<dyn AuraHooks>,
}

impl AuraConfig {
    pub fn new(label: impl Into<String>, duration: impl Into<AuraDuration>) -> Self {
        Self {
            label: label.into(),
            tag: None,
            duration: duration.into(),
            max_stacks: 0,
            activate_on_reset: false,
            build_phase: false,
            hooks: Rc::new(NoHooks),
        }
    }

    /// Never expires and activates itself at the start of every trial.
    pub fn permanent(label: impl Into<String>) -> Self {
        Self::new(label, AuraDuration::Never).activate_on_reset()
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_hooks(mut self, hooks: impl AuraHooks + 'static) -> Self {
        self.hooks = Rc::new(hooks);
        self
    }

    pub fn with_shared_hooks(mut self, hooks: Rc<dyn AuraHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn activate_on_reset(mut self) -> Self {
        self.activate_on_reset = true;
        self
    }

    /// Mark the aura as part of the unit's pre-combat stats.
    pub fn in_build_phase(mut self) -> Self {
        self.build_phase = true;
        self
    }
}

impl fmt::Debug for AuraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuraConfig")
            .field("label", &self.label)
            .field("tag", &self.tag)
            .field("duration", &self.duration)
            .field("max_stacks", &self.max_stacks)
            .field("activate_on_reset", &self.activate_on_reset)
            .field("build_phase", &self.build_phase)
            .finish_non_exhaustive()
    }
}

/// Per-trial aura statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraMetrics {
    pub activations: u64,
    pub refreshes: u64,
    pub procs: u64,
    pub uptime: Duration,
}

/// Kernel-side state of one registered aura.
pub struct Aura {
    pub(crate) id: AuraId,
    pub(crate) unit: UnitId,
    pub(crate) label: String,
    pub(crate) tag: Option<String>,
    pub(crate) duration: AuraDuration,
    pub(crate) max_stacks: u32,
    pub(crate) activate_on_reset: bool,
    pub(crate) build_phase: bool,
    pub(crate) hooks: Rc<dyn AuraHooks>,

    pub(crate) active: bool,
    pub(crate) stacks: u32,
    pub(crate) started_at: SimTime,
    pub(crate) expires_at: SimTime,
    /// Bumped on every activation; lets owners tell activations apart.
    pub(crate) activation_serial: u64,
    /// Bumped whenever the pending expiry event becomes stale.
    pub(crate) expiry_serial: u64,

    pub(crate) exclusive: Vec<ExclusiveEffectId>,
    pub(crate) metrics: AuraMetrics,
}

impl Aura {
    pub(crate) fn new(id: AuraId, unit: UnitId, config: AuraConfig) -> Self {
        Self {
            id,
            unit,
            label: config.label,
            tag: config.tag,
            duration: config.duration,
            max_stacks: config.max_stacks,
            activate_on_reset: config.activate_on_reset,
            build_phase: config.build_phase,
            hooks: config.hooks,
            active: false,
            stacks: 0,
            started_at: SimTime::ZERO,
            expires_at: SimTime::ZERO,
            activation_serial: 0,
            expiry_serial: 0,
            exclusive: Vec::new(),
            metrics: AuraMetrics::default(),
        }
    }

    pub fn id(&self) -> AuraId {
        self.id
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn duration(&self) -> AuraDuration {
        self.duration
    }

    pub fn max_stacks(&self) -> u32 {
        self.max_stacks
    }

    pub fn is_stacking(&self) -> bool {
        self.max_stacks > 0
    }

    pub fn is_build_phase(&self) -> bool {
        self.build_phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    /// Start of the current activation.
    pub fn started_at(&self) -> SimTime {
        self.started_at
    }

    /// [`SimTime::NEVER`] for permanent auras.
    pub fn expires_at(&self) -> SimTime {
        self.expires_at
    }

    pub fn activation_serial(&self) -> u64 {
        self.activation_serial
    }

    pub fn exclusive_effects(&self) -> &[ExclusiveEffectId] {
        &self.exclusive
    }

    pub fn metrics(&self) -> &AuraMetrics {
        &self.metrics
    }

    /// Uptime including the still-running activation, if any.
    pub fn uptime_at(&self, now: SimTime) -> Duration {
        if self.active {
            self.metrics.uptime + (now - self.started_at)
        } else {
            self.metrics.uptime
        }
    }

    /// Clear per-trial state at the start of a trial.
    pub(crate) fn reset(&mut self) {
        self.active = false;
        self.stacks = 0;
        self.started_at = SimTime::ZERO;
        self.expires_at = SimTime::ZERO;
        self.expiry_serial += 1;
        self.metrics = AuraMetrics::default();
    }
}

impl fmt::Debug for Aura {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aura")
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("label", &self.label)
            .field("active", &self.active)
            .field("stacks", &self.stacks)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
