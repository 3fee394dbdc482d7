//! Outcome notification and proc resolution.
//!
//! A completed action is described by a [`SpellHit`]. [`Simulation::resolve_outcome`]
//! records its damage and notifies every active aura on the caster
//! (`on_spell_hit_dealt`) and then on the target (`on_spell_hit_taken`), each in
//! registration order.
//!
//! Proc auras created with [`Simulation::register_proc`] react independently:
//!
//! ```text
//! mask matches → hit landed → ICD ready → roll(label) < chance → start ICD → effect
//! ```
//!
//! Each proc rolls its own stream, so whether one proc fires never moves
//! another proc's random sequence.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use bitflags::bitflags;
use tracing::debug;

use crate::aura::{AuraConfig, AuraHooks, AuraId};
use crate::error::SimResult;
use crate::sim::Simulation;
use crate::stats::SpellSchool;
use crate::timer::Cooldown;
use crate::unit::UnitId;

bitflags! {
    /// Classification of the action that produced an outcome.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcMask: u32 {
        const MELEE_MH_AUTO     = 1 << 0;
        const MELEE_OH_AUTO     = 1 << 1;
        const MELEE_MH_SPECIAL  = 1 << 2;
        const MELEE_OH_SPECIAL  = 1 << 3;
        const RANGED_AUTO       = 1 << 4;
        const RANGED_SPECIAL    = 1 << 5;
        const SPELL_DAMAGE      = 1 << 6;
        const SPELL_HEALING     = 1 << 7;
        const PERIODIC_DAMAGE   = 1 << 8;
        /// Damage from an item or imbue proc.
        const SPELL_DAMAGE_PROC = 1 << 9;

        const MELEE_AUTO    = Self::MELEE_MH_AUTO.bits() | Self::MELEE_OH_AUTO.bits();
        const MELEE_SPECIAL = Self::MELEE_MH_SPECIAL.bits() | Self::MELEE_OH_SPECIAL.bits();
        const MELEE_MH      = Self::MELEE_MH_AUTO.bits() | Self::MELEE_MH_SPECIAL.bits();
        const MELEE_OH      = Self::MELEE_OH_AUTO.bits() | Self::MELEE_OH_SPECIAL.bits();
        const MELEE         = Self::MELEE_AUTO.bits() | Self::MELEE_SPECIAL.bits();
        const RANGED        = Self::RANGED_AUTO.bits() | Self::RANGED_SPECIAL.bits();
        const WHITE_HIT     = Self::MELEE_AUTO.bits() | Self::RANGED_AUTO.bits();
    }
}

impl ProcMask {
    /// Whether an action classified as `self` is observed by `filter`.
    pub fn matches(self, filter: ProcMask) -> bool {
        self.intersects(filter)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HitOutcome {
    Miss,
    Dodge,
    Parry,
    Resist,
    Block,
    Glance,
    #[default]
    Hit,
    Crit,
}

impl HitOutcome {
    pub fn landed(self) -> bool {
        matches!(self, Self::Hit | Self::Crit | Self::Glance | Self::Block)
    }
}

/// Result of one completed action.
#[derive(Clone, Debug, PartialEq)]
pub struct SpellHit {
    pub caster: UnitId,
    pub target: UnitId,
    pub label: String,
    pub proc_mask: ProcMask,
    pub school: SpellSchool,
    pub outcome: HitOutcome,
    pub damage: f64,
}

impl SpellHit {
    pub fn new(caster: UnitId, target: UnitId, label: impl Into<String>, proc_mask: ProcMask) -> Self {
        Self {
            caster,
            target,
            label: label.into(),
            proc_mask,
            school: SpellSchool::Physical,
            outcome: HitOutcome::Hit,
            damage: 0.0,
        }
    }

    pub fn with_outcome(mut self, outcome: HitOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_damage(mut self, damage: f64) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn landed(&self) -> bool {
        self.outcome.landed()
    }
}

pub type ProcCallback = Rc<dyn Fn(&mut Simulation, AuraId, &SpellHit) -> SimResult<()>>;

/// What a proc does when it fires.
#[derive(Clone)]
pub enum ProcEffect {
    ActivateAura(AuraId),
    AddStack(AuraId),
    Custom(ProcCallback),
}

impl fmt::Debug for ProcEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivateAura(aura) => f.debug_tuple("ActivateAura").field(aura).finish(),
            Self::AddStack(aura) => f.debug_tuple("AddStack").field(aura).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which side of an outcome the proc observes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProcSide {
    #[default]
    Dealt,
    Taken,
}

#[derive(Clone, Debug)]
pub struct ProcConfig {
    /// Aura label and RNG stream label.
    pub label: String,
    pub proc_mask: ProcMask,
    pub chance: f64,
    pub icd: Option<Duration>,
    pub side: ProcSide,
    pub effect: ProcEffect,
}

impl ProcConfig {
    pub fn new(label: impl Into<String>, proc_mask: ProcMask, chance: f64, effect: ProcEffect) -> Self {
        Self {
            label: label.into(),
            proc_mask,
            chance,
            icd: None,
            side: ProcSide::Dealt,
            effect,
        }
    }

    pub fn with_icd(mut self, icd: Duration) -> Self {
        self.icd = Some(icd);
        self
    }

    pub fn on_taken(mut self) -> Self {
        self.side = ProcSide::Taken;
        self
    }
}

struct ProcHooks {
    label: String,
    proc_mask: ProcMask,
    chance: f64,
    icd: Option<Cooldown>,
    side: ProcSide,
    effect: ProcEffect,
}

impl ProcHooks {
    fn react(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        if !hit.proc_mask.matches(self.proc_mask) || !hit.landed() {
            return Ok(());
        }
        if let Some(icd) = &self.icd {
            if !sim.cooldown_ready(icd)? {
                return Ok(());
            }
        }
        if self.chance < 1.0 && sim.roll_float(&self.label)? >= self.chance {
            return Ok(());
        }

        if let Some(icd) = &self.icd {
            sim.trigger_cooldown(icd)?;
        }
        sim.aura_mut(aura)?.metrics.procs += 1;
        debug!(aura = %aura, label = %self.label, at = %sim.now(), "proc triggered");

        match &self.effect {
            ProcEffect::ActivateAura(target) => sim.activate_aura(*target),
            ProcEffect::AddStack(target) if sim.is_active(*target) => {
                sim.refresh_aura(*target)?;
                sim.add_stack(*target)
            }
            ProcEffect::AddStack(target) => sim.activate_aura(*target),
            ProcEffect::Custom(f) => f(sim, aura, hit),
        }
    }
}

impl AuraHooks for ProcHooks {
    fn on_spell_hit_dealt(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        match self.side {
            ProcSide::Dealt => self.react(sim, aura, hit),
            ProcSide::Taken => Ok(()),
        }
    }

    fn on_spell_hit_taken(&self, sim: &mut Simulation, aura: AuraId, hit: &SpellHit) -> SimResult<()> {
        match self.side {
            ProcSide::Taken => self.react(sim, aura, hit),
            ProcSide::Dealt => Ok(()),
        }
    }
}

impl Simulation {
    /// Register a permanent aura on `unit` that reacts to outcomes.
    pub fn register_proc(&mut self, unit: UnitId, config: ProcConfig) -> SimResult<AuraId> {
        let icd = match config.icd {
            Some(duration) => Some(Cooldown::new(self.new_timer(), duration)),
            None => None,
        };
        let hooks = ProcHooks {
            label: config.label.clone(),
            proc_mask: config.proc_mask,
            chance: config.chance,
            icd,
            side: config.side,
            effect: config.effect,
        };
        self.register_aura(unit, AuraConfig::permanent(config.label).with_hooks(hooks))
    }

    /// Record the hit's damage and notify observers on both units.
    pub fn resolve_outcome(&mut self, hit: &SpellHit) -> SimResult<()> {
        if hit.landed() && hit.damage != 0.0 {
            self.deal_damage(hit.caster, hit.target, hit.damage, hit.school)?;
        }

        let dealt = self.unit(hit.caster)?.auras.clone();
        for aura in dealt {
            if !self.is_active(aura) {
                continue;
            }
            let hooks = self.aura(aura)?.hooks.clone();
            hooks.on_spell_hit_dealt(self, aura, hit)?;
        }

        let taken = self.unit(hit.target)?.auras.clone();
        for aura in taken {
            if !self.is_active(aura) {
                continue;
            }
            let hooks = self.aura(aura)?.hooks.clone();
            hooks.on_spell_hit_taken(self, aura, hit)?;
        }
        Ok(())
    }

    /// Book `amount` as dealt by `caster` and taken by `target`.
    pub fn deal_damage(
        &mut self,
        caster: UnitId,
        target: UnitId,
        amount: f64,
        school: SpellSchool,
    ) -> SimResult<()> {
        self.unit(target)?;
        let source = self.unit_mut(caster)?;
        source.metrics.damage_dealt += amount;
        source.metrics.hits_dealt += 1;
        self.unit_mut(target)?.metrics.damage_taken += amount;
        tracing::trace!(%caster, %target, amount, %school, at = %self.now(), "damage dealt");
        Ok(())
    }

    /// Book `amount` of mana restored to `target` by `source`.
    pub fn restore_mana(&mut self, source: UnitId, target: UnitId, amount: f64) -> SimResult<()> {
        self.unit(source)?;
        self.unit_mut(target)?.metrics.mana_restored += amount;
        tracing::trace!(%source, %target, amount, at = %self.now(), "mana restored");
        Ok(())
    }

    /// Outgoing damage multiplier of `unit` for `school`.
    pub fn attacker_multiplier(&self, unit: UnitId, school: SpellSchool) -> SimResult<f64> {
        Ok(self.unit(unit)?.pseudo.attacker_multiplier(school))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::aura::AuraCallbacks;
    use crate::config::SimConfig;
    use crate::error::KernelError;
    use crate::stats::Stats;
    use crate::time::{AuraDuration, SimTime};

    struct Fixture {
        sim: Simulation,
        shaman: UnitId,
        boss: UnitId,
    }

    fn fixture() -> Fixture {
        let mut sim = Simulation::new(SimConfig::new());
        let shaman = sim.add_unit("shaman", Stats::new()).unwrap();
        let boss = sim.add_unit("boss", Stats::new()).unwrap();
        Fixture { sim, shaman, boss }
    }

    fn white_hit(f: &Fixture) -> SpellHit {
        SpellHit::new(f.shaman, f.boss, "Auto Attack", ProcMask::MELEE_MH_AUTO).with_damage(100.0)
    }

    #[test]
    fn certain_proc_respects_icd() {
        let mut f = fixture();
        let buff = f
            .sim
            .register_aura(f.shaman, AuraConfig::new("Flurry", AuraDuration::secs(15)))
            .unwrap();
        let proc_aura = f
            .sim
            .register_proc(
                f.shaman,
                ProcConfig::new("Always", ProcMask::MELEE, 1.0, ProcEffect::AddStack(buff))
                    .with_icd(Duration::from_millis(1_500)),
            )
            .unwrap();
        f.sim.finalize().unwrap();
        f.sim.reset(9).unwrap();

        let hit = white_hit(&f);
        for step in 0..4u64 {
            f.sim.run_until(SimTime::from_millis(step * 1_000)).unwrap();
            f.sim.resolve_outcome(&hit).unwrap();
        }

        // Hits at 0s and 2s pass the ICD; 1s and 3s do not.
        assert_eq!(f.sim.aura(proc_aura).unwrap().metrics().procs, 2);
        assert!(f.sim.is_active(buff));
    }

    #[test]
    fn stacking_procs_refresh_once_per_proc() {
        let mut f = fixture();
        let buff = f
            .sim
            .register_aura(
                f.shaman,
                AuraConfig::new("Bloodlust Brooch", AuraDuration::secs(10)).with_max_stacks(3),
            )
            .unwrap();
        f.sim
            .register_proc(
                f.shaman,
                ProcConfig::new("Brooch", ProcMask::MELEE, 1.0, ProcEffect::AddStack(buff)),
            )
            .unwrap();
        f.sim.finalize().unwrap();
        f.sim.reset(4).unwrap();

        let hit = white_hit(&f);
        for step in 0..5u64 {
            f.sim.run_until(SimTime::from_millis(step * 1_000)).unwrap();
            f.sim.resolve_outcome(&hit).unwrap();
        }

        // First proc activates, the next four refresh; two of those hit the cap.
        let metrics = *f.sim.aura(buff).unwrap().metrics();
        assert_eq!(metrics.activations, 1);
        assert_eq!(metrics.refreshes, 4);
        assert_eq!(f.sim.stacks(buff), 3);
        assert_eq!(
            f.sim.remaining_duration(buff).unwrap(),
            AuraDuration::secs(10)
        );
    }

    #[test]
    fn misses_and_wrong_masks_never_proc() {
        let mut f = fixture();
        let buff = f
            .sim
            .register_aura(f.shaman, AuraConfig::new("Elemental Devastation", AuraDuration::secs(10)))
            .unwrap();
        let proc_aura = f
            .sim
            .register_proc(
                f.shaman,
                ProcConfig::new("Devastation", ProcMask::SPELL_DAMAGE, 1.0, ProcEffect::ActivateAura(buff)),
            )
            .unwrap();
        f.sim.finalize().unwrap();
        f.sim.reset(0).unwrap();

        f.sim.resolve_outcome(&white_hit(&f)).unwrap();
        let missed = SpellHit::new(f.shaman, f.boss, "Lightning Bolt", ProcMask::SPELL_DAMAGE)
            .with_outcome(HitOutcome::Miss);
        f.sim.resolve_outcome(&missed).unwrap();

        assert_eq!(f.sim.aura(proc_aura).unwrap().metrics().procs, 0);
        assert!(!f.sim.is_active(buff));
    }

    #[test]
    fn taken_side_observers_see_incoming_hits() {
        let mut f = fixture();
        let reflected = Rc::new(Cell::new(0.0));
        let sink = reflected.clone();
        f.sim
            .register_aura(
                f.boss,
                AuraConfig::permanent("Thorns").with_hooks(AuraCallbacks::new().with_spell_hit_taken(
                    move |_, _, hit| {
                        if hit.landed() && hit.proc_mask.matches(ProcMask::MELEE) {
                            sink.set(sink.get() + 18.0);
                        }
                        Ok(())
                    },
                )),
            )
            .unwrap();
        f.sim.finalize().unwrap();
        f.sim.reset(0).unwrap();

        f.sim.resolve_outcome(&white_hit(&f)).unwrap();
        assert_eq!(reflected.get(), 18.0);
        assert_eq!(f.sim.unit(f.boss).unwrap().metrics().damage_taken, 100.0);
    }

    #[test]
    fn restored_mana_is_booked_on_the_target() {
        let mut f = fixture();
        f.sim.finalize().unwrap();
        f.sim.reset(0).unwrap();

        f.sim.restore_mana(f.shaman, f.boss, 290.0).unwrap();
        f.sim.restore_mana(f.shaman, f.boss, 290.0).unwrap();
        assert_eq!(f.sim.unit(f.boss).unwrap().metrics().mana_restored, 580.0);
        assert_eq!(
            f.sim.restore_mana(UnitId(9), f.boss, 1.0),
            Err(KernelError::UnknownUnit(UnitId(9)))
        );
    }

    #[test]
    fn procs_do_not_share_rng_draws() {
        let run = |with_second: bool| {
            let mut f = fixture();
            let first = f
                .sim
                .register_proc(
                    f.shaman,
                    ProcConfig::new("First", ProcMask::MELEE, 0.3, ProcEffect::Custom(Rc::new(|_: &mut Simulation, _: AuraId, _: &SpellHit| Ok(())))),
                )
                .unwrap();
            if with_second {
                f.sim
                    .register_proc(
                        f.shaman,
                        ProcConfig::new("Second", ProcMask::MELEE, 0.5, ProcEffect::Custom(Rc::new(|_: &mut Simulation, _: AuraId, _: &SpellHit| Ok(())))),
                    )
                    .unwrap();
            }
            f.sim.finalize().unwrap();
            f.sim.reset(77).unwrap();
            let hit = white_hit(&f);
            for _ in 0..200 {
                f.sim.resolve_outcome(&hit).unwrap();
            }
            f.sim.aura(first).unwrap().metrics().procs
        };

        assert_eq!(run(false), run(true));
    }
}
