//! Damage-over-time effects and stacking debuffs.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use sim_core::{
    AuraArray, AuraConfig, AuraId, DotConfig, DotId, HitOutcome, ProcConfig, ProcEffect, ProcMask,
    SimResult, Simulation, SnapshotReason, SpellHit, SpellSchool, UnitId,
};

use crate::imbues::proc_damage;

/// Deadly Poison: hits have a chance to add a stack of a nature DoT on the
/// target. Each stack adds to the snapshot; only the first stack captures the
/// rogue's damage multiplier.
#[derive(Clone, Debug)]
pub struct DeadlyPoison {
    pub proc_aura: AuraId,
    dots: Rc<BTreeMap<UnitId, DotId>>,
}

impl DeadlyPoison {
    /// Proc label; also names the RNG stream.
    pub const LABEL: &'static str = "Deadly Poison";
    /// Chance per landed hit matching the proc mask.
    pub const PROC_CHANCE: f64 = 0.3;
    pub const MAX_STACKS: u32 = 5;
    /// Ticks per application.
    pub const NUM_TICKS: u32 = 4;
    pub const TICK_LENGTH: Duration = Duration::from_secs(3);
    /// Flat tick damage added by each stack before multipliers.
    pub const TICK_DAMAGE_PER_STACK: f64 = 34.0;

    /// Register the poison on `unit` with one DoT per entry of `targets`.
    ///
    /// Each rogue gets its own DoT on a shared target, labelled with the
    /// caster.
    pub fn register(
        sim: &mut Simulation,
        unit: UnitId,
        targets: &[UnitId],
        proc_mask: ProcMask,
    ) -> SimResult<Self> {
        let dot_label = format!("{} ({unit})", Self::LABEL);
        let mut dots = BTreeMap::new();
        for &target in targets {
            let dot = sim.register_dot(
                DotConfig::new(dot_label.clone(), unit, target, Self::NUM_TICKS, Self::TICK_LENGTH)
                    .with_school(SpellSchool::Nature)
                    .with_max_stacks(Self::MAX_STACKS)
                    .with_snapshot(Self::snapshot),
            )?;
            dots.insert(target, dot);
        }
        let dots = Rc::new(dots);

        let lookup = dots.clone();
        let effect = ProcEffect::Custom(Rc::new(
            move |sim: &mut Simulation, _: AuraId, hit: &SpellHit| match lookup.get(&hit.target) {
                Some(dot) => sim.add_dot_stack(*dot),
                None => Ok(()),
            },
        ));
        let proc_aura = sim.register_proc(
            unit,
            ProcConfig::new(Self::LABEL, proc_mask, Self::PROC_CHANCE, effect),
        )?;
        Ok(Self { proc_aura, dots })
    }

    /// The DoT this rogue keeps on `target`, if `target` was registered.
    pub fn dot(&self, target: UnitId) -> Option<DotId> {
        self.dots.get(&target).copied()
    }

    /// The first stack captures the caster's multiplier; every stack adds
    /// its flat tick damage.
    fn snapshot(sim: &mut Simulation, id: DotId, reason: SnapshotReason) -> SimResult<()> {
        if reason != SnapshotReason::StackAdded {
            return Ok(());
        }
        let dot = sim.dot(id)?;
        let (caster, school) = (dot.caster(), dot.school());
        let (base, multiplier) = match sim.stacks(dot.aura()) {
            1 => (0.0, sim.attacker_multiplier(caster, school)?),
            _ => (dot.snapshot_base_damage(), dot.snapshot_attacker_multiplier()),
        };
        sim.set_dot_snapshot(id, base + Self::TICK_DAMAGE_PER_STACK, multiplier)
    }
}

/// Wound Poison: hits have a chance to apply a stacking healing-reduction
/// debuff on the target.
#[derive(Clone, Debug)]
pub struct WoundPoison {
    pub proc_aura: AuraId,
    /// One debuff per registered target, labelled with the caster.
    pub debuffs: Rc<AuraArray>,
}

impl WoundPoison {
    /// Proc label; also names the RNG stream.
    pub const LABEL: &'static str = "Wound Poison";
    /// Chance per landed hit matching the proc mask.
    pub const PROC_CHANCE: f64 = 0.3;
    pub const MAX_STACKS: u32 = 5;
    /// Debuff duration, restarted by every proc.
    pub const DURATION: Duration = Duration::from_secs(15);
    /// Flat healing removed per stack.
    pub const HEALING_REDUCTION_PER_STACK: f64 = 135.0;

    /// Register the poison on `unit` with one debuff per entry of `targets`.
    pub fn register(
        sim: &mut Simulation,
        unit: UnitId,
        targets: &[UnitId],
        proc_mask: ProcMask,
    ) -> SimResult<Self> {
        let debuff_label = format!("{} ({unit})", Self::LABEL);
        let debuffs = Rc::new(AuraArray::new(sim, targets, |sim, target| {
            sim.register_aura(
                target,
                AuraConfig::new(debuff_label.clone(), Self::DURATION).with_max_stacks(Self::MAX_STACKS),
            )
        })?);

        let lookup = debuffs.clone();
        let effect = ProcEffect::Custom(Rc::new(
            move |sim: &mut Simulation, _: AuraId, hit: &SpellHit| {
                let Some(debuff) = lookup.get(hit.target) else {
                    return Ok(());
                };
                if !sim.is_active(debuff) {
                    return sim.activate_aura(debuff);
                }
                sim.refresh_aura(debuff)?;
                sim.add_stack(debuff)
            },
        ));
        let proc_aura = sim.register_proc(
            unit,
            ProcConfig::new(Self::LABEL, proc_mask, Self::PROC_CHANCE, effect),
        )?;
        Ok(Self { proc_aura, debuffs })
    }

    /// Flat healing removed from each heal on `target` right now.
    pub fn healing_reduction(&self, sim: &Simulation, target: UnitId) -> f64 {
        match self.debuffs.get(target) {
            Some(debuff) => f64::from(sim.stacks(debuff)) * Self::HEALING_REDUCTION_PER_STACK,
            None => 0.0,
        }
    }
}

/// Rake: an instant physical hit that applies a bleed when it lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rake {
    pub caster: UnitId,
    pub target: UnitId,
    pub dot: DotId,
}

impl Rake {
    pub const LABEL: &'static str = "Rake";
    /// Damage of the instant hit, before multipliers.
    pub const INITIAL_DAMAGE: f64 = 58.0;
    /// Bleed damage per tick, snapshotted when the bleed lands.
    pub const TICK_DAMAGE: f64 = 32.0;
    pub const NUM_TICKS: u32 = 3;
    pub const TICK_LENGTH: Duration = Duration::from_secs(3);

    /// Register `caster`'s bleed on `target`.
    pub fn register(sim: &mut Simulation, caster: UnitId, target: UnitId) -> SimResult<Self> {
        let label = format!("{} ({caster})", Self::LABEL);
        let dot = sim.register_dot(
            DotConfig::new(label, caster, target, Self::NUM_TICKS, Self::TICK_LENGTH)
                .with_school(SpellSchool::Physical)
                .with_base_tick_damage(Self::TICK_DAMAGE),
        )?;
        Ok(Self {
            caster,
            target,
            dot,
        })
    }

    /// Resolve the initial hit with `outcome`; a landed hit (re)applies the
    /// bleed with a fresh snapshot.
    pub fn cast(&self, sim: &mut Simulation, outcome: HitOutcome) -> SimResult<()> {
        let damage = proc_damage(
            sim,
            self.caster,
            self.target,
            Self::INITIAL_DAMAGE,
            SpellSchool::Physical,
        )?;
        let hit = SpellHit::new(self.caster, self.target, Self::LABEL, ProcMask::MELEE_MH_SPECIAL)
            .with_school(SpellSchool::Physical)
            .with_damage(damage)
            .with_outcome(outcome);
        sim.resolve_outcome(&hit)?;
        if hit.landed() {
            sim.apply_dot(self.dot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sim_core::{SimConfig, SimTime, Stats};

    use super::*;

    fn rogue_and_boss() -> (Simulation, UnitId, UnitId) {
        let mut sim = Simulation::new(SimConfig::new());
        let rogue = sim.add_unit("rogue", Stats::new()).unwrap();
        let boss = sim.add_unit("boss", Stats::new()).unwrap();
        (sim, rogue, boss)
    }

    #[test]
    fn deadly_poison_stacks_grow_the_snapshot() {
        let (mut sim, rogue, boss) = rogue_and_boss();
        let poison = DeadlyPoison::register(&mut sim, rogue, &[boss], ProcMask::MELEE).unwrap();
        let dot = poison.dot(boss).unwrap();
        sim.finalize().unwrap();
        sim.reset(5).unwrap();

        sim.pseudo_stats_mut(rogue).unwrap().damage_dealt_multiplier = 1.5;
        sim.add_dot_stack(dot).unwrap();
        assert_eq!(sim.dot(dot).unwrap().snapshot_base_damage(), 34.0);
        assert_eq!(sim.dot(dot).unwrap().snapshot_attacker_multiplier(), 1.5);

        // Later stacks keep the first stack's multiplier.
        sim.pseudo_stats_mut(rogue).unwrap().damage_dealt_multiplier = 2.0;
        for _ in 0..6 {
            sim.add_dot_stack(dot).unwrap();
        }
        let aura = sim.dot(dot).unwrap().aura();
        assert_eq!(sim.stacks(aura), DeadlyPoison::MAX_STACKS);
        assert_eq!(sim.dot(dot).unwrap().snapshot_base_damage(), 170.0);
        assert_eq!(sim.dot_tick_damage(dot).unwrap(), 170.0 * 1.5);

        sim.run_until(SimTime::from_duration(Duration::from_secs(12))).unwrap();
        assert_eq!(sim.dot(dot).unwrap().ticks_fired(), 4);
        assert!(!sim.is_dot_active(dot));
        assert_eq!(sim.unit(boss).unwrap().metrics().damage_taken, 4.0 * 170.0 * 1.5);
    }

    #[test]
    fn deadly_poison_restarts_from_one_stack_after_falling_off() {
        let (mut sim, rogue, boss) = rogue_and_boss();
        let poison = DeadlyPoison::register(&mut sim, rogue, &[boss], ProcMask::MELEE).unwrap();
        let dot = poison.dot(boss).unwrap();
        sim.finalize().unwrap();
        sim.reset(5).unwrap();

        sim.add_dot_stack(dot).unwrap();
        sim.add_dot_stack(dot).unwrap();
        sim.run_until(SimTime::from_duration(Duration::from_secs(13))).unwrap();
        assert!(!sim.is_dot_active(dot));

        sim.add_dot_stack(dot).unwrap();
        assert_eq!(sim.dot(dot).unwrap().snapshot_base_damage(), 34.0);
    }

    #[test]
    fn deadly_poison_procs_only_on_registered_targets() {
        let (mut sim, rogue, boss) = rogue_and_boss();
        let add = sim.add_unit("add", Stats::new()).unwrap();
        let poison = DeadlyPoison::register(&mut sim, rogue, &[boss], ProcMask::MELEE).unwrap();
        sim.finalize().unwrap();
        sim.reset(9).unwrap();

        let swing = SpellHit::new(rogue, add, "Melee", ProcMask::MELEE_MH_AUTO);
        for _ in 0..100 {
            sim.resolve_outcome(&swing).unwrap();
        }
        assert!(poison.dot(add).is_none());
        assert!(!sim.is_dot_active(poison.dot(boss).unwrap()));
    }

    #[test]
    fn two_rogues_poison_the_same_target_independently() {
        let (mut sim, first, boss) = rogue_and_boss();
        let second = sim.add_unit("second rogue", Stats::new()).unwrap();
        let a = DeadlyPoison::register(&mut sim, first, &[boss], ProcMask::MELEE).unwrap();
        let b = DeadlyPoison::register(&mut sim, second, &[boss], ProcMask::MELEE).unwrap();
        let (dot_a, dot_b) = (a.dot(boss).unwrap(), b.dot(boss).unwrap());
        assert_ne!(dot_a, dot_b);
        sim.finalize().unwrap();
        sim.reset(3).unwrap();

        sim.pseudo_stats_mut(second).unwrap().damage_dealt_multiplier = 2.0;
        sim.add_dot_stack(dot_a).unwrap();
        sim.add_dot_stack(dot_b).unwrap();
        sim.add_dot_stack(dot_b).unwrap();

        let aura_a = sim.dot(dot_a).unwrap().aura();
        let aura_b = sim.dot(dot_b).unwrap().aura();
        assert_eq!((sim.stacks(aura_a), sim.stacks(aura_b)), (1, 2));
        assert_eq!(sim.dot_tick_damage(dot_a).unwrap(), 34.0);
        assert_eq!(sim.dot_tick_damage(dot_b).unwrap(), 68.0 * 2.0);
    }

    #[test]
    fn two_druids_rake_the_same_target() {
        let (mut sim, first, boss) = rogue_and_boss();
        let second = sim.add_unit("second druid", Stats::new()).unwrap();
        let a = Rake::register(&mut sim, first, boss).unwrap();
        let b = Rake::register(&mut sim, second, boss).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        a.cast(&mut sim, HitOutcome::Hit).unwrap();
        b.cast(&mut sim, HitOutcome::Hit).unwrap();
        assert!(sim.is_dot_active(a.dot) && sim.is_dot_active(b.dot));
    }

    #[test]
    fn wound_poison_stacks_per_target() {
        let (mut sim, rogue, boss) = rogue_and_boss();
        let add = sim.add_unit("add", Stats::new()).unwrap();
        let poison =
            WoundPoison::register(&mut sim, rogue, &[boss, add], ProcMask::MELEE).unwrap();
        sim.finalize().unwrap();
        sim.reset(2).unwrap();

        let swing = SpellHit::new(rogue, boss, "Melee", ProcMask::MELEE_MH_AUTO);
        for _ in 0..200 {
            sim.resolve_outcome(&swing).unwrap();
        }
        let debuff = poison.debuffs.get(boss).unwrap();
        assert_eq!(sim.stacks(debuff), WoundPoison::MAX_STACKS);
        assert_eq!(poison.healing_reduction(&sim, boss), 5.0 * 135.0);
        assert_eq!(poison.healing_reduction(&sim, add), 0.0);

        sim.run_until(SimTime::from_duration(Duration::from_secs(15))).unwrap();
        assert_eq!(poison.healing_reduction(&sim, boss), 0.0);
    }

    #[test]
    fn rake_applies_only_when_it_lands() {
        let (mut sim, druid, boss) = rogue_and_boss();
        let rake = Rake::register(&mut sim, druid, boss).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        rake.cast(&mut sim, HitOutcome::Dodge).unwrap();
        assert!(!sim.is_dot_active(rake.dot));
        assert_eq!(sim.unit(boss).unwrap().metrics().damage_taken, 0.0);

        rake.cast(&mut sim, HitOutcome::Hit).unwrap();
        sim.run_until(SimTime::from_duration(Duration::from_secs(9))).unwrap();
        assert_eq!(sim.dot(rake.dot).unwrap().total_damage(), 3.0 * 32.0);
        assert_eq!(sim.unit(boss).unwrap().metrics().damage_taken, 58.0 + 96.0);
    }

    #[test]
    fn rake_recast_resnapshots_and_restarts_ticks() {
        let (mut sim, druid, boss) = rogue_and_boss();
        let rake = Rake::register(&mut sim, druid, boss).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        rake.cast(&mut sim, HitOutcome::Hit).unwrap();
        sim.run_until(SimTime::from_duration(Duration::from_secs(4))).unwrap();
        assert_eq!(sim.dot(rake.dot).unwrap().ticks_fired(), 1);

        sim.pseudo_stats_mut(druid).unwrap().damage_dealt_multiplier = 1.2;
        rake.cast(&mut sim, HitOutcome::Crit).unwrap();
        assert_eq!(sim.dot(rake.dot).unwrap().ticks_fired(), 0);
        assert!((sim.dot_tick_damage(rake.dot).unwrap() - 32.0 * 1.2).abs() < 1e-9);
    }
}
