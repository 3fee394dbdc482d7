//! Phase transitions and trial execution.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use super::{PostFinalizeEffect, ResetEffect, Simulation};
use crate::aura::AuraId;
use crate::error::{KernelError, SimResult};
use crate::stats::Stats;
use crate::time::SimTime;
use crate::unit::UnitId;

/// Per-unit results of one trial.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitSummary {
    pub unit: UnitId,
    pub label: String,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub hits_dealt: u64,
    pub mana_restored: f64,
    pub final_stats: Stats,
}

/// Per-aura results of one trial.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraSummary {
    pub aura: AuraId,
    pub unit: UnitId,
    pub label: String,
    pub activations: u64,
    pub refreshes: u64,
    pub procs: u64,
    pub uptime: Duration,
}

/// Everything observable about a finished trial.
///
/// Two trials run with the same seed on the same simulation produce equal
/// summaries.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialSummary {
    pub seed: u64,
    pub duration: Duration,
    pub units: Vec<UnitSummary>,
    pub auras: Vec<AuraSummary>,
    pub rng_draws: BTreeMap<String, u64>,
}

impl TrialSummary {
    pub fn unit(&self, unit: UnitId) -> Option<&UnitSummary> {
        self.units.iter().find(|summary| summary.unit == unit)
    }

    pub fn aura(&self, aura: AuraId) -> Option<&AuraSummary> {
        self.auras.iter().find(|summary| summary.aura == aura)
    }

    pub fn aura_uptime(&self, aura: AuraId) -> Option<Duration> {
        self.aura(aura).map(|summary| summary.uptime)
    }

    pub fn damage_dealt(&self, unit: UnitId) -> f64 {
        self.unit(unit).map_or(0.0, |summary| summary.damage_dealt)
    }

    pub fn total_damage(&self) -> f64 {
        self.units.iter().map(|summary| summary.damage_dealt).sum()
    }
}

impl Simulation {
    /// Run `effect` at the start of every trial, after auras are reset and
    /// before `on_reset` hooks.
    pub fn register_reset_effect(
        &mut self,
        effect: impl Fn(&mut Simulation) -> SimResult<()> + 'static,
    ) {
        let effect: ResetEffect = Rc::new(effect);
        self.reset_effects.push(effect);
    }

    /// Run `effect` once inside [`Simulation::finalize`], after `on_init`
    /// hooks and before the starting state is captured.
    pub fn register_post_finalize_effect(
        &mut self,
        effect: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }
        let effect: PostFinalizeEffect = Box::new(effect);
        self.post_finalize.push(effect);
        Ok(())
    }

    /// Close the build phase.
    ///
    /// Runs every aura's `on_init` hook and the post-finalize effects, then
    /// deactivates any aura still active from the build phase and captures
    /// each unit's base stats, enabled dependencies and pseudo-stats as the
    /// state every trial starts from. Auras only shape that state through
    /// their per-trial activation.
    pub fn finalize(&mut self) -> SimResult<()> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }

        // Hooks may register further auras; those are initialised too.
        let mut index = 0;
        while index < self.auras.len() {
            let hooks = self.auras[index].hooks.clone();
            hooks.on_init(self, AuraId(index as u32))?;
            index += 1;
        }

        let effects = std::mem::take(&mut self.post_finalize);
        for effect in effects {
            effect(self)?;
        }

        let mut leftover = 0;
        for index in 0..self.auras.len() {
            let id = AuraId(index as u32);
            if self.is_active(id) {
                self.deactivate_aura(id)?;
                leftover += 1;
            }
        }
        if leftover > 0 {
            debug!(auras = leftover, "build phase auras deactivated before finalize");
        }

        for unit in &mut self.units {
            unit.capture_initial();
        }
        self.finalized = true;
        debug!(
            units = self.units.len(),
            auras = self.auras.len(),
            "simulation finalized"
        );
        Ok(())
    }

    /// `unit`'s stats with every build-phase aura applied, as a character
    /// sheet would show them.
    ///
    /// Only valid before [`Simulation::finalize`]. Auras this activates are
    /// deactivated again before returning, so the starting state is unchanged.
    pub fn measure_build_phase_stats(&mut self, unit: UnitId) -> SimResult<Stats> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }

        let candidates: Vec<AuraId> = self
            .unit(unit)?
            .auras
            .iter()
            .copied()
            .filter(|id| {
                self.aura(*id)
                    .is_ok_and(|aura| aura.build_phase && !aura.active)
            })
            .collect();

        for id in &candidates {
            self.activate_aura(*id)?;
        }
        let measured = *self.stats(unit)?;
        for id in candidates.iter().rev() {
            self.deactivate_aura(*id)?;
        }

        debug!(unit = %unit, auras = candidates.len(), "build phase stats measured");
        Ok(measured)
    }

    /// Start a new trial at time zero.
    ///
    /// RNG streams are derived from the configured master seed together with
    /// `seed`, so one simulation replays a trial exactly for the same `seed`.
    pub fn reset(&mut self, seed: u64) -> SimResult<()> {
        if !self.finalized {
            return Err(KernelError::NotFinalized);
        }

        self.clock.reset();
        self.rng.reseed(seed);
        for timer in &mut self.timers {
            timer.reset();
        }
        self.periodics.reset();
        for unit in &mut self.units {
            unit.restore_initial();
        }
        for aura in &mut self.auras {
            aura.reset();
        }
        self.reset_exclusive_effects();
        self.reset_dots();

        let effects = self.reset_effects.clone();
        for effect in effects {
            effect(self)?;
        }

        for index in 0..self.auras.len() {
            let hooks = self.auras[index].hooks.clone();
            hooks.on_reset(self, AuraId(index as u32))?;
        }
        for index in 0..self.auras.len() {
            let id = AuraId(index as u32);
            if self.auras[index].activate_on_reset && !self.is_active(id) {
                self.activate_aura(id)?;
            }
        }

        debug!(seed, "trial reset");
        Ok(())
    }

    /// Reset, run to the encounter duration, close every active aura and
    /// summarise the trial.
    pub fn run_trial(&mut self, seed: u64) -> SimResult<TrialSummary> {
        self.reset(seed)?;
        let end = SimTime::ZERO + self.config.encounter_duration;
        self.run_until(end)?;

        for index in 0..self.auras.len() {
            let id = AuraId(index as u32);
            if self.is_active(id) {
                self.deactivate_aura(id)?;
            }
        }

        self.trials_run += 1;
        let summary = self.summarize(seed);
        debug!(
            seed,
            total_damage = summary.total_damage(),
            "trial finished"
        );
        Ok(summary)
    }

    fn summarize(&self, seed: u64) -> TrialSummary {
        let now = self.now();
        TrialSummary {
            seed,
            duration: self.config.encounter_duration,
            units: self
                .units
                .iter()
                .map(|unit| UnitSummary {
                    unit: unit.id,
                    label: unit.label.clone(),
                    damage_dealt: unit.metrics.damage_dealt,
                    damage_taken: unit.metrics.damage_taken,
                    hits_dealt: unit.metrics.hits_dealt,
                    mana_restored: unit.metrics.mana_restored,
                    final_stats: *unit.stats(),
                })
                .collect(),
            auras: self
                .auras
                .iter()
                .map(|aura| AuraSummary {
                    aura: aura.id,
                    unit: aura.unit,
                    label: aura.label.clone(),
                    activations: aura.metrics.activations,
                    refreshes: aura.metrics.refreshes,
                    procs: aura.metrics.procs,
                    uptime: aura.uptime_at(now),
                })
                .collect(),
            rng_draws: self.rng.draw_counts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::aura::{AuraCallbacks, AuraConfig};
    use crate::clock::EventPriority;
    use crate::config::SimConfig;
    use crate::periodic::PeriodicConfig;
    use crate::stats::{Stat, StatDependency};
    use crate::time::AuraDuration;

    fn config() -> SimConfig {
        SimConfig::new().with_encounter_duration(Duration::from_secs(60))
    }

    /// A unit that swings every 2s and deals a random amount.
    fn swinging_sim() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(config());
        let unit = sim
            .add_unit("rogue", Stats::new().with(Stat::AttackPower, 1_200.0))
            .unwrap();
        let target = sim.add_unit("target", Stats::new()).unwrap();
        sim.register_reset_effect(move |sim| {
            sim.start_periodic(PeriodicConfig::new(Duration::from_secs(2), move |sim, _| {
                let amount = sim.roll_uniform("Swing Damage", 100.0, 200.0)?;
                sim.deal_damage(unit, target, amount, Default::default())
            }))
            .map(|_| ())
        });
        sim.finalize().unwrap();
        (sim, unit)
    }

    #[test]
    fn reset_requires_finalize() {
        let mut sim = Simulation::new(config());
        assert_eq!(sim.reset(1), Err(KernelError::NotFinalized));
        sim.finalize().unwrap();
        assert_eq!(sim.finalize(), Err(KernelError::AlreadyFinalized));
    }

    #[test]
    fn same_seed_reproduces_identical_summaries() {
        let (mut sim, unit) = swinging_sim();
        let first = sim.run_trial(42).unwrap();
        let other = sim.run_trial(7).unwrap();
        let again = sim.run_trial(42).unwrap();

        assert_eq!(first, again);
        assert_ne!(first.damage_dealt(unit), other.damage_dealt(unit));
        assert_eq!(first.rng_draws.get("Swing Damage"), Some(&30));
        assert_eq!(sim.trials_run(), 3);
    }

    #[test]
    fn permanent_auras_reactivate_each_trial() {
        let mut sim = Simulation::new(config());
        let unit = sim.add_unit("paladin", Stats::new()).unwrap();
        let resets = Rc::new(Cell::new(0));
        let counter = resets.clone();
        let aura = sim
            .register_aura(
                unit,
                AuraConfig::permanent("Devotion Aura").with_hooks(
                    AuraCallbacks::new().with_reset(move |_, _| {
                        counter.set(counter.get() + 1);
                        Ok(())
                    }),
                ),
            )
            .unwrap();
        sim.finalize().unwrap();

        for seed in 0..3 {
            sim.reset(seed).unwrap();
            assert!(sim.is_active(aura));
            sim.deactivate_aura(aura).unwrap();
        }
        assert_eq!(resets.get(), 3);

        let summary = sim.run_trial(9).unwrap();
        assert_eq!(summary.aura_uptime(aura), Some(Duration::from_secs(60)));
        assert!(!sim.is_active(aura));
    }

    #[test]
    fn init_runs_once_and_post_finalize_shapes_the_start() {
        let mut sim = Simulation::new(config());
        let unit = sim.add_unit("hunter", Stats::new()).unwrap();
        let inits = Rc::new(Cell::new(0));
        let counter = inits.clone();
        sim.register_aura(
            unit,
            AuraConfig::new("Aspect", AuraDuration::Never).with_hooks(AuraCallbacks::new().with_init(
                move |_, _| {
                    counter.set(counter.get() + 1);
                    Ok(())
                },
            )),
        )
        .unwrap();
        sim.register_post_finalize_effect(move |sim| {
            sim.add_stats(unit, &Stats::new().with(Stat::RangedAttackPower, 100.0))
        })
        .unwrap();

        sim.finalize().unwrap();
        sim.run_trial(1).unwrap();
        sim.run_trial(2).unwrap();

        assert_eq!(inits.get(), 1);
        assert_eq!(sim.stat(unit, Stat::RangedAttackPower).unwrap(), 100.0);
    }

    #[test]
    fn master_seed_shapes_every_trial() {
        let roll = |master: u64| {
            let mut sim = Simulation::new(config().with_seed(master));
            sim.finalize().unwrap();
            sim.reset(7).unwrap();
            sim.roll_float("Crusader").unwrap()
        };

        assert_ne!(roll(1), roll(999_999));
        assert_eq!(roll(1), roll(1));
    }

    /// +10% strength from an aura enabling a dependency while active.
    fn kings_like(sim: &mut Simulation, unit: UnitId) -> AuraId {
        let dep = sim
            .register_dependency(unit, StatDependency::multiply(Stat::Strength, 1.1))
            .unwrap();
        sim.register_aura(
            unit,
            AuraConfig::permanent("Blessing of Kings")
                .in_build_phase()
                .with_hooks(
                    AuraCallbacks::new()
                        .with_gain(move |sim, _| sim.enable_dependency(unit, dep))
                        .with_expire(move |sim, _| sim.disable_dependency(unit, dep)),
                ),
        )
        .unwrap()
    }

    #[test]
    fn auras_active_at_finalize_do_not_leak_into_the_start() {
        let mut sim = Simulation::new(config());
        let unit = sim
            .add_unit("warrior", Stats::new().with(Stat::Strength, 100.0))
            .unwrap();
        let kings = kings_like(&mut sim, unit);

        sim.activate_aura(kings).unwrap();
        assert!((sim.stat(unit, Stat::Strength).unwrap() - 110.0).abs() < 1e-9);
        sim.finalize().unwrap();
        assert!(!sim.is_active(kings));
        assert_eq!(sim.unit(unit).unwrap().base_stats()[Stat::Strength], 100.0);

        for seed in 0..2 {
            sim.reset(seed).unwrap();
            assert!(sim.is_active(kings));
            assert!((sim.stat(unit, Stat::Strength).unwrap() - 110.0).abs() < 1e-9);
        }
    }

    #[test]
    fn measuring_build_phase_stats_leaves_the_start_untouched() {
        let mut sim = Simulation::new(config());
        let unit = sim
            .add_unit("warrior", Stats::new().with(Stat::Strength, 100.0))
            .unwrap();
        let kings = kings_like(&mut sim, unit);
        sim.register_aura(unit, AuraConfig::permanent("Battle Stance"))
            .unwrap();

        let measured = sim.measure_build_phase_stats(unit).unwrap();
        assert!((measured[Stat::Strength] - 110.0).abs() < 1e-9);
        assert!(!sim.is_active(kings));
        assert_eq!(sim.stat(unit, Stat::Strength).unwrap(), 100.0);

        sim.finalize().unwrap();
        assert_eq!(
            sim.measure_build_phase_stats(unit),
            Err(KernelError::AlreadyFinalized)
        );
        sim.reset(1).unwrap();
        assert!((sim.stat(unit, Stat::Strength).unwrap() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn pending_events_do_not_leak_into_the_next_trial() {
        let mut sim = Simulation::new(config());
        sim.add_unit("mage", Stats::new()).unwrap();
        sim.finalize().unwrap();
        let fired = Rc::new(RefCell::new(Vec::new()));

        sim.reset(1).unwrap();
        let sink = fired.clone();
        sim.schedule_after(Duration::from_secs(30), EventPriority::Default, move |_| {
            sink.borrow_mut().push("stale");
            Ok(())
        })
        .unwrap();

        sim.reset(2).unwrap();
        sim.run_until(SimTime::from_millis(60_000)).unwrap();
        assert!(fired.borrow().is_empty());
    }
}
