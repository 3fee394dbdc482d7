//! Stat changes routed through the simulation so listeners see every
//! dynamic change.

use std::rc::Rc;

use tracing::trace;

use super::Simulation;
use crate::error::{KernelError, SimResult};
use crate::stats::{DependencyId, PseudoStats, Stat, StatDependency, StatGraph, Stats};
use crate::unit::{StatListener, UnitId};

impl Simulation {
    /// Register a dependency edge on `unit`. It starts disabled.
    pub fn register_dependency(
        &mut self,
        unit: UnitId,
        dependency: StatDependency,
    ) -> SimResult<DependencyId> {
        let id = self.unit_mut(unit)?.stats.register(dependency)?;
        trace!(unit = %unit, dependency = %id, target = %dependency.target, "dependency registered");
        Ok(id)
    }

    /// Enable a dependency during combat, notifying stat listeners.
    pub fn enable_dependency(&mut self, unit: UnitId, id: DependencyId) -> SimResult<()> {
        self.change_stats(unit, |graph| graph.enable(id))
    }

    pub fn disable_dependency(&mut self, unit: UnitId, id: DependencyId) -> SimResult<()> {
        self.change_stats(unit, |graph| graph.disable(id))
    }

    /// Enable a dependency as part of the unit's starting state.
    ///
    /// Never reversed and never notified; the change is captured by
    /// [`Simulation::finalize`].
    pub fn enable_build_phase_dependency(
        &mut self,
        unit: UnitId,
        id: DependencyId,
    ) -> SimResult<()> {
        self.require_build_phase()?;
        self.unit_mut(unit)?.stats.enable(id)
    }

    pub fn disable_build_phase_dependency(
        &mut self,
        unit: UnitId,
        id: DependencyId,
    ) -> SimResult<()> {
        self.require_build_phase()?;
        self.unit_mut(unit)?.stats.disable(id)
    }

    /// Add `delta` to the unit's base stats.
    ///
    /// In the build phase this only shapes the starting state. Afterwards the
    /// change is a combat change and listeners receive the derived delta.
    pub fn add_stats(&mut self, unit: UnitId, delta: &Stats) -> SimResult<()> {
        let delta = *delta;
        self.change_stats(unit, move |graph| {
            graph.add_base(&delta);
            Ok(())
        })
    }

    pub fn stats(&self, unit: UnitId) -> SimResult<&Stats> {
        Ok(self.unit(unit)?.stats())
    }

    pub fn stat(&self, unit: UnitId, stat: Stat) -> SimResult<f64> {
        Ok(self.unit(unit)?.stats()[stat])
    }

    /// Listen for combat changes to `unit`'s derived stats.
    pub fn on_stats_change(
        &mut self,
        unit: UnitId,
        listener: impl Fn(&mut Simulation, UnitId, &Stats) -> SimResult<()> + 'static,
    ) -> SimResult<()> {
        let listener: StatListener = Rc::new(listener);
        self.unit_mut(unit)?.listeners.push(listener);
        Ok(())
    }

    pub fn pseudo_stats(&self, unit: UnitId) -> SimResult<&PseudoStats> {
        Ok(self.unit(unit)?.pseudo_stats())
    }

    /// Mutable pseudo-stats. Hooks that change them must undo the change
    /// themselves on expiry.
    pub fn pseudo_stats_mut(&mut self, unit: UnitId) -> SimResult<&mut PseudoStats> {
        Ok(&mut self.unit_mut(unit)?.pseudo)
    }

    fn require_build_phase(&self) -> SimResult<()> {
        if self.finalized {
            return Err(KernelError::AlreadyFinalized);
        }
        Ok(())
    }

    fn change_stats(
        &mut self,
        unit: UnitId,
        change: impl FnOnce(&mut StatGraph) -> SimResult<()>,
    ) -> SimResult<()> {
        let finalized = self.finalized;
        let target = self.unit_mut(unit)?;
        let before = *target.stats.derived();
        change(&mut target.stats)?;
        if !finalized {
            return Ok(());
        }

        let delta = *target.stats.derived() - before;
        if delta.is_zero() {
            return Ok(());
        }
        let listeners = target.listeners.clone();
        for listener in listeners {
            listener(self, unit, &delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::SimConfig;

    fn warrior() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(SimConfig::new());
        let unit = sim
            .add_unit(
                "warrior",
                Stats::from_pairs([(Stat::Strength, 100.0), (Stat::AttackPower, 200.0)]),
            )
            .unwrap();
        (sim, unit)
    }

    #[test]
    fn build_phase_changes_are_silent_and_kept_across_resets() {
        let (mut sim, unit) = warrior();
        let notified = Rc::new(RefCell::new(0));
        let sink = notified.clone();
        sim.on_stats_change(unit, move |_, _, _| {
            *sink.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

        let kings = sim
            .register_dependency(unit, StatDependency::multiply(Stat::Strength, 1.1))
            .unwrap();
        sim.enable_build_phase_dependency(unit, kings).unwrap();
        sim.add_stats(unit, &Stats::new().with(Stat::AttackPower, 50.0))
            .unwrap();
        assert_eq!(*notified.borrow(), 0);

        sim.finalize().unwrap();
        sim.reset(1).unwrap();
        assert!((sim.stat(unit, Stat::Strength).unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(sim.stat(unit, Stat::AttackPower).unwrap(), 250.0);
        assert_eq!(
            sim.enable_build_phase_dependency(unit, kings),
            Err(KernelError::AlreadyFinalized)
        );
    }

    #[test]
    fn listeners_receive_the_derived_delta() {
        let (mut sim, unit) = warrior();
        let conversion = sim
            .register_dependency(unit, StatDependency::convert(Stat::Strength, Stat::AttackPower, 2.0))
            .unwrap();
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let sink = deltas.clone();
        sim.on_stats_change(unit, move |_, _, delta| {
            sink.borrow_mut().push(*delta);
            Ok(())
        })
        .unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        sim.enable_dependency(unit, conversion).unwrap();
        sim.add_stats(unit, &Stats::new().with(Stat::Strength, 10.0))
            .unwrap();

        let deltas = deltas.borrow();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0][Stat::AttackPower], 200.0);
        assert_eq!(deltas[1][Stat::Strength], 10.0);
        assert_eq!(deltas[1][Stat::AttackPower], 20.0);
    }

    #[test]
    fn combat_changes_are_undone_by_reset() {
        let (mut sim, unit) = warrior();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();
        let start = *sim.stats(unit).unwrap();

        sim.add_stats(unit, &Stats::new().with(Stat::AttackPower, 300.0))
            .unwrap();
        sim.pseudo_stats_mut(unit).unwrap().damage_dealt_multiplier = 1.3;

        sim.reset(2).unwrap();
        assert_eq!(*sim.stats(unit).unwrap(), start);
        assert_eq!(sim.pseudo_stats(unit).unwrap().damage_dealt_multiplier, 1.0);
    }

    #[test]
    fn listener_errors_propagate() {
        let (mut sim, unit) = warrior();
        sim.on_stats_change(unit, |_, unit, _| Err(KernelError::UnknownUnit(unit)))
            .unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        assert_eq!(
            sim.add_stats(unit, &Stats::new().with(Stat::Agility, 1.0)),
            Err(KernelError::UnknownUnit(unit))
        );
    }
}
