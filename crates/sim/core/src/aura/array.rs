use super::AuraId;
use crate::error::SimResult;
use crate::sim::Simulation;
use crate::unit::UnitId;

/// One aura per target unit, e.g. a debuff a single caster places on each enemy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuraArray {
    auras: Vec<Option<AuraId>>,
}

impl AuraArray {
    /// Run `make` for every target and index the resulting auras by unit.
    pub fn new(
        sim: &mut Simulation,
        targets: &[UnitId],
        mut make: impl FnMut(&mut Simulation, UnitId) -> SimResult<AuraId>,
    ) -> SimResult<Self> {
        let mut array = Self::default();
        for &target in targets {
            let aura = make(sim, target)?;
            let slot = target.0 as usize;
            if array.auras.len() <= slot {
                array.auras.resize(slot + 1, None);
            }
            array.auras[slot] = Some(aura);
        }
        Ok(array)
    }

    pub fn get(&self, target: UnitId) -> Option<AuraId> {
        self.auras.get(target.0 as usize).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = AuraId> + '_ {
        self.auras.iter().flatten().copied()
    }

    pub fn any_active(&self, sim: &Simulation) -> bool {
        self.iter().any(|aura| sim.is_active(aura))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aura::AuraConfig;
    use crate::config::SimConfig;
    use crate::stats::Stats;
    use crate::time::AuraDuration;

    #[test]
    fn indexes_auras_by_target() {
        let mut sim = Simulation::new(SimConfig::new());
        let _rogue = sim.add_unit("rogue", Stats::new()).unwrap();
        let boss = sim.add_unit("boss", Stats::new()).unwrap();
        let add = sim.add_unit("add", Stats::new()).unwrap();

        let array = AuraArray::new(&mut sim, &[boss, add], |sim, target| {
            sim.register_aura(target, AuraConfig::new("Wound Poison", AuraDuration::secs(15)))
        })
        .unwrap();

        let on_boss = array.get(boss).unwrap();
        assert_eq!(sim.aura(on_boss).unwrap().unit(), boss);
        assert!(array.get(UnitId(0)).is_none());
        assert!(!array.any_active(&sim));

        sim.activate_aura(on_boss).unwrap();
        assert!(array.any_active(&sim));
    }
}
