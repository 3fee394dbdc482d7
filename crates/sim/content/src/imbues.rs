//! Weapon imbues: permanent auras that proc on the wielder's hits.

use std::rc::Rc;
use std::time::Duration;

use sim_core::{
    AuraCallbacks, AuraConfig, AuraId, ProcConfig, ProcEffect, ProcMask, SimResult, Simulation,
    SpellHit, SpellSchool, Stat, Stats, UnitId,
};

/// Final damage of a proc hit from `caster` on `target`.
pub(crate) fn proc_damage(
    sim: &Simulation,
    caster: UnitId,
    target: UnitId,
    base: f64,
    school: SpellSchool,
) -> SimResult<f64> {
    let dealt = sim.attacker_multiplier(caster, school)?;
    let taken = sim.pseudo_stats(target)?;
    Ok(base * dealt * taken.taken_multiplier(school) + taken.bonus_damage_taken)
}

/// Windfury Weapon: main-hand hits have a chance to grant a short attack
/// power bonus, at most once per internal cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindfuryWeapon {
    pub proc_aura: AuraId,
    pub buff_aura: AuraId,
}

impl WindfuryWeapon {
    /// Proc label; also names the RNG stream.
    pub const LABEL: &'static str = "Windfury Weapon";
    pub const PROC_CHANCE: f64 = 0.2;
    /// Internal cooldown, also the lifetime of the attack power bonus.
    pub const ICD: Duration = Duration::from_millis(1_500);
    pub const BONUS_ATTACK_POWER: f64 = 315.0;

    /// Register the imbue on `unit`'s main hand.
    pub fn register(sim: &mut Simulation, unit: UnitId) -> SimResult<Self> {
        let bonus = Stats::new().with(Stat::AttackPower, Self::BONUS_ATTACK_POWER);
        let buff_aura = sim.register_aura(
            unit,
            AuraConfig::new("Windfury Attack", Self::ICD).with_hooks(
                AuraCallbacks::new()
                    .with_gain(move |sim, _| sim.add_stats(unit, &bonus))
                    .with_expire(move |sim, _| sim.add_stats(unit, &-bonus)),
            ),
        )?;
        let proc_aura = sim.register_proc(
            unit,
            ProcConfig::new(
                Self::LABEL,
                ProcMask::MELEE_MH,
                Self::PROC_CHANCE,
                ProcEffect::ActivateAura(buff_aura),
            )
            .with_icd(Self::ICD),
        )?;
        Ok(Self {
            proc_aura,
            buff_aura,
        })
    }
}

/// Instant Poison: hits have a chance to deal immediate nature damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstantPoison {
    pub proc_aura: AuraId,
}

impl InstantPoison {
    /// Proc label; also names the RNG stream for the proc roll.
    pub const LABEL: &'static str = "Instant Poison";
    /// RNG stream for the damage roll.
    pub const DAMAGE_LABEL: &'static str = "Instant Poison Damage";
    pub const PROC_CHANCE: f64 = 0.2;
    /// Base damage is rolled uniformly in `[MIN_DAMAGE, MAX_DAMAGE)`.
    pub const MIN_DAMAGE: f64 = 112.0;
    pub const MAX_DAMAGE: f64 = 148.0;

    /// Register on `unit`, proccing from hits matching `proc_mask`.
    pub fn register(sim: &mut Simulation, unit: UnitId, proc_mask: ProcMask) -> SimResult<Self> {
        let effect = ProcEffect::Custom(Rc::new(move |sim: &mut Simulation, _: AuraId, hit: &SpellHit| {
            let base = sim.roll_uniform(Self::DAMAGE_LABEL, Self::MIN_DAMAGE, Self::MAX_DAMAGE)?;
            let amount = proc_damage(sim, unit, hit.target, base, SpellSchool::Nature)?;
            let poison = SpellHit::new(unit, hit.target, Self::LABEL, ProcMask::SPELL_DAMAGE_PROC)
                .with_school(SpellSchool::Nature)
                .with_damage(amount);
            sim.resolve_outcome(&poison)
        }));
        let proc_aura = sim.register_proc(
            unit,
            ProcConfig::new(Self::LABEL, proc_mask, Self::PROC_CHANCE, effect),
        )?;
        Ok(Self { proc_aura })
    }
}
