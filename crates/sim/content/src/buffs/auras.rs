use std::rc::Rc;
use std::time::Duration;

use sim_core::{
    AuraCallbacks, AuraConfig, AuraId, DependencyId, PeriodicConfig, ProcConfig, ProcEffect,
    ProcMask, SimResult, SimTime, Simulation, SpellHit, SpellSchool, Stat, StatDependency, Stats,
    UnitId,
};
use strum::IntoEnumIterator;

use super::{BuffName, floor};
use crate::imbues::proc_damage;

/// Tag shared by every Power Infusion aura, whoever cast it.
pub const POWER_INFUSION_TAG: &str = "PowerInfusion";
pub const POWER_INFUSION_DURATION: Duration = Duration::from_secs(15);
pub const POWER_INFUSION_COOLDOWN: Duration = Duration::from_secs(180);

pub const INSPIRATION_DURATION: Duration = Duration::from_secs(15);
/// How often the fixed-uptime approximation rolls for Inspiration.
pub const INSPIRATION_TICK: Duration = Duration::from_millis(2_500);

/// +10% to every attribute.
///
/// Counted by build-phase stat measurement. Before finalize the dependencies
/// go through the build-phase path; during combat they are dynamic.
pub fn blessing_of_kings(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    let mut deps = Vec::with_capacity(Stat::ATTRIBUTES.len());
    for stat in Stat::ATTRIBUTES {
        deps.push(sim.register_dependency(unit, StatDependency::multiply(stat, 1.10))?);
    }
    let deps = Rc::new(deps);
    let enable = deps.clone();

    sim.register_aura(
        unit,
        AuraConfig::permanent("Blessing of Kings")
            .in_build_phase()
            .with_hooks(
                AuraCallbacks::new()
                    .with_gain(move |sim, _| set_dependencies(sim, unit, &enable, true))
                    .with_expire(move |sim, _| set_dependencies(sim, unit, &deps, false)),
            ),
    )
}

/// Enable `deps` in order or disable them in reverse, choosing the
/// build-phase or dynamic path by the simulation's phase.
fn set_dependencies(
    sim: &mut Simulation,
    unit: UnitId,
    deps: &[DependencyId],
    enable: bool,
) -> SimResult<()> {
    let build_phase = !sim.is_finalized();
    if enable {
        for dep in deps {
            if build_phase {
                sim.enable_build_phase_dependency(unit, *dep)?;
            } else {
                sim.enable_dependency(unit, *dep)?;
            }
        }
    } else {
        for dep in deps.iter().rev() {
            if build_phase {
                sim.disable_build_phase_dependency(unit, *dep)?;
            } else {
                sim.disable_dependency(unit, *dep)?;
            }
        }
    }
    Ok(())
}

/// +10% holy damage dealt.
pub fn sanctity_aura(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    sim.get_or_register_aura(
        unit,
        AuraConfig::permanent("Sanctity Aura").with_hooks(
            AuraCallbacks::new()
                .with_gain(move |sim, _| {
                    sim.pseudo_stats_mut(unit)?.school_damage_dealt_multiplier
                        [SpellSchool::Holy] *= 1.1;
                    Ok(())
                })
                .with_expire(move |sim, _| {
                    sim.pseudo_stats_mut(unit)?.school_damage_dealt_multiplier
                        [SpellSchool::Holy] /= 1.1;
                    Ok(())
                }),
        ),
    )
}

/// Flat bonus armor, scaled by Improved Devotion Aura `points`.
pub fn devotion_aura(sim: &mut Simulation, unit: UnitId, points: u32) -> SimResult<AuraId> {
    let bonus = BuffName::DevotionAura
        .stats()
        .scaled(1.0 + 0.125 * f64::from(points));
    sim.register_aura(unit, flat_stat_aura("Devotion Aura", unit, bonus))
}

/// Flat strength. The totem is assumed to be kept up for the whole fight.
pub fn strength_of_earth_totem(
    sim: &mut Simulation,
    unit: UnitId,
    multiplier: f64,
) -> SimResult<AuraId> {
    let bonus = floor(BuffName::StrengthOfEarth.stats().scaled(multiplier));
    sim.get_or_register_aura(
        unit,
        flat_stat_aura("Strength of Earth Totem", unit, bonus).in_build_phase(),
    )
}

/// Flat agility, kept up for the whole fight like Strength of Earth.
pub fn grace_of_air_totem(
    sim: &mut Simulation,
    unit: UnitId,
    multiplier: f64,
) -> SimResult<AuraId> {
    let bonus = floor(BuffName::GraceOfAir.stats().scaled(multiplier));
    sim.get_or_register_aura(
        unit,
        flat_stat_aura("Grace of Air Totem", unit, bonus).in_build_phase(),
    )
}

/// Flat attack power, scaled by Improved Battle Shout `improved_points`.
pub fn battle_shout(sim: &mut Simulation, unit: UnitId, improved_points: u32) -> SimResult<AuraId> {
    let base = BuffName::BattleShout.stats()[Stat::AttackPower];
    let bonus = Stats::new().with(
        Stat::AttackPower,
        (base * (1.0 + 0.05 * f64::from(improved_points))).floor(),
    );
    sim.get_or_register_aura(
        unit,
        flat_stat_aura("Battle Shout", unit, bonus).in_build_phase(),
    )
}

/// Physical damage taken reduced by 10% while up, approximated at a fixed
/// `uptime` share of the fight.
pub fn inspiration(sim: &mut Simulation, unit: UnitId, uptime: f64) -> SimResult<AuraId> {
    const FACTOR: f64 = 0.9;
    let aura = sim.get_or_register_aura(
        unit,
        AuraConfig::new("Inspiration", INSPIRATION_DURATION).with_hooks(
            AuraCallbacks::new()
                .with_gain(move |sim, _| {
                    sim.pseudo_stats_mut(unit)?.school_damage_taken_multiplier
                        [SpellSchool::Physical] *= FACTOR;
                    Ok(())
                })
                .with_expire(move |sim, _| {
                    sim.pseudo_stats_mut(unit)?.school_damage_taken_multiplier
                        [SpellSchool::Physical] /= FACTOR;
                    Ok(())
                }),
        ),
    )?;
    sim.apply_fixed_uptime_aura(aura, uptime.min(1.0), INSPIRATION_TICK, SimTime::ZERO)?;
    Ok(aura)
}

/// 5% melee speed per stack, up to five stacks.
pub fn battle_squawk(sim: &mut Simulation, unit: UnitId, stacks: u32) -> SimResult<AuraId> {
    sim.get_or_register_aura(
        unit,
        AuraConfig::new("Battle Squawk", Duration::from_secs(240))
            .with_max_stacks(5)
            .activate_on_reset()
            .with_hooks(
                AuraCallbacks::new()
                    .with_gain(move |sim, aura| sim.set_stacks(aura, stacks))
                    .with_stacks_change(move |sim, _, old, new| {
                        let delta = f64::from(new) - f64::from(old);
                        sim.pseudo_stats_mut(unit)?.melee_speed_multiplier *= 1.05_f64.powf(delta);
                        Ok(())
                    }),
            ),
    )
}

/// Deals holy damage back to melee attackers.
pub fn retribution_aura(sim: &mut Simulation, unit: UnitId, points: u32) -> SimResult<AuraId> {
    let damage = 20.0 * (1.0 + 0.25 * f64::from(points));
    reactive_damage_aura(sim, unit, "Retribution Aura", damage, SpellSchool::Holy)
}

/// Deals nature damage back to melee attackers.
pub fn thorns(sim: &mut Simulation, unit: UnitId, points: u32) -> SimResult<AuraId> {
    let damage = 18.0 * (1.0 + 0.25 * f64::from(points));
    reactive_damage_aura(sim, unit, "Thorns", damage, SpellSchool::Nature)
}

/// +20% damage for every magic school.
pub fn power_infusion_aura(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    let multiply = move |sim: &mut Simulation, factor: f64| -> SimResult<()> {
        let pseudo = sim.pseudo_stats_mut(unit)?;
        for school in SpellSchool::iter().filter(|school| *school != SpellSchool::Physical) {
            pseudo.school_damage_dealt_multiplier[school] *= factor;
        }
        Ok(())
    };

    sim.get_or_register_aura(
        unit,
        AuraConfig::new("Power Infusion", POWER_INFUSION_DURATION)
            .with_tag(POWER_INFUSION_TAG)
            .with_hooks(
                AuraCallbacks::new()
                    .with_gain(move |sim, _| multiply(sim, 1.2))
                    .with_expire(move |sim, _| multiply(sim, 1.0 / 1.2)),
            ),
    )
}

/// Power Infusion cast on `unit` by `sources` priests, one after another,
/// each on cooldown.
pub fn power_infusion(sim: &mut Simulation, unit: UnitId, sources: u32) -> SimResult<AuraId> {
    let aura = power_infusion_aura(sim, unit)?;
    sim.register_reset_effect(move |sim| {
        for source in 0..sources {
            let first = SimTime::from_duration(POWER_INFUSION_DURATION.saturating_mul(source));
            sim.start_periodic(
                PeriodicConfig::new(POWER_INFUSION_COOLDOWN, move |sim, _| {
                    sim.activate_aura(aura)
                })
                .starting_at(first),
            )?;
        }
        Ok(())
    });
    Ok(aura)
}

/// Permanent aura adding `bonus` while active.
///
/// [`Simulation::add_stats`] is silent before finalize, so the same hooks
/// serve build-phase measurement and combat.
fn flat_stat_aura(label: &str, unit: UnitId, bonus: Stats) -> AuraConfig {
    AuraConfig::permanent(label).with_hooks(
        AuraCallbacks::new()
            .with_gain(move |sim, _| sim.add_stats(unit, &bonus))
            .with_expire(move |sim, _| sim.add_stats(unit, &-bonus)),
    )
}

fn reactive_damage_aura(
    sim: &mut Simulation,
    unit: UnitId,
    label: &'static str,
    damage: f64,
    school: SpellSchool,
) -> SimResult<AuraId> {
    sim.register_proc(
        unit,
        ProcConfig::new(
            label,
            ProcMask::MELEE,
            1.0,
            ProcEffect::Custom(Rc::new(move |sim: &mut Simulation, _: AuraId, hit: &SpellHit| {
                let amount = proc_damage(sim, unit, hit.caster, damage, school)?;
                let reply = SpellHit::new(unit, hit.caster, label, ProcMask::empty())
                    .with_school(school)
                    .with_damage(amount);
                sim.resolve_outcome(&reply)
            })),
        )
        .on_taken(),
    )
}
