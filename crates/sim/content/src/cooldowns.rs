//! Cooldowns other raid members spend on a unit.
//!
//! The casters are not simulated. Each one is a [`Cooldown`] on the target's
//! side, and the casts rotate through them: a source casts as soon as its own
//! cooldown is ready, the previous cast has run out, and no other aura with
//! the same tag is up.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use sim_core::{
    AuraCallbacks, AuraConfig, AuraDuration, AuraId, Cooldown, EventPriority, KernelError,
    PeriodicConfig, SimResult, SimTime, Simulation, TimerId, UnitId,
};
use tracing::trace;

pub const INNERVATE_TAG: &str = "Innervate";
pub const INNERVATE_DURATION: Duration = Duration::from_secs(20);
pub const INNERVATE_COOLDOWN: Duration = Duration::from_secs(360);
/// Added to the spirit regeneration multiplier while Innervate is up.
pub const INNERVATE_REGEN_BONUS: f64 = 4.0;

pub const MANA_TIDE_TAG: &str = "ManaTideTotem";
pub const MANA_TIDE_DURATION: Duration = Duration::from_secs(12);
pub const MANA_TIDE_COOLDOWN: Duration = Duration::from_secs(300);
pub const MANA_TIDE_TICKS: u32 = 4;
pub const MANA_TIDE_MANA_PER_TICK: f64 = 290.0;

/// How a cooldown cast by outside sources is rotated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCooldown {
    /// Casts wait while any aura with this tag is active on the target.
    pub tag: String,
    /// Minimum gap between two consecutive casts.
    pub aura_duration: Duration,
    /// Cooldown of each individual source.
    pub cooldown: Duration,
    /// No cast happens before this instant.
    pub first_use: SimTime,
}

struct Rotation {
    unit: UnitId,
    aura: AuraId,
    tag: String,
    aura_duration: Duration,
    sources: Vec<Cooldown>,
    shared: TimerId,
    next: Cell<usize>,
}

/// Cast `aura` on its owner from `sources` rotating casters every trial.
///
/// Timers are allocated here, so this must run before finalize.
pub fn register_external_cooldown(
    sim: &mut Simulation,
    aura: AuraId,
    config: &ExternalCooldown,
    sources: u32,
) -> SimResult<()> {
    if sim.is_finalized() {
        return Err(KernelError::AlreadyFinalized);
    }
    if sources == 0 {
        return Ok(());
    }

    let unit = sim.aura(aura)?.unit();
    let cooldowns = (0..sources).map(|_| sim.new_cooldown(config.cooldown)).collect();
    let rotation = Rc::new(Rotation {
        unit,
        aura,
        tag: config.tag.clone(),
        aura_duration: config.aura_duration,
        sources: cooldowns,
        shared: sim.new_timer(),
        next: Cell::new(0),
    });

    let first_use = config.first_use;
    sim.register_reset_effect(move |sim| {
        rotation.next.set(0);
        let rotation = rotation.clone();
        sim.schedule_at(first_use, EventPriority::Low, move |sim| attempt(sim, rotation))?;
        Ok(())
    });
    Ok(())
}

fn attempt(sim: &mut Simulation, rotation: Rc<Rotation>) -> SimResult<()> {
    let index = rotation.next.get();
    let source = rotation.sources[index];
    let now = sim.now();

    let mut wait = sim
        .cooldown_time_to_ready(&source)?
        .max(sim.timer(rotation.shared)?.time_to_ready(now));
    if wait.is_zero() {
        if let Some(busy) = sim
            .active_auras_with_tag(rotation.unit, &rotation.tag)
            .first()
            .copied()
        {
            match sim.remaining_duration(busy)? {
                AuraDuration::Finite(left) => wait = left,
                AuraDuration::Never => return Ok(()),
            }
        }
    }
    if !wait.is_zero() || sim.has_active_aura_with_tag(rotation.unit, &rotation.tag) {
        return retry_after(sim, rotation, wait);
    }

    sim.activate_aura(rotation.aura)?;
    sim.trigger_cooldown(&source)?;

    let next = (index + 1) % rotation.sources.len();
    rotation.next.set(next);
    let gap = sim
        .cooldown_time_to_ready(&rotation.sources[next])?
        .max(rotation.aura_duration);
    sim.set_timer(rotation.shared, now + gap)?;
    trace!(unit = %rotation.unit, aura = %rotation.aura, source = index, "external cooldown cast");

    retry_after(sim, rotation, gap)
}

fn retry_after(sim: &mut Simulation, rotation: Rc<Rotation>, delay: Duration) -> SimResult<()> {
    // Low priority so an aura expiring at the same instant is gone first.
    sim.schedule_after(delay, EventPriority::Low, move |sim| attempt(sim, rotation))?;
    Ok(())
}

/// Innervate from `sources` druids. Quintuples spirit-based regeneration.
///
/// There is no mana pool to watch, so the first cast lands halfway through
/// the encounter, where a caster would typically run low.
pub fn innervate(sim: &mut Simulation, unit: UnitId, sources: u32) -> SimResult<AuraId> {
    let aura = sim.get_or_register_aura(
        unit,
        AuraConfig::new("Innervate", INNERVATE_DURATION)
            .with_tag(INNERVATE_TAG)
            .with_hooks(
                AuraCallbacks::new()
                    .with_gain(move |sim, _| {
                        sim.pseudo_stats_mut(unit)?.spirit_regen_multiplier +=
                            INNERVATE_REGEN_BONUS;
                        Ok(())
                    })
                    .with_expire(move |sim, _| {
                        sim.pseudo_stats_mut(unit)?.spirit_regen_multiplier -=
                            INNERVATE_REGEN_BONUS;
                        Ok(())
                    }),
            ),
    )?;

    let first_use = SimTime::from_duration(sim.encounter_duration() / 2);
    register_external_cooldown(
        sim,
        aura,
        &ExternalCooldown {
            tag: INNERVATE_TAG.to_owned(),
            aura_duration: INNERVATE_DURATION,
            cooldown: INNERVATE_COOLDOWN,
            first_use,
        },
        sources,
    )?;
    Ok(aura)
}

/// Mana Tide Totem dropped for `unit`'s party by `sources` shamans.
///
/// Each drop restores mana to every unit in `party` four times, three
/// seconds apart. The first drop waits for a minute or half the encounter,
/// whichever is sooner.
pub fn mana_tide_totem(
    sim: &mut Simulation,
    unit: UnitId,
    party: &[UnitId],
    sources: u32,
) -> SimResult<AuraId> {
    let party: Rc<[UnitId]> = party.into();
    let period = MANA_TIDE_DURATION / MANA_TIDE_TICKS;
    let aura = sim.get_or_register_aura(
        unit,
        AuraConfig::new("Mana Tide Totem", MANA_TIDE_DURATION)
            .with_tag(MANA_TIDE_TAG)
            .with_hooks(AuraCallbacks::new().with_gain(move |sim, aura| {
                let party = party.clone();
                sim.start_periodic(
                    PeriodicConfig::new(period, move |sim, _| {
                        for member in party.iter() {
                            sim.restore_mana(unit, *member, MANA_TIDE_MANA_PER_TICK)?;
                        }
                        Ok(())
                    })
                    .with_ticks(MANA_TIDE_TICKS)
                    .owned_by(aura)
                    .with_priority(EventPriority::Dot),
                )?;
                Ok(())
            })),
    )?;

    let first_use = (sim.encounter_duration() / 2).min(Duration::from_secs(60));
    register_external_cooldown(
        sim,
        aura,
        &ExternalCooldown {
            tag: MANA_TIDE_TAG.to_owned(),
            aura_duration: MANA_TIDE_DURATION,
            cooldown: MANA_TIDE_COOLDOWN,
            first_use: SimTime::from_duration(first_use),
        },
        sources,
    )?;
    Ok(aura)
}

#[cfg(test)]
mod tests {
    use sim_core::{SimConfig, Stats};

    use super::*;

    fn priest(encounter: Duration) -> (Simulation, UnitId) {
        let mut sim = Simulation::new(SimConfig::new().with_encounter_duration(encounter));
        let unit = sim.add_unit("priest", Stats::new()).unwrap();
        (sim, unit)
    }

    fn casts(sim: &Simulation, aura: AuraId) -> u64 {
        sim.aura(aura).unwrap().metrics().activations
    }

    #[test]
    fn innervate_waits_for_half_the_fight() {
        let (mut sim, unit) = priest(Duration::from_secs(180));
        let aura = innervate(&mut sim, unit, 1).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        sim.run_until(SimTime::from_secs(89)).unwrap();
        assert!(!sim.is_active(aura));

        sim.run_until(SimTime::from_secs(90)).unwrap();
        assert!(sim.is_active(aura));
        assert_eq!(sim.pseudo_stats(unit).unwrap().spirit_regen_multiplier, 5.0);

        sim.run_until(SimTime::from_secs(110)).unwrap();
        assert!(!sim.is_active(aura));
        assert_eq!(sim.pseudo_stats(unit).unwrap().spirit_regen_multiplier, 1.0);
    }

    #[test]
    fn sources_take_turns_back_to_back() {
        let (mut sim, unit) = priest(Duration::from_secs(600));
        let aura = innervate(&mut sim, unit, 3).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        // Casts at 300, 320 and 340; the first source is back at 660.
        sim.run_until(SimTime::from_secs(600)).unwrap();
        assert_eq!(casts(&sim, aura), 3);
    }

    #[test]
    fn a_single_source_recasts_on_cooldown() {
        let (mut sim, unit) = priest(Duration::from_secs(600));
        let aura = mana_tide_totem(&mut sim, unit, &[unit], 1).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        // First drop at 60s, the next at 360s.
        sim.run_until(SimTime::from_secs(600)).unwrap();
        assert_eq!(casts(&sim, aura), 2);
    }

    #[test]
    fn mana_tide_restores_mana_to_the_party() {
        let (mut sim, shaman) = priest(Duration::from_secs(60));
        let mage = sim.add_unit("mage", Stats::new()).unwrap();
        let aura = mana_tide_totem(&mut sim, shaman, &[shaman, mage], 1).unwrap();
        sim.finalize().unwrap();

        let summary = sim.run_trial(2).unwrap();
        assert_eq!(summary.aura_uptime(aura), Some(MANA_TIDE_DURATION));
        for member in [shaman, mage] {
            let restored = summary.unit(member).unwrap().mana_restored;
            assert_eq!(restored, MANA_TIDE_MANA_PER_TICK * f64::from(MANA_TIDE_TICKS));
        }
    }

    #[test]
    fn another_aura_with_the_tag_holds_the_cast() {
        let (mut sim, unit) = priest(Duration::from_secs(180));
        let own = sim
            .register_aura(
                unit,
                AuraConfig::new("Self Innervate", INNERVATE_DURATION).with_tag(INNERVATE_TAG),
            )
            .unwrap();
        let external = innervate(&mut sim, unit, 1).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        sim.schedule_at(SimTime::from_secs(80), EventPriority::Default, move |sim| {
            sim.activate_aura(own)
        })
        .unwrap();

        sim.run_until(SimTime::from_secs(99)).unwrap();
        assert!(!sim.is_active(external));
        sim.run_until(SimTime::from_secs(100)).unwrap();
        assert!(sim.is_active(external));
    }

    #[test]
    fn registering_after_finalize_is_rejected() {
        let (mut sim, unit) = priest(Duration::from_secs(60));
        let aura = sim
            .register_aura(unit, AuraConfig::new("Innervate", INNERVATE_DURATION))
            .unwrap();
        sim.finalize().unwrap();
        let config = ExternalCooldown {
            tag: INNERVATE_TAG.to_owned(),
            aura_duration: INNERVATE_DURATION,
            cooldown: INNERVATE_COOLDOWN,
            first_use: SimTime::ZERO,
        };
        assert_eq!(
            register_external_cooldown(&mut sim, aura, &config, 1),
            Err(KernelError::AlreadyFinalized)
        );
    }
}
