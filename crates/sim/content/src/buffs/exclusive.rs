//! Buffs that do not stack with other sources of the same effect.

use std::rc::Rc;

use sim_core::{
    AuraConfig, AuraId, DependencyId, ExclusiveEffectId, SimResult, Simulation, Stat,
    StatDependency, Stats, UnitId,
};

use super::BuffName;

/// One stat a buff changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatConfig {
    pub stat: Stat,
    pub amount: f64,
    /// `amount` is a factor rather than a flat bonus.
    pub multiplicative: bool,
}

impl StatConfig {
    pub const fn flat(stat: Stat, amount: f64) -> Self {
        Self {
            stat,
            amount,
            multiplicative: false,
        }
    }

    pub const fn multiply(stat: Stat, factor: f64) -> Self {
        Self {
            stat,
            amount: factor,
            multiplicative: true,
        }
    }
}

/// The stats one source of an exclusive buff grants.
#[derive(Clone, Debug, PartialEq)]
pub struct BuffConfig {
    /// Exclusive category shared by every source of this buff.
    pub category: String,
    pub stats: Vec<StatConfig>,
}

impl BuffConfig {
    pub fn new(category: impl Into<String>, stats: impl IntoIterator<Item = StatConfig>) -> Self {
        Self {
            category: category.into(),
            stats: stats.into_iter().collect(),
        }
    }
}

/// Make `aura` an exclusive source of the stats in `config`.
///
/// The member's priority is the sum of the unit's stats with the buff applied
/// to its current stats, so the strongest source wins. Only the applied
/// member changes stats.
pub fn make_exclusive_buff(
    sim: &mut Simulation,
    aura: AuraId,
    config: &BuffConfig,
) -> SimResult<ExclusiveEffectId> {
    let unit = sim.aura(aura)?.unit();

    let mut buffed = *sim.stats(unit)?;
    let mut bonus = Stats::new();
    let mut deps: Vec<DependencyId> = Vec::new();
    for stat_config in &config.stats {
        if stat_config.multiplicative {
            buffed[stat_config.stat] *= stat_config.amount;
            deps.push(sim.register_dependency(
                unit,
                StatDependency::multiply(stat_config.stat, stat_config.amount),
            )?);
        } else {
            buffed[stat_config.stat] += stat_config.amount;
            bonus[stat_config.stat] += stat_config.amount;
        }
    }

    let deps = Rc::new(deps);
    let enable = deps.clone();
    sim.register_exclusive_effect(
        aura,
        &config.category,
        buffed.total(),
        move |sim, _| {
            sim.add_stats(unit, &bonus)?;
            for dep in enable.iter() {
                sim.enable_dependency(unit, *dep)?;
            }
            Ok(())
        },
        move |sim, _| {
            sim.add_stats(unit, &-bonus)?;
            for dep in deps.iter().rev() {
                sim.disable_dependency(unit, *dep)?;
            }
            Ok(())
        },
    )
}

fn permanent_exclusive_buff(
    sim: &mut Simulation,
    unit: UnitId,
    label: &str,
    config: BuffConfig,
) -> SimResult<AuraId> {
    let aura = sim.get_or_register_aura(unit, AuraConfig::permanent(label).in_build_phase())?;
    if sim.aura(aura)?.exclusive_effects().is_empty() {
        make_exclusive_buff(sim, aura, &config)?;
    }
    Ok(aura)
}

/// +100 melee and ranged attack power.
pub fn trueshot_aura(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    permanent_exclusive_buff(
        sim,
        unit,
        "Trueshot Aura",
        BuffConfig::new(
            "TrueshotAura",
            [
                StatConfig::flat(Stat::AttackPower, 100.0),
                StatConfig::flat(Stat::RangedAttackPower, 100.0),
            ],
        ),
    )
}

/// Flat attack power. Competes with other paladin physical buffs.
pub fn blessing_of_might(
    sim: &mut Simulation,
    unit: UnitId,
    improved_points: u32,
) -> SimResult<AuraId> {
    let base = BuffName::BlessingOfMight.stats()[Stat::AttackPower];
    let bonus = (base * (1.0 + 0.04 * f64::from(improved_points))).floor();
    permanent_exclusive_buff(
        sim,
        unit,
        "Blessing of Might",
        BuffConfig::new(
            "Paladin Physical Buffs",
            [StatConfig::flat(Stat::AttackPower, bonus)],
        ),
    )
}

/// +15 to every attribute and 5% melee and spell crit.
pub fn songflower_serenade(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    let mut stats: Vec<StatConfig> = Stat::ATTRIBUTES
        .iter()
        .map(|stat| StatConfig::flat(*stat, 15.0))
        .collect();
    stats.push(StatConfig::flat(Stat::MeleeCrit, 5.0));
    stats.push(StatConfig::flat(Stat::SpellCrit, 5.0));
    permanent_exclusive_buff(
        sim,
        unit,
        "Songflower Serenade",
        BuffConfig::new("SongflowerSerenade", stats),
    )
}

/// +15% to every attribute.
pub fn spirit_of_zandalar(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    permanent_exclusive_buff(
        sim,
        unit,
        "Spirit of Zandalar",
        BuffConfig::new(
            "ZandalarBuff",
            Stat::ATTRIBUTES
                .iter()
                .map(|stat| StatConfig::multiply(*stat, 1.15)),
        ),
    )
}

/// Rallying Cry of the Dragonslayer world buff.
pub fn rallying_cry_of_the_dragonslayer(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    permanent_exclusive_buff(
        sim,
        unit,
        "Rallying Cry of the Dragonslayer",
        BuffConfig::new(
            "DragonslayerBuff",
            [
                StatConfig::flat(Stat::SpellCrit, 10.0),
                StatConfig::flat(Stat::MeleeCrit, 5.0),
                StatConfig::flat(Stat::AttackPower, 140.0),
                StatConfig::flat(Stat::RangedAttackPower, 140.0),
            ],
        ),
    )
}

/// Warchief's Blessing: health, mp5 and 15% melee haste.
///
/// The haste is a pseudo stat, so the member is registered by hand rather
/// than through [`make_exclusive_buff`].
pub fn warchiefs_blessing(sim: &mut Simulation, unit: UnitId) -> SimResult<AuraId> {
    const HASTE: f64 = 1.15;
    let aura = sim.get_or_register_aura(
        unit,
        AuraConfig::permanent("Warchief's Blessing").in_build_phase(),
    )?;
    if !sim.aura(aura)?.exclusive_effects().is_empty() {
        return Ok(aura);
    }

    let bonus = Stats::from_pairs([(Stat::Health, 300.0), (Stat::Mp5, 10.0)]);
    let priority = sim.stats(unit)?.total() + bonus.total();
    sim.register_exclusive_effect(
        aura,
        "WarchiefsBuff",
        priority,
        move |sim, _| {
            sim.add_stats(unit, &bonus)?;
            sim.pseudo_stats_mut(unit)?.melee_speed_multiplier *= HASTE;
            Ok(())
        },
        move |sim, _| {
            sim.add_stats(unit, &-bonus)?;
            sim.pseudo_stats_mut(unit)?.melee_speed_multiplier /= HASTE;
            Ok(())
        },
    )?;
    Ok(aura)
}
