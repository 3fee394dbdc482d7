//! Raid buffs.
//!
//! Flat buffs are added to the unit's starting stats during the build phase.
//! Buffs with combat behaviour (multipliers, stacking, reactive damage) are
//! registered as permanent auras so every trial starts with them applied.
//! Totems and blessings that a character sheet would show are flagged as
//! build-phase auras, so [`Simulation::measure_build_phase_stats`] counts
//! them exactly once.

mod auras;
mod exclusive;

use sim_core::{AuraId, KernelError, SimResult, Simulation, Stat, Stats, UnitId};
use tracing::debug;

pub use auras::{
    INSPIRATION_DURATION, INSPIRATION_TICK, battle_shout, battle_squawk, blessing_of_kings,
    devotion_aura, grace_of_air_totem, inspiration, power_infusion, power_infusion_aura,
    retribution_aura, sanctity_aura, strength_of_earth_totem, thorns,
};
pub use exclusive::{
    BuffConfig, StatConfig, blessing_of_might, make_exclusive_buff, rallying_cry_of_the_dragonslayer,
    songflower_serenade, spirit_of_zandalar, trueshot_aura, warchiefs_blessing,
};

use crate::cooldowns::{innervate, mana_tide_totem};

/// Buffs with a fixed stat value.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BuffName {
    ArcaneIntellect,
    BattleShout,
    BlessingOfMight,
    BlessingOfWisdom,
    BloodPact,
    DevotionAura,
    DivineSpirit,
    GraceOfAir,
    ManaSpring,
    MarkOfTheWild,
    PowerWordFortitude,
    StrengthOfEarth,
    ShadowProtection,
    ScrollOfAgility,
    ScrollOfIntellect,
    ScrollOfSpirit,
    ScrollOfStrength,
    ScrollOfStamina,
    ScrollOfProtection,
}

impl BuffName {
    /// Unimproved stat value of the buff.
    pub fn stats(self) -> Stats {
        use Stat::*;
        match self {
            Self::ArcaneIntellect => Stats::from_pairs([(Intellect, 31.0)]),
            Self::BattleShout => Stats::from_pairs([(AttackPower, 232.0)]),
            Self::BlessingOfMight => Stats::from_pairs([(AttackPower, 185.0)]),
            Self::BlessingOfWisdom => Stats::from_pairs([(Mp5, 33.0)]),
            Self::BloodPact => Stats::from_pairs([(Stamina, 42.0)]),
            Self::DevotionAura => Stats::from_pairs([(BonusArmor, 735.0)]),
            Self::DivineSpirit => Stats::from_pairs([(Spirit, 40.0)]),
            Self::GraceOfAir => Stats::from_pairs([(Agility, 77.0)]),
            Self::ManaSpring => Stats::from_pairs([(Mp5, 25.0)]),
            Self::MarkOfTheWild => Stats::from_pairs([
                (BonusArmor, 285.0),
                (Stamina, 12.0),
                (Agility, 12.0),
                (Strength, 12.0),
                (Intellect, 12.0),
                (Spirit, 12.0),
                (ArcaneResistance, 20.0),
                (ShadowResistance, 20.0),
                (NatureResistance, 20.0),
                (FireResistance, 20.0),
                (FrostResistance, 20.0),
            ]),
            Self::PowerWordFortitude => Stats::from_pairs([(Stamina, 54.0)]),
            Self::StrengthOfEarth => Stats::from_pairs([(Strength, 77.0)]),
            Self::ShadowProtection => Stats::from_pairs([(ShadowResistance, 60.0)]),
            Self::ScrollOfAgility => Stats::from_pairs([(Agility, 17.0)]),
            Self::ScrollOfIntellect => Stats::from_pairs([(Intellect, 16.0)]),
            Self::ScrollOfSpirit => Stats::from_pairs([(Spirit, 15.0)]),
            Self::ScrollOfStrength => Stats::from_pairs([(Strength, 17.0)]),
            Self::ScrollOfStamina => Stats::from_pairs([(Stamina, 16.0)]),
            Self::ScrollOfProtection => Stats::from_pairs([(BonusArmor, 240.0)]),
        }
    }
}

/// A buff that is absent, present, or present with its talent improvement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Tristate {
    #[default]
    Missing,
    Regular,
    Improved,
}

impl Tristate {
    pub fn is_present(self) -> bool {
        self != Self::Missing
    }

    /// Talent points behind the buff: `regular` or `improved`.
    ///
    /// Only meaningful when the buff is present.
    pub fn points(self, regular: u32, improved: u32) -> u32 {
        match self {
            Self::Improved => improved,
            _ => regular,
        }
    }

    /// Scaling factor for the buff: `regular` or `improved`.
    pub fn factor(self, regular: f64, improved: f64) -> f64 {
        match self {
            Self::Improved => improved,
            _ => regular,
        }
    }
}

/// Buffs provided to one unit by the rest of the raid.
///
/// A scroll is ignored when the matching raid buff is present, since the two
/// do not stack.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RaidBuffs {
    pub arcane_brilliance: bool,
    pub gift_of_the_wild: Tristate,
    pub power_word_fortitude: Tristate,
    pub divine_spirit: bool,
    pub blood_pact: Tristate,
    pub shadow_protection: bool,
    pub scroll_of_agility: bool,
    pub scroll_of_strength: bool,
    pub scroll_of_intellect: bool,
    pub scroll_of_stamina: bool,
    pub scroll_of_spirit: bool,
    pub scroll_of_protection: bool,

    /// Takes precedence over Mana Spring Totem.
    pub blessing_of_wisdom: Tristate,
    pub mana_spring_totem: Tristate,
    pub grace_of_air_totem: Tristate,

    pub blessing_of_kings: bool,
    pub blessing_of_might: Tristate,
    pub sanctity_aura: bool,
    pub devotion_aura: Tristate,
    pub retribution_aura: Tristate,
    pub thorns: Tristate,
    pub strength_of_earth_totem: Tristate,
    pub battle_shout: Tristate,
    pub trueshot_aura: bool,

    /// Number of Battle Squawk stacks, 0 to 5.
    pub battle_squawk: u32,
    /// Number of priests casting Power Infusion on this unit.
    pub power_infusions: u32,

    /// Number of druids casting Innervate on this unit.
    pub innervates: u32,
    /// Number of shamans in the party dropping Mana Tide Totem.
    pub mana_tide_totems: u32,
    /// Share of the fight Inspiration is up, 0 to disable.
    pub inspiration_uptime: f64,

    pub songflower_serenade: bool,
    pub spirit_of_zandalar: bool,
    pub rallying_cry_of_the_dragonslayer: bool,
    pub warchiefs_blessing: bool,
}

/// Apply `buffs` to `unit`. Must run during the build phase.
///
/// Returns the auras registered for buffs with combat behaviour.
pub fn apply_buff_effects(
    sim: &mut Simulation,
    unit: UnitId,
    buffs: &RaidBuffs,
) -> SimResult<Vec<AuraId>> {
    if sim.is_finalized() {
        return Err(KernelError::AlreadyFinalized);
    }

    let mut flat = Stats::new();
    if buffs.arcane_brilliance {
        flat += BuffName::ArcaneIntellect.stats();
    } else if buffs.scroll_of_intellect {
        flat += BuffName::ScrollOfIntellect.stats();
    }
    let mut wild_nature_resistance = 0.0;
    if buffs.gift_of_the_wild.is_present() {
        let stats = BuffName::MarkOfTheWild.stats();
        let stats = match buffs.gift_of_the_wild {
            Tristate::Improved => floor(stats.scaled(1.35)),
            _ => stats,
        };
        wild_nature_resistance = stats[Stat::NatureResistance];
        flat += stats;
    }
    if buffs.shadow_protection {
        // Resistances from different sources do not stack; only the excess
        // over Mark of the Wild counts.
        let shadow = BuffName::ShadowProtection.stats()[Stat::ShadowResistance];
        flat[Stat::ShadowResistance] += (shadow - wild_nature_resistance).max(0.0);
    }
    if buffs.power_word_fortitude.is_present() {
        flat += floor(
            BuffName::PowerWordFortitude
                .stats()
                .scaled(buffs.power_word_fortitude.factor(1.0, 1.3)),
        );
    } else if buffs.scroll_of_stamina {
        flat += BuffName::ScrollOfStamina.stats();
    }
    if buffs.blood_pact.is_present() {
        flat += floor(
            BuffName::BloodPact
                .stats()
                .scaled(buffs.blood_pact.factor(1.0, 1.3)),
        );
    }
    if buffs.divine_spirit {
        flat += BuffName::DivineSpirit.stats();
    } else if buffs.scroll_of_spirit {
        flat += BuffName::ScrollOfSpirit.stats();
    }
    if buffs.scroll_of_agility {
        flat += BuffName::ScrollOfAgility.stats();
    }
    if buffs.scroll_of_strength {
        flat += BuffName::ScrollOfStrength.stats();
    }
    if buffs.scroll_of_protection {
        flat += BuffName::ScrollOfProtection.stats();
    }
    if buffs.blessing_of_wisdom.is_present() {
        flat += floor(
            BuffName::BlessingOfWisdom
                .stats()
                .scaled(buffs.blessing_of_wisdom.factor(1.0, 1.2)),
        );
    } else if buffs.mana_spring_totem.is_present() {
        flat += floor(
            BuffName::ManaSpring
                .stats()
                .scaled(buffs.mana_spring_totem.factor(1.0, 1.25)),
        );
    }
    sim.add_stats(unit, &flat)?;

    let mut auras = Vec::new();
    if buffs.blessing_of_kings {
        auras.push(blessing_of_kings(sim, unit)?);
    }
    if buffs.sanctity_aura {
        auras.push(sanctity_aura(sim, unit)?);
    }
    if buffs.devotion_aura.is_present() {
        auras.push(devotion_aura(sim, unit, buffs.devotion_aura.points(0, 2))?);
    }
    if buffs.retribution_aura.is_present() {
        auras.push(retribution_aura(sim, unit, buffs.retribution_aura.points(0, 2))?);
    }
    if buffs.thorns.is_present() {
        auras.push(thorns(sim, unit, buffs.thorns.points(0, 3))?);
    }
    if buffs.battle_shout.is_present() {
        auras.push(battle_shout(sim, unit, buffs.battle_shout.points(0, 5))?);
    }
    if buffs.blessing_of_might.is_present() {
        auras.push(blessing_of_might(sim, unit, buffs.blessing_of_might.points(0, 5))?);
    }
    if buffs.strength_of_earth_totem.is_present() {
        let multiplier = buffs.strength_of_earth_totem.factor(1.0, 1.15);
        auras.push(strength_of_earth_totem(sim, unit, multiplier)?);
    }
    if buffs.grace_of_air_totem.is_present() {
        let multiplier = buffs.grace_of_air_totem.factor(1.0, 1.15);
        auras.push(grace_of_air_totem(sim, unit, multiplier)?);
    }
    if buffs.trueshot_aura {
        auras.push(trueshot_aura(sim, unit)?);
    }
    if buffs.battle_squawk > 0 {
        auras.push(battle_squawk(sim, unit, buffs.battle_squawk)?);
    }
    if buffs.songflower_serenade {
        auras.push(songflower_serenade(sim, unit)?);
    }
    if buffs.spirit_of_zandalar {
        auras.push(spirit_of_zandalar(sim, unit)?);
    }
    if buffs.rallying_cry_of_the_dragonslayer {
        auras.push(rallying_cry_of_the_dragonslayer(sim, unit)?);
    }
    if buffs.warchiefs_blessing {
        auras.push(warchiefs_blessing(sim, unit)?);
    }
    if buffs.power_infusions > 0 {
        auras.push(power_infusion(sim, unit, buffs.power_infusions)?);
    }
    if buffs.innervates > 0 {
        auras.push(innervate(sim, unit, buffs.innervates)?);
    }
    if buffs.mana_tide_totems > 0 {
        auras.push(mana_tide_totem(sim, unit, &[unit], buffs.mana_tide_totems)?);
    }
    if buffs.inspiration_uptime > 0.0 {
        auras.push(inspiration(sim, unit, buffs.inspiration_uptime)?);
    }

    debug!(unit = %unit, flat = flat.total(), auras = auras.len(), "raid buffs applied");
    Ok(auras)
}

fn floor(stats: Stats) -> Stats {
    Stats::from_pairs(stats.iter().map(|(stat, value)| (stat, value.floor())))
}

#[cfg(test)]
mod tests {
    use sim_core::SimConfig;
    use strum::IntoEnumIterator;

    use super::*;

    fn rogue() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(SimConfig::new());
        let unit = sim
            .add_unit(
                "rogue",
                Stats::from_pairs([(Stat::Strength, 100.0), (Stat::Agility, 300.0)]),
            )
            .unwrap();
        (sim, unit)
    }

    #[test]
    fn every_buff_has_a_value() {
        for buff in BuffName::iter() {
            assert!(buff.stats().total() > 0.0, "{buff} has no stats");
        }
    }

    #[test]
    fn improved_gift_of_the_wild_rounds_down() {
        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            gift_of_the_wild: Tristate::Improved,
            ..RaidBuffs::default()
        };
        apply_buff_effects(&mut sim, unit, &buffs).unwrap();

        // 12 * 1.35 = 16.2
        assert_eq!(sim.stat(unit, Stat::Strength).unwrap(), 116.0);
        assert_eq!(sim.stat(unit, Stat::NatureResistance).unwrap(), 27.0);
    }

    #[test]
    fn buffs_must_be_applied_before_finalize() {
        let (mut sim, unit) = rogue();
        sim.finalize().unwrap();
        assert_eq!(
            apply_buff_effects(&mut sim, unit, &RaidBuffs::default()),
            Err(KernelError::AlreadyFinalized)
        );
    }

    #[test]
    fn scrolls_only_fill_in_for_missing_raid_buffs() {
        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            arcane_brilliance: true,
            scroll_of_intellect: true,
            scroll_of_stamina: true,
            scroll_of_spirit: true,
            scroll_of_protection: true,
            ..RaidBuffs::default()
        };
        apply_buff_effects(&mut sim, unit, &buffs).unwrap();

        assert_eq!(sim.stat(unit, Stat::Intellect).unwrap(), 31.0);
        assert_eq!(sim.stat(unit, Stat::Stamina).unwrap(), 16.0);
        assert_eq!(sim.stat(unit, Stat::Spirit).unwrap(), 15.0);
        assert_eq!(sim.stat(unit, Stat::BonusArmor).unwrap(), 240.0);
    }

    #[test]
    fn wisdom_replaces_mana_spring() {
        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            blessing_of_wisdom: Tristate::Improved,
            mana_spring_totem: Tristate::Improved,
            ..RaidBuffs::default()
        };
        apply_buff_effects(&mut sim, unit, &buffs).unwrap();
        // floor(33 * 1.2) = 39
        assert_eq!(sim.stat(unit, Stat::Mp5).unwrap(), 39.0);

        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            mana_spring_totem: Tristate::Improved,
            ..RaidBuffs::default()
        };
        apply_buff_effects(&mut sim, unit, &buffs).unwrap();
        // floor(25 * 1.25) = 31
        assert_eq!(sim.stat(unit, Stat::Mp5).unwrap(), 31.0);
    }

    #[test]
    fn shadow_protection_only_adds_past_mark_of_the_wild() {
        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            gift_of_the_wild: Tristate::Regular,
            shadow_protection: true,
            ..RaidBuffs::default()
        };
        apply_buff_effects(&mut sim, unit, &buffs).unwrap();
        assert_eq!(sim.stat(unit, Stat::ShadowResistance).unwrap(), 60.0);
    }

    #[test]
    fn grace_of_air_is_applied_from_trial_start() {
        let (mut sim, unit) = rogue();
        let buffs = RaidBuffs {
            grace_of_air_totem: Tristate::Improved,
            ..RaidBuffs::default()
        };
        let auras = apply_buff_effects(&mut sim, unit, &buffs).unwrap();
        sim.finalize().unwrap();
        sim.reset(1).unwrap();

        assert_eq!(auras.len(), 1);
        assert!(sim.is_active(auras[0]));
        // floor(77 * 1.15) = 88
        assert_eq!(sim.stat(unit, Stat::Agility).unwrap(), 388.0);
    }

    #[test]
    fn tristate_picks_the_improved_value() {
        assert_eq!(Tristate::Regular.points(0, 5), 0);
        assert_eq!(Tristate::Improved.points(0, 5), 5);
        assert!(!Tristate::Missing.is_present());
        assert_eq!("improved".parse::<Tristate>().unwrap(), Tristate::Improved);
    }
}
