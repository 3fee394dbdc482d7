//! Pseudo-stats: combat modifiers that are not part of the stat vector.
//!
//! Content mutates these directly from matched OnGain/OnExpire pairs. They are
//! restored from the finalize snapshot at every trial reset.

use std::ops::{Index, IndexMut};

use strum::EnumCount;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumCount,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SpellSchool {
    #[default]
    Physical,
    Arcane,
    Fire,
    Frost,
    Holy,
    Nature,
    Shadow,
}

/// One multiplier per [`SpellSchool`], all starting at 1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchoolMultipliers([f64; SpellSchool::COUNT]);

impl Default for SchoolMultipliers {
    fn default() -> Self {
        Self([1.0; SpellSchool::COUNT])
    }
}

impl Index<SpellSchool> for SchoolMultipliers {
    type Output = f64;

    fn index(&self, school: SpellSchool) -> &f64 {
        &self.0[school as usize]
    }
}

impl IndexMut<SpellSchool> for SchoolMultipliers {
    fn index_mut(&mut self, school: SpellSchool) -> &mut f64 {
        &mut self.0[school as usize]
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PseudoStats {
    pub damage_dealt_multiplier: f64,
    pub school_damage_dealt_multiplier: SchoolMultipliers,

    pub damage_taken_multiplier: f64,
    pub school_damage_taken_multiplier: SchoolMultipliers,

    /// Flat damage added to every hit taken, after multipliers.
    pub bonus_damage_taken: f64,

    pub melee_speed_multiplier: f64,
    pub healing_taken_multiplier: f64,

    /// Scales spirit-based mana regeneration.
    pub spirit_regen_multiplier: f64,
}

impl PseudoStats {
    pub fn new() -> Self {
        Self {
            damage_dealt_multiplier: 1.0,
            school_damage_dealt_multiplier: SchoolMultipliers::default(),
            damage_taken_multiplier: 1.0,
            school_damage_taken_multiplier: SchoolMultipliers::default(),
            bonus_damage_taken: 0.0,
            melee_speed_multiplier: 1.0,
            healing_taken_multiplier: 1.0,
            spirit_regen_multiplier: 1.0,
        }
    }

    /// Outgoing multiplier for a hit of `school`.
    pub fn attacker_multiplier(&self, school: SpellSchool) -> f64 {
        self.damage_dealt_multiplier * self.school_damage_dealt_multiplier[school]
    }

    /// Incoming multiplier for a hit of `school`.
    pub fn taken_multiplier(&self, school: SpellSchool) -> f64 {
        self.damage_taken_multiplier * self.school_damage_taken_multiplier[school]
    }
}

impl Default for PseudoStats {
    fn default() -> Self {
        Self::new()
    }
}
