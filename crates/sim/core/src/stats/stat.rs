//! Stat identifiers and the dense stat vector.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Index, IndexMut, Neg, Sub};

use strum::{EnumCount, IntoEnumIterator};

/// Every stat a unit carries.
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
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumCount,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stat {
    Strength,
    Agility,
    Stamina,
    Intellect,
    Spirit,
    AttackPower,
    RangedAttackPower,
    FeralAttackPower,
    MeleeHit,
    MeleeCrit,
    SpellPower,
    SpellHit,
    SpellCrit,
    Mp5,
    Armor,
    BonusArmor,
    Defense,
    Dodge,
    Parry,
    Block,
    Health,
    Mana,
    ArcaneResistance,
    FireResistance,
    FrostResistance,
    NatureResistance,
    ShadowResistance,
}

impl Stat {
    pub const ATTRIBUTES: [Stat; 5] = [
        Stat::Strength,
        Stat::Agility,
        Stat::Stamina,
        Stat::Intellect,
        Stat::Spirit,
    ];

    pub const RESISTANCES: [Stat; 5] = [
        Stat::ArcaneResistance,
        Stat::FireResistance,
        Stat::FrostResistance,
        Stat::NatureResistance,
        Stat::ShadowResistance,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One value per [`Stat`]. Negative values are allowed.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "BTreeMap<Stat, f64>", into = "BTreeMap<Stat, f64>")
)]
pub struct Stats([f64; Stat::COUNT]);

impl Stats {
    pub const ZERO: Self = Self([0.0; Stat::COUNT]);

    pub fn new() -> Self {
        Self::ZERO
    }

    /// Build a vector from sparse `(stat, value)` pairs. Repeated stats add up.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Stat, f64)>) -> Self {
        let mut stats = Self::ZERO;
        for (stat, value) in pairs {
            stats[stat] += value;
        }
        stats
    }

    pub fn with(mut self, stat: Stat, value: f64) -> Self {
        self[stat] = value;
        self
    }

    pub fn get(&self, stat: Stat) -> f64 {
        self.0[stat.index()]
    }

    /// Uniformly scale every entry.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = *self;
        for value in out.0.iter_mut() {
            *value *= factor;
        }
        out
    }

    /// Sum of all entries. Used as a coarse "size" of a buff.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Non-zero entries in stat order.
    pub fn iter(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        Stat::iter()
            .map(|stat| (stat, self[stat]))
            .filter(|(_, value)| *value != 0.0)
    }

    pub fn approx_eq(&self, other: &Stats, epsilon: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Index<Stat> for Stats {
    type Output = f64;

    fn index(&self, stat: Stat) -> &f64 {
        &self.0[stat.index()]
    }
}

impl IndexMut<Stat> for Stats {
    fn index_mut(&mut self, stat: Stat) -> &mut f64 {
        &mut self.0[stat.index()]
    }
}

impl Add for Stats {
    type Output = Stats;

    fn add(mut self, rhs: Stats) -> Stats {
        self += rhs;
        self
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Stats) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0) {
            *lhs += rhs;
        }
    }
}

impl Sub for Stats {
    type Output = Stats;

    fn sub(mut self, rhs: Stats) -> Stats {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0) {
            *lhs -= rhs;
        }
        self
    }
}

impl Neg for Stats {
    type Output = Stats;

    fn neg(self) -> Stats {
        self.scaled(-1.0)
    }
}

impl From<BTreeMap<Stat, f64>> for Stats {
    fn from(map: BTreeMap<Stat, f64>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<Stats> for BTreeMap<Stat, f64> {
    fn from(stats: Stats) -> Self {
        stats.iter().collect()
    }
}
