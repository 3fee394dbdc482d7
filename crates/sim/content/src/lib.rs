//! Combat content authored against the aura and effect kernel.
//!
//! This crate houses concrete effects and loaders for their data files:
//! - Raid buffs (flat stat buffs, permanent auras, exclusive world buffs)
//! - Cooldowns cast on a unit by the rest of the raid (Innervate, Mana Tide)
//! - Weapon imbues and reactive auras (proc-driven effects)
//! - Damage-over-time effects (poisons, bleeds)
//! - Simulation configuration (TOML) and buff presets (RON)
//!
//! Everything here goes through the kernel's public API; none of it is
//! special-cased by `sim-core`.

pub mod buffs;
pub mod cooldowns;
pub mod dots;
pub mod imbues;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use buffs::{
    BuffConfig, BuffName, RaidBuffs, StatConfig, Tristate, apply_buff_effects, make_exclusive_buff,
};
pub use cooldowns::{ExternalCooldown, innervate, mana_tide_totem, register_external_cooldown};
pub use dots::{DeadlyPoison, Rake, WoundPoison};
pub use imbues::{InstantPoison, WindfuryWeapon};

#[cfg(feature = "loaders")]
pub use loaders::{BuffPresetLoader, BuffPresets, ConfigLoader, LoadResult};
