use std::time::Duration;

/// How RNG stream labels are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RngLabelPolicy {
    /// Streams are derived on first use.
    #[default]
    Lazy,

    /// Every label must be declared during the build phase; rolling on an
    /// undeclared label terminates the run.
    Declared,
}

/// Simulation configuration and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Master seed every RNG stream is derived from.
    pub master_seed: u64,

    /// Length of one trial on the simulated timeline.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub encounter_duration: Duration,

    pub rng_label_policy: RngLabelPolicy,
}

impl SimConfig {
    pub const DEFAULT_MASTER_SEED: u64 = 0x5EED_CAFE;
    pub const DEFAULT_ENCOUNTER_SECS: u64 = 180;

    pub fn new() -> Self {
        Self {
            master_seed: Self::DEFAULT_MASTER_SEED,
            encounter_duration: Duration::from_secs(Self::DEFAULT_ENCOUNTER_SECS),
            rng_label_policy: RngLabelPolicy::Lazy,
        }
    }

    pub fn with_seed(mut self, master_seed: u64) -> Self {
        self.master_seed = master_seed;
        self
    }

    pub fn with_encounter_duration(mut self, encounter_duration: Duration) -> Self {
        self.encounter_duration = encounter_duration;
        self
    }

    pub fn with_rng_label_policy(mut self, policy: RngLabelPolicy) -> Self {
        self.rng_label_policy = policy;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Encounter length is written as fractional seconds in config files.
#[cfg(feature = "serde")]
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
