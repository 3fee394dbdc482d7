//! Simulation configuration loader.

use std::path::Path;

use sim_core::SimConfig;
use tracing::debug;

use crate::loaders::{LoadResult, read_file};

/// Loader for simulation configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a [`SimConfig`] from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> LoadResult<SimConfig> {
        let content = read_file(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), seed = config.master_seed, "sim config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> LoadResult<SimConfig> {
        let config: SimConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;
        if config.encounter_duration.is_zero() {
            anyhow::bail!("encounter_duration must be positive");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sim_core::RngLabelPolicy;

    use super::*;

    #[test]
    fn parses_every_field() {
        let config = ConfigLoader::parse(
            r#"
            master_seed = 42
            encounter_duration = 90.5
            rng_label_policy = "declared"
            "#,
        )
        .unwrap();
        assert_eq!(config.master_seed, 42);
        assert_eq!(config.encounter_duration, Duration::from_millis(90_500));
        assert_eq!(config.rng_label_policy, RngLabelPolicy::Declared);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = ConfigLoader::parse("master_seed = 7").unwrap();
        assert_eq!(config, SimConfig::new().with_seed(7));
    }

    #[test]
    fn rejects_empty_encounters() {
        let err = ConfigLoader::parse("encounter_duration = 0.0").unwrap_err();
        assert!(err.to_string().contains("encounter_duration"));
    }
}
