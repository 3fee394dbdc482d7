//! Raid buff preset loader.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffs::RaidBuffs;
use crate::loaders::{LoadResult, read_file};

/// Named buff presets for RON files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuffPresets {
    pub presets: BTreeMap<String, RaidBuffs>,
}

/// Loader for raid buff presets from RON files.
pub struct BuffPresetLoader;

impl BuffPresetLoader {
    /// Load a single [`RaidBuffs`] from a RON file.
    pub fn load(path: &Path) -> LoadResult<RaidBuffs> {
        let content = read_file(path)?;
        let buffs: RaidBuffs = ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse raid buffs RON: {}", e))?;
        Ok(buffs)
    }

    /// Load every named preset from a RON file.
    pub fn load_presets(path: &Path) -> LoadResult<BuffPresets> {
        let content = read_file(path)?;
        let presets: BuffPresets = ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse buff presets RON: {}", e))?;
        Ok(presets)
    }

    /// Load one named preset.
    pub fn load_preset(path: &Path, name: &str) -> LoadResult<RaidBuffs> {
        let mut presets = Self::load_presets(path)?.presets;
        presets
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown buff preset '{}' in {}", name, path.display()))
    }
}
