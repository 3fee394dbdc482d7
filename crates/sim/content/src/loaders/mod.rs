//! Loaders for simulation data files.
//!
//! Configuration is TOML; buff presets are RON.

pub mod buffs;
pub mod config;

pub use buffs::{BuffPresetLoader, BuffPresets};
pub use config::ConfigLoader;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
