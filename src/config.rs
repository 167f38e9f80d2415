// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration for a run.
///
/// Reads `path` (falling back to defaults if it is missing or unreadable),
/// applies environment overrides, then validates.
pub fn load(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::debug!("No config file at {path:?}; using defaults");
        Config::default()
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
