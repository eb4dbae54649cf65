//! Config path resolution
//!
//! Handles resolving paths for configuration files based on the game's location.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable that overrides the base directory
pub const HOME_ENV: &str = "COOPBRIDGE_HOME";

/// Returns the coopbridge base directory.
///
/// The bridge runs inside the game process, so the base directory sits next
/// to the game executable:
/// `<game dir>/coopbridge/`
///
/// `COOPBRIDGE_HOME` overrides it.
pub fn base_dir() -> ConfigResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.parent()
        .map(|dir| dir.join("coopbridge"))
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base configs directory.
///
/// Path: `<game dir>/coopbridge/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(base_dir()?.join("configs"))
}

/// Returns the core config path.
///
/// Path: `<game dir>/coopbridge/configs/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join("core.toml"))
}
