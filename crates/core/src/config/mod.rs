//! Configuration for coopbridge
//!
//! A single TOML file, `coopbridge/configs/core.toml` next to the game
//! executable, auto-created with defaults on first load. Every field has a
//! default, so partial files are fine.
//!
//! # Example
//!
//! ```toml
//! version = 1
//! debug = false
//! log_filter = "info"
//!
//! [replication]
//! pending_update_ticks = 60
//! invalid_burst_threshold = 8
//! invalid_burst_window_ms = 1000
//! max_chat_length = 512
//!
//! [scheduler]
//! soft_cap = 1024
//!
//! [reflection]
//! season_changer_class = "Game.SeasonChanger"
//! scheduler_class = "Game.Scheduler"
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

use coopbridge_sdk::{SCHEDULER_CLASS, SEASON_CHANGER_CLASS};

use crate::tasks::DEFAULT_SOFT_CAP;

pub use loader::{base_dir, configs_dir, core_config_path, HOME_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine config directory from the game executable
    #[error("Config directory not available - could not resolve game directory")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Replication channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Frames an update for an unspawned avatar is kept before it is dropped
    pub pending_update_ticks: u32,

    /// Invalid messages within the window that trigger a disconnect
    pub invalid_burst_threshold: u32,

    /// Burst window length in milliseconds
    pub invalid_burst_window_ms: u64,

    /// Longest chat message accepted or sent, in bytes
    pub max_chat_length: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            pending_update_ticks: 60,
            invalid_burst_threshold: 8,
            invalid_burst_window_ms: 1000,
            max_chat_length: 512,
        }
    }
}

/// Game-thread scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Queue depth above which avatar updates are coalesced
    pub soft_cap: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            soft_cap: DEFAULT_SOFT_CAP,
        }
    }
}

/// Host class names, for host builds that rename them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub season_changer_class: String,
    pub scheduler_class: String,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            season_changer_class: SEASON_CHANGER_CLASS.to_string(),
            scheduler_class: SCHEDULER_CLASS.to_string(),
        }
    }
}

/// Core configuration, loaded from `coopbridge/configs/core.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,

    pub replication: ReplicationConfig,

    pub scheduler: SchedulerConfig,

    pub reflection: ReflectionConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_filter: "info".to_string(),
            replication: ReplicationConfig::default(),
            scheduler: SchedulerConfig::default(),
            reflection: ReflectionConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load core config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&core_config_path()?)
    }

    /// Save core config to file.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&core_config_path()?)
    }

    /// Reload core config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = core_config_path()?;
        let content = std::fs::read_to_string(&path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }

    /// Load from an explicit path, writing defaults there if missing
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Filter directive to install, honoring the debug switch
    pub fn effective_log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_filter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("coopbridge-test-{}-{}", name, std::process::id()))
            .join("core.toml")
    }

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.replication.pending_update_ticks, 60);
        assert_eq!(config.replication.max_chat_length, 512);
        assert_eq!(config.scheduler.soft_cap, 1024);
        assert_eq!(config.reflection.scheduler_class, "Game.Scheduler");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: CoreConfig = toml::from_str(
            r#"
            debug = true

            [replication]
            pending_update_ticks = 30
            "#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.effective_log_filter(), "debug");
        assert_eq!(config.replication.pending_update_ticks, 30);
        assert_eq!(config.replication.invalid_burst_threshold, 8);
        assert_eq!(config.reflection, ReflectionConfig::default());
    }

    #[test]
    fn test_core_config_serialize() {
        let mut config = CoreConfig::default();
        config.version = 2;
        config.scheduler.soft_cap = 64;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("version = 2"));
        assert!(toml_str.contains("[scheduler]"));
        assert!(toml_str.contains("soft_cap = 64"));
    }

    #[test]
    fn test_load_creates_default() {
        let path = temp_path("create");
        let _ = std::fs::remove_file(&path);

        let config = CoreConfig::load_from(&path).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(path.exists());

        let mut edited = config.clone();
        edited.reflection.season_changer_class = "Game.WeatherDirector".to_string();
        edited.save_to(&path).unwrap();
        assert_eq!(CoreConfig::load_from(&path).unwrap(), edited);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
