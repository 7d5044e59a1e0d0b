//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERCADO_DATABASE_PATH=/var/lib/mercado/mercado.db                  │
//! │     MERCADO_SWEEP_INTERVAL_SECS=30                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mercado/engine.toml (Linux)                              │
//! │     ~/Library/Application Support/co.mercado.mercado/engine.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/mercado/mercado.db"
//! max_connections = 5
//!
//! [sweeper]
//! interval_secs = 60
//! batch_size = 100
//!
//! [notifications]
//! enabled = true
//! channel_capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use mercado_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Defaults to `mercado.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Inactivity sweeper settings (the scheduler collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Maximum orders examined per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_true() -> bool {
    true
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_batch_size() -> u32 {
    100
}

impl Default for SweeperSettings {
    fn default() -> Self {
        SweeperSettings {
            enabled: true,
            interval_secs: default_sweep_interval(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buffer of the mailer channel; a full buffer drops the notification.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: true,
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sweeper: SweeperSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "sweeper.interval_secs must be greater than 0".into(),
            ));
        }
        if self.sweeper.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "sweeper.batch_size must be greater than 0".into(),
            ));
        }
        if self.notifications.channel_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "notifications.channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MERCADO_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("MERCADO_DATABASE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid MERCADO_DATABASE_MAX_CONNECTIONS"),
            }
        }

        if let Ok(enabled) = std::env::var("MERCADO_SWEEP_ENABLED") {
            match enabled.parse::<bool>() {
                Ok(b) => self.sweeper.enabled = b,
                Err(_) => warn!(value = %enabled, "Ignoring invalid MERCADO_SWEEP_ENABLED"),
            }
        }

        if let Ok(secs) = std::env::var("MERCADO_SWEEP_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => {
                    debug!(interval_secs = n, "Overriding sweep interval from environment");
                    self.sweeper.interval_secs = n;
                }
                Err(_) => warn!(value = %secs, "Ignoring invalid MERCADO_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Ok(size) = std::env::var("MERCADO_SWEEP_BATCH_SIZE") {
            match size.parse::<u32>() {
                Ok(n) => self.sweeper.batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid MERCADO_SWEEP_BATCH_SIZE"),
            }
        }

        if let Ok(enabled) = std::env::var("MERCADO_NOTIFICATIONS_ENABLED") {
            match enabled.parse::<bool>() {
                Ok(b) => self.notifications.enabled = b,
                Err(_) => warn!(value = %enabled, "Ignoring invalid MERCADO_NOTIFICATIONS_ENABLED"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("co", "mercado", "mercado")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Configured database path, or the platform default.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("mercado.db")))
            .unwrap_or_else(|| PathBuf::from("mercado.db"))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweeper.interval_secs, 60);
        assert_eq!(config.sweeper.batch_size, 100);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.sweeper.batch_size = 0;
        assert!(config.validate().is_err());

        config.sweeper.batch_size = 10;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [sweeper]
            interval_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.sweeper.interval_secs, 15);
        assert_eq!(config.sweeper.batch_size, 100);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let path = std::env::temp_dir().join(format!("mercado-engine-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/mercado-test.db\"\n[sweeper]\nbatch_size = 7\n",
        )
        .unwrap();

        std::env::set_var("MERCADO_SWEEP_INTERVAL_SECS", "9");
        let config = EngineConfig::load(Some(path.clone())).unwrap();
        std::env::remove_var("MERCADO_SWEEP_INTERVAL_SECS");
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.database_path(), PathBuf::from("/tmp/mercado-test.db"));
        assert_eq!(config.sweeper.batch_size, 7);
        assert_eq!(config.sweeper.interval_secs, 9);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[sweeper]"));
        assert!(toml_str.contains("[notifications]"));
    }
}
