//! Configuration file management.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stagg_core::{KettleConfig, PowerFraming, SessionConfig, TemperatureUnit};
use stagg_core::session::DEFAULT_CONNECT_TIMEOUT;

/// Polling cadence for `watch` when neither flag nor config sets one.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 30;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default kettle address
    #[serde(default)]
    pub device: Option<String>,

    /// Unit for `set-temp` when no unit flag is given
    #[serde(default)]
    pub temperature_unit: Option<TemperatureUnit>,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// How long each poll listens for notifications, in milliseconds
    #[serde(default)]
    pub notification_window_ms: Option<u64>,

    /// Polling interval for `watch`, in seconds
    #[serde(default)]
    pub watch_interval: Option<u64>,

    /// Disconnect after every operation
    #[serde(default)]
    pub per_operation: bool,

    /// Send power commands as the legacy short frame
    #[serde(default)]
    pub legacy_power: bool,

    /// Kettle aliases (friendly name -> address)
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagg")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if missing or unreadable
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Build the kettle configuration from file values and flag overrides.
    pub fn kettle_config(
        &self,
        timeout: Duration,
        per_operation: bool,
        legacy_power: bool,
    ) -> KettleConfig {
        let mut config = KettleConfig::default()
            .session(SessionConfig::default().connect_timeout(timeout))
            .persistent(!(per_operation || self.per_operation));

        if let Some(ms) = self.notification_window_ms {
            config = config.notification_window(Duration::from_millis(ms));
        }
        if legacy_power || self.legacy_power {
            config = config.power_framing(PowerFraming::Legacy);
        }
        config
    }
}

/// Resolve device from arg (or env var) or config, expanding aliases.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .or_else(|| config.device.clone())
        .map(|d| resolve_alias(&d, config))
}

/// Resolve an alias to its address, or return the input if it is not an alias.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    config
        .aliases
        .get(device)
        .cloned()
        .unwrap_or_else(|| device.to_string())
}

/// Resolve the connect timeout: flag, then config, then the library default.
pub fn resolve_timeout(arg: Option<u64>, config: &Config) -> Duration {
    arg.or(config.timeout)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

/// Resolve the `watch` interval: flag, then config, then 30 s.
pub fn resolve_interval(arg: Option<u64>, config: &Config) -> Duration {
    Duration::from_secs(
        arg.or(config.watch_interval)
            .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_alias() -> Config {
        let mut config = Config::default();
        config
            .aliases
            .insert("kitchen".to_string(), "C4:AB:12:34:56:78".to_string());
        config
    }

    #[test]
    fn test_resolve_device_prefers_arg() {
        let config = Config {
            device: Some("11:22:33:44:55:66".to_string()),
            ..Default::default()
        };
        let result = resolve_device(Some("AA:BB:CC:DD:EE:FF".to_string()), &config);
        assert_eq!(result.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_resolve_device_falls_back_to_config() {
        let config = Config {
            device: Some("11:22:33:44:55:66".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_device(None, &config).as_deref(),
            Some("11:22:33:44:55:66")
        );
    }

    #[test]
    fn test_resolve_device_none_when_both_empty() {
        assert_eq!(resolve_device(None, &Config::default()), None);
    }

    #[test]
    fn test_resolve_device_expands_alias() {
        let config = config_with_alias();
        assert_eq!(
            resolve_device(Some("kitchen".to_string()), &config).as_deref(),
            Some("C4:AB:12:34:56:78")
        );
    }

    #[test]
    fn test_resolve_device_expands_alias_from_config_default() {
        let config = Config {
            device: Some("kitchen".to_string()),
            ..config_with_alias()
        };
        assert_eq!(
            resolve_device(None, &config).as_deref(),
            Some("C4:AB:12:34:56:78")
        );
    }

    #[test]
    fn test_resolve_alias_not_found() {
        let config = config_with_alias();
        assert_eq!(resolve_alias("office", &config), "office");
    }

    #[test]
    fn test_resolve_timeout_precedence() {
        let config = Config {
            timeout: Some(20),
            ..Default::default()
        };
        assert_eq!(resolve_timeout(Some(5), &config), Duration::from_secs(5));
        assert_eq!(resolve_timeout(None, &config), Duration::from_secs(20));
        assert_eq!(
            resolve_timeout(None, &Config::default()),
            DEFAULT_CONNECT_TIMEOUT
        );
    }

    #[test]
    fn test_resolve_interval_precedence() {
        let config = Config {
            watch_interval: Some(10),
            ..Default::default()
        };
        assert_eq!(resolve_interval(Some(3), &config), Duration::from_secs(3));
        assert_eq!(resolve_interval(None, &config), Duration::from_secs(10));
        assert_eq!(
            resolve_interval(None, &Config::default()),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_kettle_config_defaults_to_persistent_sequenced() {
        let kettle = Config::default().kettle_config(Duration::from_secs(15), false, false);
        assert!(kettle.persistent);
        assert_eq!(kettle.power_framing, PowerFraming::Sequenced);
        assert_eq!(kettle.session.connect_timeout, Duration::from_secs(15));
        assert!(kettle.validate().is_ok());
    }

    #[test]
    fn test_kettle_config_applies_file_and_flags() {
        let config = Config {
            notification_window_ms: Some(3000),
            legacy_power: true,
            ..Default::default()
        };
        let kettle = config.kettle_config(Duration::from_secs(8), true, false);
        assert!(!kettle.persistent);
        assert_eq!(kettle.power_framing, PowerFraming::Legacy);
        assert_eq!(kettle.notification_window, Duration::from_secs(3));
        assert_eq!(kettle.session.connect_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_config_parses_from_toml() {
        let toml = r#"
            device = "kitchen"
            temperature_unit = "celsius"
            watch_interval = 15

            [aliases]
            kitchen = "C4:AB:12:34:56:78"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.as_deref(), Some("kitchen"));
        assert_eq!(config.temperature_unit, Some(TemperatureUnit::Celsius));
        assert_eq!(config.watch_interval, Some(15));
        assert!(!config.per_operation);
        assert_eq!(config.aliases.len(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            device: Some("C4:AB:12:34:56:78".to_string()),
            timeout: Some(20),
            ..config_with_alias()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_or_invalid_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path), Config::default());

        fs::write(&path, "device = [not toml").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
