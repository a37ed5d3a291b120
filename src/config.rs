use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.ron";

pub const HOST_ENV: &str = "HUE_BRIDGE_HOST";
pub const API_KEY_ENV: &str = "HUE_API_KEY";

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub effect: EffectDefaults,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
    /// Applied to every request made to the bridge
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            request_timeout_ms: 2000,
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Values the CLI falls back to when a flag is omitted
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EffectDefaults {
    pub duration_secs: u64,
    /// Percentage, 0 to 100
    pub brightness: u8,
    pub transition_ms: Option<u64>,
}

impl Default for EffectDefaults {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            brightness: 100,
            transition_ms: None,
        }
    }
}

impl Config {
    /// Load a config file, then let the environment override the bridge
    /// credentials. A missing file is fine as long as the environment
    /// provides them.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(config) => ron::from_str(&config)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(HOST_ENV).filter(|v| !v.is_empty()) {
            self.bridge.host = Some(host);
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.bridge.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.host.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::Missing(HOST_ENV));
        }
        if self.bridge.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::Missing(API_KEY_ENV));
        }
        Ok(())
    }
}
