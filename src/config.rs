//! Hearth Configuration Module
//!
//! Config is stored in `~/.config/hearth/config.toml` unless a path is given.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`HASS_URL`, `HASS_TOKEN`, `HEARTH_CATALOG`, `HEARTH_LISTEN`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HearthError, Result};
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::util::{
    DRY_RUN_DELAY, MAX_RETRIES, NUMERIC_TOLERANCE, RETRY_DELAY, VERIFY_POLL_INTERVAL,
    VERIFY_TIMEOUT,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HearthConfig {
    /// Path to the step catalog YAML
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    #[serde(default)]
    pub hass: HassSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

/// Home Assistant connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HassSettings {
    /// Base URL, e.g. http://homeassistant.local:8123
    pub url: Option<String>,

    /// Long-lived access token
    pub token: Option<String>,

    /// Boolean entity that is `on` while the house is empty
    #[serde(default = "default_away_entity")]
    pub away_mode_entity: String,
}

fn default_away_entity() -> String {
    "input_boolean.away_mode".to_string()
}

impl Default for HassSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            away_mode_entity: default_away_entity(),
        }
    }
}

/// Step runner and verifier tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub verify_interval_ms: u64,
    pub verify_timeout_ms: u64,
    pub numeric_tolerance: f64,
    pub dry_run_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            verify_interval_ms: VERIFY_POLL_INTERVAL.as_millis() as u64,
            verify_timeout_ms: VERIFY_TIMEOUT.as_millis() as u64,
            numeric_tolerance: NUMERIC_TOLERANCE,
            dry_run_delay_ms: DRY_RUN_DELAY.as_millis() as u64,
        }
    }
}

impl EngineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(self.max_retries)
                .with_delay(Duration::from_millis(self.retry_delay_ms)),
        )
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn dry_run_delay(&self) -> Duration {
        Duration::from_millis(self.dry_run_delay_ms)
    }

    /// Reject values that would make polling spin or every numeric check fail
    pub fn validate(&self) -> Result<()> {
        if self.verify_interval_ms == 0 {
            return Err(HearthError::ConfigError {
                reason: "[engine].verify_interval_ms must be greater than 0".to_string(),
            });
        }
        if !self.numeric_tolerance.is_finite() || self.numeric_tolerance < 0.0 {
            return Err(HearthError::ConfigError {
                reason: format!(
                    "[engine].numeric_tolerance must be a non-negative number, got {}",
                    self.numeric_tolerance
                ),
            });
        }
        Ok(())
    }
}

/// HTTP control surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl HearthConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/hearth/` on Unix, `%APPDATA%/hearth/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hearth")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path (defaults if the file doesn't exist)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| HearthError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| HearthError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| HearthError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| HearthError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| HearthError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Some(url) = non_empty_env("HASS_URL") {
            self.hass.url = Some(url);
        }
        if let Some(token) = non_empty_env("HASS_TOKEN") {
            self.hass.token = Some(token);
        }
        if let Some(catalog) = non_empty_env("HEARTH_CATALOG") {
            self.catalog = Some(PathBuf::from(catalog));
        }
        if let Some(listen) = non_empty_env("HEARTH_LISTEN") {
            self.server.listen = listen;
        }
        self
    }

    pub fn hass_url(&self) -> Result<&str> {
        self.hass
            .url
            .as_deref()
            .ok_or_else(|| HearthError::ConfigError {
                reason: "Home Assistant URL not set (HASS_URL or [hass].url)".to_string(),
            })
    }

    pub fn hass_token(&self) -> Result<&str> {
        self.hass.token.as_deref().ok_or(HearthError::MissingToken)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("steps.yaml"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Mask a token for display
///
/// Shows first N chars + asterisks, e.g. "eyJhbGci***"
pub fn mask_token(token: &str, visible_chars: usize) -> String {
    if token.is_empty() {
        return String::new();
    }

    let visible: String = token.chars().take(visible_chars).collect();
    format!("{}***", visible)
}
