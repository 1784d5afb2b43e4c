//! TOML-based host configuration.
//!
//! Stores settings of the machine the controller runs on:
//! - Loop timing (tick, display refresh, persistence flush)
//! - Local time offset and emergency-window policy
//! - The host's view of the current network
//! - Remote AI endpoint
//!
//! Configuration is stored at `~/.config/quitbox/config.toml`.
//! Box behaviour (timer mode, schedules, AI switch) lives in the key-value
//! store instead, so it survives alongside the counters it governs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// How the per-day emergency counter is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyReset {
    /// Every 24 hours of continuous uptime. Restarts with each boot.
    Uptime,
    /// At local midnight; falls back to uptime until the wall clock syncs.
    Calendar,
}

/// Control loop and device timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_display_refresh_ms")]
    pub display_refresh_ms: u64,
    /// Pause between servo positions during a test sweep.
    #[serde(default = "default_servo_settle_ms")]
    pub servo_settle_ms: u64,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_emergency_reset")]
    pub emergency_reset: EmergencyReset,
}

/// Network the box is currently attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// SSID of the joined network. Empty in access-point mode.
    #[serde(default)]
    pub ssid: String,
    /// True while the box serves its own access point.
    #[serde(default = "default_true")]
    pub ap_mode: bool,
}

/// Remote AI responder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Host configuration.
///
/// Serialized to/from TOML at `~/.config/quitbox/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

fn default_tick_interval_ms() -> u64 {
    50
}
fn default_flush_interval_secs() -> u64 {
    60
}
fn default_display_refresh_ms() -> u64 {
    crate::limits::DISPLAY_UPDATE_INTERVAL_MS
}
fn default_servo_settle_ms() -> u64 {
    1000
}
fn default_emergency_reset() -> EmergencyReset {
    EmergencyReset::Uptime
}
fn default_true() -> bool {
    true
}
fn default_ai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_ai_model() -> String {
    "gpt-4o-mini".into()
}
fn default_ai_timeout_secs() -> u64 {
    8
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            flush_interval_secs: default_flush_interval_secs(),
            display_refresh_ms: default_display_refresh_ms(),
            servo_settle_ms: default_servo_settle_ms(),
            utc_offset_minutes: 0,
            emergency_reset: default_emergency_reset(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            ap_mode: true,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            model: default_ai_model(),
            request_timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                ConfigError::InvalidValue { message, .. } => ConfigError::LoadFailed { path, message },
                other => other,
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            key: "<document>".into(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "device.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if !(-14 * 60..=14 * 60).contains(&self.device.utc_offset_minutes) {
            return Err(ConfigError::InvalidValue {
                key: "device.utc_offset_minutes".into(),
                message: "must be within +/-14 hours".into(),
            });
        }
        url::Url::parse(&self.ai.endpoint).map_err(|e| ConfigError::InvalidValue {
            key: "ai.endpoint".into(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}
