//! Durable storage.
//!
//! Two layers:
//! - [`KeyValueStore`]: the device preference space (timer mode, counters,
//!   watermarks, device settings), backed by SQLite or memory
//! - [`Config`]: host-side TOML configuration (tick rate, network view,
//!   AI endpoint)

mod config;
pub mod database;
pub mod keys;
mod memory;

pub use config::{Config, DeviceConfig, EmergencyReset, NetworkConfig, AiConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};

/// Returns `~/.config/quitbox[-dev]/` based on QUITBOX_ENV.
///
/// Set QUITBOX_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUITBOX_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("quitbox-dev")
    } else {
        base_dir.join("quitbox")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// A type-tagged stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StoreValue {
    Int(i64),
    U64(u64),
    Bool(bool),
    Float(f64),
    Text(String),
}

impl StoreValue {
    /// Type tag as written to the backing store.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::Int(_) => "int",
            StoreValue::U64(_) => "u64",
            StoreValue::Bool(_) => "bool",
            StoreValue::Float(_) => "float",
            StoreValue::Text(_) => "text",
        }
    }

    /// Encode the payload as text.
    pub fn encode(&self) -> String {
        match self {
            StoreValue::Int(v) => v.to_string(),
            StoreValue::U64(v) => v.to_string(),
            StoreValue::Bool(v) => v.to_string(),
            StoreValue::Float(v) => v.to_string(),
            StoreValue::Text(v) => v.clone(),
        }
    }

    /// Rebuild a value from its tag and text payload.
    pub fn decode(key: &str, kind: &str, raw: &str) -> Result<Self, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt {
            key: key.to_string(),
            message,
        };
        match kind {
            "int" => raw
                .parse()
                .map(StoreValue::Int)
                .map_err(|e| corrupt(format!("{e}"))),
            "u64" => raw
                .parse()
                .map(StoreValue::U64)
                .map_err(|e| corrupt(format!("{e}"))),
            "bool" => raw
                .parse()
                .map(StoreValue::Bool)
                .map_err(|e| corrupt(format!("{e}"))),
            "float" => raw
                .parse()
                .map(StoreValue::Float)
                .map_err(|e| corrupt(format!("{e}"))),
            "text" => Ok(StoreValue::Text(raw.to_string())),
            other => Err(corrupt(format!("unknown type tag '{other}'"))),
        }
    }
}

/// Durable key to typed-value map that survives power loss.
///
/// Typed getters resolve a missing key, or a key holding a value of a
/// different type, to the supplied default.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError>;
    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    /// Drop every key in the namespace.
    fn clear(&mut self) -> Result<(), StoreError>;

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.lookup(key) {
            Some(StoreValue::Int(v)) => v,
            Some(other) => mismatch(key, &other, default),
            None => default,
        }
    }

    fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.lookup(key) {
            Some(StoreValue::U64(v)) => v,
            Some(other) => mismatch(key, &other, default),
            None => default,
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.lookup(key) {
            Some(StoreValue::Bool(v)) => v,
            Some(other) => mismatch(key, &other, default),
            None => default,
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.lookup(key) {
            Some(StoreValue::Float(v)) => v,
            Some(other) => mismatch(key, &other, default),
            None => default,
        }
    }

    fn get_text(&self, key: &str, default: &str) -> String {
        match self.lookup(key) {
            Some(StoreValue::Text(v)) => v,
            Some(other) => mismatch(key, &other, default.to_string()),
            None => default.to_string(),
        }
    }

    /// Read a key, logging and swallowing backend failures.
    fn lookup(&self, key: &str) -> Option<StoreValue> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed, using default");
                None
            }
        }
    }
}

fn mismatch<T>(key: &str, found: &StoreValue, default: T) -> T {
    tracing::warn!(key, found = found.kind(), "stored value has unexpected type, using default");
    default
}
