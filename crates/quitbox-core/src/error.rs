//! Core error types for quitbox-core.
//!
//! Errors here are genuine failures (storage, configuration, hardware).
//! Refusals the box hands back to a user, such as a spent emergency
//! budget, are modelled by [`Denial`] and travel inside response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for quitbox-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Host configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Actuator or display failed to come up. Fatal at boot.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read or write failed
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A stored value carries an unknown type tag
    #[error("Corrupt value for '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Host configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/config directory could not be resolved
    #[error("Could not determine data directory")]
    NoDataDir,
}

/// Hardware initialisation failures.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Actuator failed to initialise: {0}")]
    Actuator(String),

    #[error("Display failed to initialise: {0}")]
    Display(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value outside its accepted range
    #[error("Value {value} for '{field}' is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Unknown enum discriminant
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: i64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// A structured refusal returned to the caller instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// Daily emergency budget is spent
    #[error("Emergency unlock limit reached")]
    LimitExceeded,
    /// No gatekeeper session is running
    #[error("No active AI session")]
    NoActiveSession,
    /// The running session outlived its maximum duration
    #[error("AI session expired")]
    SessionExpired,
    /// The current network is not allowed to start a session
    #[error("Emergency unlock not allowed on this network")]
    NetworkBlocked,
    /// The AI gatekeeper is switched off
    #[error("AI gatekeeper is disabled")]
    AiDisabled,
    /// Minimum duration or message count not reached
    #[error("Session requirements not met")]
    RequirementsNotMet,
    /// The box is already open
    #[error("Box already unlocked")]
    AlreadyUnlocked,
}

impl Denial {
    /// Stable machine-readable reason string.
    pub fn reason(self) -> &'static str {
        match self {
            Denial::LimitExceeded => "limit_reached",
            Denial::NoActiveSession => "no_active_session",
            Denial::SessionExpired => "session_expired",
            Denial::NetworkBlocked => "network_blocked",
            Denial::AiDisabled => "ai_disabled",
            Denial::RequirementsNotMet => "requirements_not_met",
            Denial::AlreadyUnlocked => "already_unlocked",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_reasons_are_stable() {
        assert_eq!(Denial::LimitExceeded.reason(), "limit_reached");
        assert_eq!(Denial::NetworkBlocked.reason(), "network_blocked");
        assert_eq!(
            serde_json::to_string(&Denial::RequirementsNotMet).unwrap(),
            "\"requirements_not_met\""
        );
    }

    #[test]
    fn hardware_error_converts_into_core_error() {
        let err: CoreError = HardwareError::Display("no ack on 0x3C".into()).into();
        assert!(err.to_string().contains("0x3C"));
    }
}
