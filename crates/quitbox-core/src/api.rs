//! Request and response shapes of the box operations.
//!
//! Field names are camelCase to match the web client; box state and timer
//! mode travel as their integer codes.

use serde::{Deserialize, Serialize};

use crate::emergency::Grant;
use crate::error::Denial;
use crate::gatekeeper::ChatTurn;
use crate::machine::BoxState;
use crate::settings::BoxSettings;
use crate::timer::{RecurringSchedule, TimerMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub box_state: BoxState,
    pub timer_mode: TimerMode,
    pub timer_active: bool,
    pub emergency_count: u32,
    pub max_emergency: u32,
    pub time_remaining_seconds: u64,
    pub total_cigarettes: u32,
    pub today_count: u32,
    pub daily_limit: u32,
    pub smoke_free_days: u64,
    pub longest_streak: u64,
    pub money_saved: f64,
    pub currency: String,
    /// Whole days of uptime.
    pub total_days: u64,
    pub is_scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_unlock: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_elapsed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
    pub network_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub timer_mode: TimerMode,
    pub interval_minutes: u32,
    pub daily_limit: u32,
    pub emergency_unlocks: u32,
    pub schedule: RecurringSchedule,
    pub settings: BoxSettings,
}

/// Schedule part of a config update. `week_day` is only used by the
/// weekly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub week_day: Option<u8>,
    pub unlock_duration_minutes: u32,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default)]
    pub timer_mode: Option<TimerMode>,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub schedule: Option<ScheduleUpdate>,
}

/// Outcome of a plain action such as unlock or lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            reason: None,
        }
    }

    pub fn denied(denial: Denial) -> Self {
        Self {
            success: false,
            message: denial.to_string(),
            reason: Some(denial.reason().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_today: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Result<Grant, Denial>> for GrantResponse {
    fn from(result: Result<Grant, Denial>) -> Self {
        match result {
            Ok(grant) => Self {
                success: true,
                message: "Emergency unlock granted".into(),
                penalty: Some(grant.penalty_minutes),
                remaining_today: Some(grant.remaining_today),
                reason: None,
            },
            Err(denial) => Self {
                success: false,
                message: denial.to_string(),
                penalty: None,
                remaining_today: None,
                reason: Some(denial.reason().to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SessionStartResponse {
    pub fn started(session_id: String, min_duration_seconds: u64) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
            min_duration_seconds: Some(min_duration_seconds),
            reason: None,
        }
    }

    pub fn denied(denial: Denial) -> Self {
        Self {
            success: false,
            session_id: None,
            min_duration_seconds: None,
            reason: Some(denial.reason().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    #[serde(flatten)]
    pub turn: Option<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Result<ChatTurn, Denial>> for ChatResponse {
    fn from(result: Result<ChatTurn, Denial>) -> Self {
        match result {
            Ok(turn) => Self {
                success: true,
                turn: Some(turn),
                reason: None,
            },
            Err(denial) => Self {
                success: false,
                turn: None,
                reason: Some(denial.reason().to_string()),
            },
        }
    }
}
