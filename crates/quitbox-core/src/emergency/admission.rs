//! Emergency unlock admission.
//!
//! Caps overrides per day and accrues penalty minutes. A manual grant
//! costs `EMERGENCY_UNLOCK_PENALTY`; a grant earned through a gatekeeper
//! session costs double.
//!
//! The daily counter resets either every 24 hours of uptime (restarting
//! with each boot) or at local midnight, per [`EmergencyReset`].

use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{Denial, StoreError};
use crate::limits::{EMERGENCY_UNLOCK_PENALTY, EMERGENCY_WINDOW_MS, MAX_EMERGENCY_UNLOCKS_PER_DAY};
use crate::storage::{keys, EmergencyReset, KeyValueStore, StoreValue};

/// Which path asked for the override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// Button or web emergency request.
    Manual,
    /// Completed gatekeeper session.
    AiGated,
}

impl GrantKind {
    pub fn penalty_minutes(self) -> u32 {
        match self {
            GrantKind::Manual => EMERGENCY_UNLOCK_PENALTY,
            GrantKind::AiGated => EMERGENCY_UNLOCK_PENALTY * 2,
        }
    }
}

/// An admitted override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub kind: GrantKind,
    pub penalty_minutes: u32,
    pub count_today: u32,
    pub remaining_today: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyState {
    pub emergency_count_today: u32,
    /// Penalty accrued since the current interval cycle began.
    pub pending_penalty_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct AdmissionController {
    state: EmergencyState,
    max_per_day: u32,
    reset: EmergencyReset,
    window_start_ms: u64,
    /// Local date (yyyymmdd) the calendar counter belongs to.
    calendar_day: Option<i64>,
}

impl AdmissionController {
    pub fn new(reset: EmergencyReset) -> Self {
        Self {
            state: EmergencyState::default(),
            max_per_day: MAX_EMERGENCY_UNLOCKS_PER_DAY,
            reset,
            window_start_ms: 0,
            calendar_day: None,
        }
    }

    /// Restore counters from the store; the uptime window restarts at `now_ms`.
    pub fn load(store: &dyn KeyValueStore, reset: EmergencyReset, now_ms: u64) -> Self {
        let count = store.get_i64(keys::EMERGENCY_COUNT, 0).clamp(0, u32::MAX as i64) as u32;
        let pending = store.get_i64(keys::PENDING_PENALTY, 0).clamp(0, u32::MAX as i64) as u32;
        let day = store.get_i64(keys::EMERGENCY_DAY, 0);
        Self {
            state: EmergencyState {
                emergency_count_today: count,
                pending_penalty_minutes: pending,
            },
            max_per_day: MAX_EMERGENCY_UNLOCKS_PER_DAY,
            reset,
            window_start_ms: now_ms,
            calendar_day: (day > 0).then_some(day),
        }
    }

    pub fn state(&self) -> EmergencyState {
        self.state
    }

    pub fn max_per_day(&self) -> u32 {
        self.max_per_day
    }

    pub fn remaining_today(&self) -> u32 {
        self.max_per_day.saturating_sub(self.state.emergency_count_today)
    }

    /// Admit an override if the daily budget allows it.
    pub fn request(&mut self, kind: GrantKind) -> Result<Grant, Denial> {
        if self.state.emergency_count_today >= self.max_per_day {
            tracing::warn!(
                count = self.state.emergency_count_today,
                max = self.max_per_day,
                "emergency unlock denied: daily limit reached"
            );
            return Err(Denial::LimitExceeded);
        }
        let penalty = kind.penalty_minutes();
        self.state.emergency_count_today += 1;
        self.state.pending_penalty_minutes =
            self.state.pending_penalty_minutes.saturating_add(penalty);
        tracing::info!(
            ?kind,
            penalty,
            count = self.state.emergency_count_today,
            "emergency unlock granted"
        );
        Ok(Grant {
            kind,
            penalty_minutes: penalty,
            count_today: self.state.emergency_count_today,
            remaining_today: self.remaining_today(),
        })
    }

    pub fn request_manual_emergency_unlock(&mut self) -> Result<Grant, Denial> {
        self.request(GrantKind::Manual)
    }

    pub fn reset_daily(&mut self) {
        self.state.emergency_count_today = 0;
        tracing::info!("daily emergency count reset");
    }

    /// A new interval cycle starts; accrued penalties are already folded
    /// into the interval.
    pub fn clear_pending_penalty(&mut self) {
        self.state.pending_penalty_minutes = 0;
    }

    /// Reset the counter when the current window has elapsed. Returns true
    /// when a reset happened.
    pub fn roll_window(&mut self, now_ms: u64, wall: Option<&DateTime<FixedOffset>>) -> bool {
        match (self.reset, wall) {
            (EmergencyReset::Calendar, Some(wall)) => {
                let today = day_key(wall);
                match self.calendar_day {
                    Some(day) if day == today => false,
                    Some(_) => {
                        self.calendar_day = Some(today);
                        self.window_start_ms = now_ms;
                        self.reset_daily();
                        true
                    }
                    None => {
                        // First sync: adopt today without wiping today's count.
                        self.calendar_day = Some(today);
                        self.window_start_ms = now_ms;
                        false
                    }
                }
            }
            _ => {
                if now_ms.saturating_sub(self.window_start_ms) >= EMERGENCY_WINDOW_MS {
                    self.window_start_ms = now_ms;
                    self.reset_daily();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        for (key, value) in self.entries() {
            store.put(key, value)?;
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<(&'static str, StoreValue)> {
        vec![
            (keys::EMERGENCY_COUNT, StoreValue::Int(self.state.emergency_count_today as i64)),
            (keys::PENDING_PENALTY, StoreValue::Int(self.state.pending_penalty_minutes as i64)),
            (keys::EMERGENCY_DAY, StoreValue::Int(self.calendar_day.unwrap_or(0))),
        ]
    }
}

fn day_key(wall: &DateTime<FixedOffset>) -> i64 {
    wall.year() as i64 * 10_000 + wall.month() as i64 * 100 + wall.day() as i64
}
