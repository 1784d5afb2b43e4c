//! Timer modes and the interval policy applied after each unlock.
//!
//! Interval modes grow the lockout as usage accumulates:
//!
//! ```text
//! FIXED_INTERVAL     current interval, untouched
//! GRADUAL_REDUCTION  DEFAULT + floor(uses / 10) * 5
//! COMPLETE_QUIT      DEFAULT * 2^floor(uses / 5)
//! ```
//!
//! Every result is capped at `MAX_TIMER_MINUTES` and never lowers an
//! interval that is already higher (penalties stick).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::limits::{DEFAULT_TIMER_MINUTES, MAX_TIMER_MINUTES, SECS_PER_DAY, SECS_PER_WEEK};

/// Serialized as its stored discriminant (`timer_mode`), as config forms post it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum TimerMode {
    FixedInterval,
    GradualReduction,
    CompleteQuit,
    /// Never opens on its own; only overrides unlock the box.
    EmergencyOnly,
    DailySchedule,
    WeeklySchedule,
    /// Uses the daily hour:minute rule.
    CustomSchedule,
}

impl TimerMode {
    pub const ALL: [TimerMode; 7] = [
        TimerMode::FixedInterval,
        TimerMode::GradualReduction,
        TimerMode::CompleteQuit,
        TimerMode::EmergencyOnly,
        TimerMode::DailySchedule,
        TimerMode::WeeklySchedule,
        TimerMode::CustomSchedule,
    ];

    /// Persisted discriminant.
    pub fn as_i64(self) -> i64 {
        match self {
            TimerMode::FixedInterval => 0,
            TimerMode::GradualReduction => 1,
            TimerMode::CompleteQuit => 2,
            TimerMode::EmergencyOnly => 3,
            TimerMode::DailySchedule => 4,
            TimerMode::WeeklySchedule => 5,
            TimerMode::CustomSchedule => 6,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_i64() == value)
            .ok_or(ValidationError::UnknownVariant {
                kind: "timer mode",
                value,
            })
    }

    /// Modes whose lockout is a one-shot countdown of `interval_minutes`.
    pub fn uses_interval(self) -> bool {
        matches!(
            self,
            TimerMode::FixedInterval | TimerMode::GradualReduction | TimerMode::CompleteQuit
        )
    }

    /// Modes governed by the recurring schedule.
    pub fn uses_schedule(self) -> bool {
        self.schedule_window_secs().is_some()
    }

    /// Minimum spacing between two scheduled unlocks.
    pub fn schedule_window_secs(self) -> Option<i64> {
        match self {
            TimerMode::DailySchedule | TimerMode::CustomSchedule => Some(SECS_PER_DAY),
            TimerMode::WeeklySchedule => Some(SECS_PER_WEEK),
            _ => None,
        }
    }
}

impl From<TimerMode> for i64 {
    fn from(mode: TimerMode) -> Self {
        mode.as_i64()
    }
}

impl TryFrom<i64> for TimerMode {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_i64(value)
    }
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::FixedInterval
    }
}

/// Interval the mode would pick for `usage_count` unlocks, before the
/// never-decrease rule. `None` for modes without an interval.
pub fn policy_interval(mode: TimerMode, usage_count: u32, current: u32) -> Option<u32> {
    match mode {
        TimerMode::FixedInterval => Some(current.min(MAX_TIMER_MINUTES)),
        TimerMode::GradualReduction => {
            let steps = usage_count / 10;
            let minutes = DEFAULT_TIMER_MINUTES.saturating_add(steps.saturating_mul(5));
            Some(minutes.min(MAX_TIMER_MINUTES))
        }
        TimerMode::CompleteQuit => {
            let doublings = usage_count / 5;
            // 30 * 2^6 already exceeds the cap.
            let minutes = if doublings >= 16 {
                MAX_TIMER_MINUTES
            } else {
                DEFAULT_TIMER_MINUTES.saturating_mul(1 << doublings)
            };
            Some(minutes.min(MAX_TIMER_MINUTES))
        }
        TimerMode::EmergencyOnly
        | TimerMode::DailySchedule
        | TimerMode::WeeklySchedule
        | TimerMode::CustomSchedule => None,
    }
}

/// Interval to persist after an unlock: `max(policy, current)`.
pub fn next_interval(mode: TimerMode, usage_count: u32, current: u32) -> Option<u32> {
    policy_interval(mode, usage_count, current).map(|minutes| minutes.max(current))
}
