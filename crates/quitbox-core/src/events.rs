use serde::{Deserialize, Serialize};

use crate::emergency::GrantKind;
use crate::error::Denial;
use crate::machine::BoxState;

/// Why the box changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    Boot,
    TimerExpired,
    Schedule,
    UnlockWindowClosed,
    Emergency,
    Gatekeeper,
    Manual,
    Button,
    Reset,
}

/// Every state change in the controller produces an Event.
/// `tick()` and the operations return them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StateChanged {
        from: BoxState,
        to: BoxState,
        cause: Cause,
        at_ms: u64,
    },
    CountdownStarted {
        duration_ms: u64,
        at_ms: u64,
    },
    /// Countdown ran out; usage was counted and the policy applied.
    TimerUnlocked {
        total_cigarettes: u32,
        next_interval_minutes: Option<u32>,
        at_ms: u64,
    },
    ScheduledUnlock {
        unlock_duration_minutes: u32,
        at_ms: u64,
    },
    EmergencyGranted {
        kind: GrantKind,
        penalty_minutes: u32,
        count_today: u32,
        at_ms: u64,
    },
    EmergencyDenied {
        reason: Denial,
        at_ms: u64,
    },
    EmergencyWindowReset {
        at_ms: u64,
    },
    SessionStarted {
        session_id: String,
        at_ms: u64,
    },
    SessionCompleted {
        session_id: String,
        message_count: u32,
        at_ms: u64,
    },
    /// Session closed without a grant.
    SessionAbandoned {
        session_id: String,
        message_count: u32,
        at_ms: u64,
    },
    /// Writes could not be stored and are queued for the next flush.
    PersistenceFailed {
        pending_keys: usize,
        at_ms: u64,
    },
    ProgressReset {
        at_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::EmergencyDenied {
            reason: Denial::LimitExceeded,
            at_ms: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "EmergencyDenied");
        assert_eq!(json["reason"], "limit_exceeded");
    }
}
