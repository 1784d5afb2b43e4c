//! Box state machine.
//!
//! ```text
//! SETUP --boot--> LOCKED | UNLOCKED
//! LOCKED <------> UNLOCKED
//! ```
//!
//! COUNTDOWN and EMERGENCY exist for compatibility with stored state and
//! are treated as LOCKED: the controller never enters them, and a stored
//! value of either is read back as LOCKED.
//!
//! Every transition drives the actuator (idempotently) and forces the
//! next display refresh.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::hardware::Actuator;
use crate::storage::{keys, StoreValue};

/// Serialized as its stored discriminant, the form status clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum BoxState {
    Locked,
    Unlocked,
    Countdown,
    Emergency,
    Setup,
}

impl BoxState {
    pub fn as_i64(self) -> i64 {
        match self {
            BoxState::Locked => 0,
            BoxState::Unlocked => 1,
            BoxState::Countdown => 2,
            BoxState::Emergency => 3,
            BoxState::Setup => 4,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, ValidationError> {
        match value {
            0 => Ok(BoxState::Locked),
            1 => Ok(BoxState::Unlocked),
            2 => Ok(BoxState::Countdown),
            3 => Ok(BoxState::Emergency),
            4 => Ok(BoxState::Setup),
            other => Err(ValidationError::UnknownVariant {
                kind: "box state",
                value: other,
            }),
        }
    }

    pub fn is_locked(self) -> bool {
        matches!(self, BoxState::Locked | BoxState::Countdown | BoxState::Emergency)
    }

    /// Collapse the locked aliases onto LOCKED.
    pub fn normalized(self) -> Self {
        if self.is_locked() {
            BoxState::Locked
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoxState::Locked => "LOCKED",
            BoxState::Unlocked => "UNLOCKED",
            BoxState::Countdown => "COUNTDOWN",
            BoxState::Emergency => "EMERGENCY",
            BoxState::Setup => "SETUP",
        }
    }
}

impl From<BoxState> for i64 {
    fn from(state: BoxState) -> Self {
        state.as_i64()
    }
}

impl TryFrom<i64> for BoxState {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_i64(value)
    }
}

/// A completed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: BoxState,
    pub to: BoxState,
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BoxStateMachine {
    state: BoxState,
    entered_ms: u64,
    /// Uptime at which the display is next due; 0 forces a render.
    next_refresh_ms: u64,
}

impl Default for BoxStateMachine {
    fn default() -> Self {
        Self {
            state: BoxState::Setup,
            entered_ms: 0,
            next_refresh_ms: 0,
        }
    }
}

impl BoxStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BoxState {
        self.state
    }

    pub fn entered_ms(&self) -> u64 {
        self.entered_ms
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    /// Move to `to`, driving the actuator. Returns `None` when already
    /// there.
    pub fn transition(
        &mut self,
        to: BoxState,
        now_ms: u64,
        actuator: &mut dyn Actuator,
    ) -> Option<Transition> {
        let to = to.normalized();
        if to == self.state {
            return None;
        }
        match to {
            BoxState::Unlocked => actuator.unlock(),
            BoxState::Setup => {}
            _ => actuator.lock(),
        }
        let from = self.state;
        self.state = to;
        self.entered_ms = now_ms;
        self.next_refresh_ms = 0;
        tracing::info!(from = from.as_str(), to = to.as_str(), "box state changed");
        Some(Transition {
            from,
            to,
            at_ms: now_ms,
        })
    }

    pub fn display_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_refresh_ms
    }

    pub fn mark_rendered(&mut self, now_ms: u64, interval_ms: u64) {
        self.next_refresh_ms = now_ms.saturating_add(interval_ms);
    }

    pub fn force_refresh(&mut self) {
        self.next_refresh_ms = 0;
    }

    /// `current_state` plus the save timestamp.
    pub fn entries(&self, saved_at_epoch_ms: u64) -> Vec<(&'static str, StoreValue)> {
        vec![
            (keys::CURRENT_STATE, StoreValue::Int(self.state.as_i64())),
            (keys::LAST_SAVE, StoreValue::U64(saved_at_epoch_ms)),
        ]
    }
}
