//! Timer engine implementation.
//!
//! The timer engine owns the lockout countdown and the recurring schedule.
//! It does not use internal threads or read clocks itself - the caller
//! passes uptime and wall-clock time into `tick()`.
//!
//! ## Countdown
//!
//! ```text
//! Idle -> Running -> Expired (triggered) -> consume_triggered() -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::load(&store);
//! engine.start(now_ms, engine.interval_ms());
//! // In a loop:
//! for event in engine.tick(now_ms, wall.as_ref()) { /* ... */ }
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::policy::{next_interval, TimerMode};
use super::schedule::{RecurringSchedule, ScheduleState};
use crate::error::{StoreError, ValidationError};
use crate::limits::{clamp_interval, DEFAULT_TIMER_MINUTES};
use crate::storage::{keys, KeyValueStore, StoreValue};

/// Something the engine detected during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    /// The lockout countdown ran out.
    CountdownExpired,
    /// The recurring schedule matched and its watermark advanced.
    ScheduledUnlock { unlock_duration_minutes: u32 },
}

/// One-shot countdown on the uptime clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub start_ms: u64,
    pub duration_ms: u64,
    pub running: bool,
}

impl Countdown {
    fn remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.running {
            return 0;
        }
        let elapsed = now_ms.saturating_sub(self.start_ms);
        self.duration_ms.saturating_sub(elapsed)
    }
}

/// Core timer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    mode: TimerMode,
    /// Current lockout for interval modes.
    interval_minutes: u32,
    countdown: Countdown,
    /// Set on expiry, cleared by `consume_triggered()` or `start()`.
    triggered: bool,
    schedule: ScheduleState,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(TimerMode::default(), DEFAULT_TIMER_MINUTES)
    }
}

impl TimerEngine {
    pub fn new(mode: TimerMode, interval_minutes: u32) -> Self {
        Self {
            mode,
            interval_minutes: clamp_interval(interval_minutes),
            countdown: Countdown::default(),
            triggered: false,
            schedule: ScheduleState::default(),
        }
    }

    /// Rebuild mode, interval, schedule and watermark from the store.
    /// Missing keys fall back to defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let raw_mode = store.get_i64(keys::TIMER_MODE, TimerMode::FixedInterval.as_i64());
        let mode = TimerMode::from_i64(raw_mode).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unknown stored timer mode, using FIXED_INTERVAL");
            TimerMode::FixedInterval
        });
        let interval = store.get_i64(keys::INTERVAL_MINUTES, DEFAULT_TIMER_MINUTES as i64);

        let defaults = RecurringSchedule::default();
        let schedule = RecurringSchedule {
            hour: store.get_i64(keys::DAILY_HOUR, defaults.hour as i64).clamp(0, 23) as u8,
            minute: store.get_i64(keys::DAILY_MINUTE, defaults.minute as i64).clamp(0, 59) as u8,
            week_day: store.get_i64(keys::WEEKLY_DAY, defaults.week_day as i64).clamp(0, 6) as u8,
            unlock_duration_minutes: clamp_interval(
                store
                    .get_i64(keys::UNLOCK_DURATION, defaults.unlock_duration_minutes as i64)
                    .clamp(0, u32::MAX as i64) as u32,
            ),
            is_active: store.get_bool(keys::SCHEDULE_ACTIVE, false),
        };

        Self {
            mode,
            interval_minutes: clamp_interval(interval.clamp(0, u32::MAX as i64) as u32),
            countdown: Countdown::default(),
            triggered: false,
            schedule: ScheduleState {
                schedule,
                last_fired_epoch_sec: store.get_u64(keys::LAST_SCHEDULED_UNLOCK, 0) as i64,
            },
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn interval_ms(&self) -> u64 {
        (self.interval_minutes as u64).saturating_mul(60_000)
    }

    pub fn is_running(&self) -> bool {
        self.countdown.running
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    pub fn schedule(&self) -> &RecurringSchedule {
        &self.schedule.schedule
    }

    pub fn last_scheduled_unlock_epoch_sec(&self) -> i64 {
        self.schedule.last_fired_epoch_sec
    }

    /// `max(0, duration - elapsed)` for a running countdown, else 0.
    pub fn time_remaining_ms(&self, now_ms: u64) -> u64 {
        self.countdown.remaining_ms(now_ms)
    }

    /// Seconds until the next scheduled unlock; see [`ScheduleState::time_until_next_unlock`].
    pub fn time_until_next_scheduled_unlock(
        &self,
        now: Option<&DateTime<FixedOffset>>,
    ) -> Option<u64> {
        self.schedule.time_until_next_unlock(self.mode, now)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a countdown from `now_ms`, clearing any unconsumed trigger.
    pub fn start(&mut self, now_ms: u64, duration_ms: u64) {
        self.countdown = Countdown {
            start_ms: now_ms,
            duration_ms,
            running: true,
        };
        self.triggered = false;
    }

    pub fn stop(&mut self) {
        self.countdown.running = false;
        self.triggered = false;
    }

    /// True exactly once per expiry.
    pub fn consume_triggered(&mut self) -> bool {
        std::mem::take(&mut self.triggered)
    }

    /// Detect countdown expiry and schedule matches. Both may fire in the
    /// same tick.
    pub fn tick(&mut self, now_ms: u64, wall: Option<&DateTime<FixedOffset>>) -> Vec<TimerEvent> {
        let mut events = Vec::new();

        if self.countdown.running && self.countdown.remaining_ms(now_ms) == 0 {
            self.countdown.running = false;
            self.triggered = true;
            events.push(TimerEvent::CountdownExpired);
        }

        if self.mode.uses_schedule() && self.should_unlock_now(wall) {
            events.push(TimerEvent::ScheduledUnlock {
                unlock_duration_minutes: self.schedule.schedule.unlock_duration_minutes,
            });
        }

        events
    }

    /// See [`ScheduleState::should_unlock_now`]. Advances the watermark on `true`.
    pub fn should_unlock_now(&mut self, wall: Option<&DateTime<FixedOffset>>) -> bool {
        self.schedule.should_unlock_now(self.mode, wall)
    }

    pub fn set_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
    }

    pub fn set_interval_minutes(&mut self, minutes: u32) {
        self.interval_minutes = clamp_interval(minutes);
    }

    /// Add penalty minutes to the interval, capped at the maximum.
    pub fn add_penalty(&mut self, minutes: u32) {
        self.set_interval_minutes(self.interval_minutes.saturating_add(minutes));
    }

    /// Apply the mode policy after an unlock. Returns the new interval
    /// when the mode has one.
    pub fn apply_policy(&mut self, usage_count: u32) -> Option<u32> {
        let next = next_interval(self.mode, usage_count, self.interval_minutes)?;
        self.set_interval_minutes(next);
        Some(self.interval_minutes)
    }

    pub fn set_daily_schedule(
        &mut self,
        hour: u8,
        minute: u8,
        unlock_duration_minutes: u32,
    ) -> Result<(), ValidationError> {
        self.schedule.schedule = RecurringSchedule::daily(hour, minute, unlock_duration_minutes)?;
        Ok(())
    }

    pub fn set_weekly_schedule(
        &mut self,
        week_day: u8,
        hour: u8,
        minute: u8,
        unlock_duration_minutes: u32,
    ) -> Result<(), ValidationError> {
        self.schedule.schedule =
            RecurringSchedule::weekly(week_day, hour, minute, unlock_duration_minutes)?;
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Entries describing mode and interval.
    pub fn config_entries(&self) -> Vec<(&'static str, StoreValue)> {
        vec![
            (keys::TIMER_MODE, StoreValue::Int(self.mode.as_i64())),
            (keys::INTERVAL_MINUTES, StoreValue::Int(self.interval_minutes as i64)),
        ]
    }

    /// Entries describing the recurring schedule.
    pub fn schedule_entries(&self) -> Vec<(&'static str, StoreValue)> {
        let s = &self.schedule.schedule;
        vec![
            (keys::DAILY_HOUR, StoreValue::Int(s.hour as i64)),
            (keys::DAILY_MINUTE, StoreValue::Int(s.minute as i64)),
            (keys::WEEKLY_DAY, StoreValue::Int(s.week_day as i64)),
            (keys::UNLOCK_DURATION, StoreValue::Int(s.unlock_duration_minutes as i64)),
            (keys::SCHEDULE_ACTIVE, StoreValue::Bool(s.is_active)),
        ]
    }

    pub fn watermark_entry(&self) -> (&'static str, StoreValue) {
        (
            keys::LAST_SCHEDULED_UNLOCK,
            StoreValue::U64(self.schedule.last_fired_epoch_sec.max(0) as u64),
        )
    }

    /// Write every durable field.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        let mut entries = self.config_entries();
        entries.extend(self.schedule_entries());
        entries.push(self.watermark_entry());
        for (key, value) in entries {
            store.put(key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    const MIN: u64 = 60_000;

    #[test]
    fn countdown_expires_once() {
        let mut engine = TimerEngine::new(TimerMode::FixedInterval, 30);
        engine.start(0, engine.interval_ms());
        assert!(engine.tick(29 * MIN, None).is_empty());
        assert_eq!(engine.time_remaining_ms(29 * MIN), MIN);

        assert_eq!(engine.tick(30 * MIN, None), vec![TimerEvent::CountdownExpired]);
        assert!(!engine.is_running());
        assert!(engine.tick(31 * MIN, None).is_empty());

        assert!(engine.consume_triggered());
        assert!(!engine.consume_triggered());
    }

    #[test]
    fn remaining_is_zero_when_stopped() {
        let mut engine = TimerEngine::default();
        engine.start(1000, 10 * MIN);
        engine.stop();
        assert_eq!(engine.time_remaining_ms(2000), 0);
        assert!(engine.tick(20 * MIN, None).is_empty());
        assert!(!engine.consume_triggered());
    }

    #[test]
    fn start_clears_unconsumed_trigger() {
        let mut engine = TimerEngine::default();
        engine.start(0, 1000);
        engine.tick(1000, None);
        engine.start(1000, 1000);
        assert!(!engine.consume_triggered());
    }

    #[test]
    fn countdown_and_schedule_fire_in_same_tick() {
        let mut engine = TimerEngine::new(TimerMode::DailySchedule, 30);
        engine.set_daily_schedule(22, 0, 15).unwrap();
        engine.start(0, 5 * MIN);
        let wall = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, 22, 0, 0)
            .unwrap();
        let events = engine.tick(5 * MIN, Some(&wall));
        assert_eq!(
            events,
            vec![
                TimerEvent::CountdownExpired,
                TimerEvent::ScheduledUnlock { unlock_duration_minutes: 15 }
            ]
        );
    }

    #[test]
    fn penalty_and_policy_respect_bounds() {
        let mut engine = TimerEngine::new(TimerMode::CompleteQuit, 1430);
        engine.add_penalty(15);
        assert_eq!(engine.interval_minutes(), 1440);
        assert_eq!(engine.apply_policy(5), Some(1440));

        let mut schedule_mode = TimerEngine::new(TimerMode::WeeklySchedule, 30);
        assert_eq!(schedule_mode.apply_policy(5), None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let mut store = MemoryStore::new();
        let mut engine = TimerEngine::new(TimerMode::WeeklySchedule, 45);
        engine.set_weekly_schedule(5, 19, 30, 20).unwrap();
        engine.save(&mut store).unwrap();

        let loaded = TimerEngine::load(&store);
        assert_eq!(loaded.mode(), TimerMode::WeeklySchedule);
        assert_eq!(loaded.interval_minutes(), 45);
        assert_eq!(*loaded.schedule(), *engine.schedule());
    }

    #[test]
    fn load_from_empty_store_uses_defaults() {
        let store = MemoryStore::new();
        let engine = TimerEngine::load(&store);
        assert_eq!(engine.mode(), TimerMode::FixedInterval);
        assert_eq!(engine.interval_minutes(), DEFAULT_TIMER_MINUTES);
        assert!(!engine.schedule().is_active);
    }
}
