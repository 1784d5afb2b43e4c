//! Recurring unlock schedules.
//!
//! A schedule opens the box at a fixed local `hour:minute`, every day or on
//! one weekday. A persisted watermark (`last_fired_epoch_sec`) keeps the
//! schedule from firing twice inside its window.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use super::policy::TimerMode;
use crate::error::ValidationError;
use crate::limits::{MAX_TIMER_MINUTES, SECS_PER_DAY};

/// A match can only recur after the same `hour:minute` comes round again,
/// so the window check leaves one minute of slack for tick jitter.
const MATCH_SLACK_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringSchedule {
    pub hour: u8,
    pub minute: u8,
    /// 0 = Sunday. Only read in weekly mode.
    pub week_day: u8,
    pub unlock_duration_minutes: u32,
    pub is_active: bool,
}

impl Default for RecurringSchedule {
    fn default() -> Self {
        Self {
            hour: 0,
            minute: 0,
            week_day: 0,
            unlock_duration_minutes: 30,
            is_active: false,
        }
    }
}

impl RecurringSchedule {
    pub fn daily(hour: u8, minute: u8, unlock_duration_minutes: u32) -> Result<Self, ValidationError> {
        let schedule = Self {
            hour,
            minute,
            week_day: 0,
            unlock_duration_minutes,
            is_active: true,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn weekly(
        week_day: u8,
        hour: u8,
        minute: u8,
        unlock_duration_minutes: u32,
    ) -> Result<Self, ValidationError> {
        let schedule = Self {
            hour,
            minute,
            week_day,
            unlock_duration_minutes,
            is_active: true,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_range("hour", self.hour as i64, 0, 23)?;
        check_range("minute", self.minute as i64, 0, 59)?;
        check_range("weekDay", self.week_day as i64, 0, 6)?;
        check_range(
            "unlockDurationMinutes",
            self.unlock_duration_minutes as i64,
            1,
            MAX_TIMER_MINUTES as i64,
        )
    }

    /// Seconds from midnight to the target time.
    fn target_secs_of_day(&self) -> i64 {
        self.hour as i64 * 3600 + self.minute as i64 * 60
    }

    fn matches_minute(&self, now: &DateTime<FixedOffset>) -> bool {
        now.hour() == self.hour as u32 && now.minute() == self.minute as u32
    }
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Schedule configuration plus its firing watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub schedule: RecurringSchedule,
    /// Epoch seconds of the last scheduled unlock; 0 when never fired.
    pub last_fired_epoch_sec: i64,
}

impl ScheduleState {
    /// True when the box should open now. Fires at most once per window:
    /// a `true` result advances the watermark.
    ///
    /// Without a wall clock this is always `false`.
    pub fn should_unlock_now(
        &mut self,
        mode: TimerMode,
        now: Option<&DateTime<FixedOffset>>,
    ) -> bool {
        let (Some(now), Some(window)) = (now, mode.schedule_window_secs()) else {
            return false;
        };
        if !self.schedule.is_active || !self.schedule.matches_minute(now) {
            return false;
        }
        if mode == TimerMode::WeeklySchedule
            && now.weekday().num_days_from_sunday() != self.schedule.week_day as u32
        {
            return false;
        }

        let now_sec = now.timestamp();
        let fired_recently = self.last_fired_epoch_sec > 0
            && now_sec - self.last_fired_epoch_sec < window - MATCH_SLACK_SECS;
        if fired_recently {
            return false;
        }

        self.last_fired_epoch_sec = now_sec;
        true
    }

    /// Seconds until the next scheduled unlock. Pure: never touches the
    /// watermark. `None` without a wall clock, an active schedule, or a
    /// schedule mode.
    pub fn time_until_next_unlock(
        &self,
        mode: TimerMode,
        now: Option<&DateTime<FixedOffset>>,
    ) -> Option<u64> {
        let now = now?;
        if !self.schedule.is_active || !mode.uses_schedule() {
            return None;
        }

        let now_secs = now.num_seconds_from_midnight() as i64;
        let target = self.schedule.target_secs_of_day();

        let seconds = if mode == TimerMode::WeeklySchedule {
            let today = now.weekday().num_days_from_sunday() as i64;
            let mut day_offset = (self.schedule.week_day as i64 - today).rem_euclid(7);
            if day_offset == 0 && target < now_secs {
                day_offset = 7;
            }
            day_offset * SECS_PER_DAY + target - now_secs
        } else if target >= now_secs {
            target - now_secs
        } else {
            SECS_PER_DAY - now_secs + target
        };

        Some(seconds.max(0) as u64)
    }
}

/// Render seconds as `HH:MM:SS`, or `Nd HH:MM:SS` past a day.
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    fn daily_22() -> ScheduleState {
        ScheduleState {
            schedule: RecurringSchedule::daily(22, 0, 30).unwrap(),
            last_fired_epoch_sec: 0,
        }
    }

    #[test]
    fn daily_countdown_one_minute_before() {
        let state = daily_22();
        let now = at(2026, 3, 2, 21, 59, 0);
        assert_eq!(state.time_until_next_unlock(TimerMode::DailySchedule, Some(&now)), Some(60));
    }

    #[test]
    fn daily_countdown_wraps_to_tomorrow() {
        let state = daily_22();
        let now = at(2026, 3, 2, 22, 30, 0);
        assert_eq!(
            state.time_until_next_unlock(TimerMode::DailySchedule, Some(&now)),
            Some(86_400 - 1800)
        );
    }

    #[test]
    fn daily_fires_once_per_window() {
        let mut state = daily_22();
        let now = at(2026, 3, 2, 22, 0, 0);
        assert!(state.should_unlock_now(TimerMode::DailySchedule, Some(&now)));
        assert!(!state.should_unlock_now(TimerMode::DailySchedule, Some(&now)));
        assert!(!state.should_unlock_now(
            TimerMode::DailySchedule,
            Some(&at(2026, 3, 2, 22, 0, 45))
        ));
        assert!(state.should_unlock_now(
            TimerMode::DailySchedule,
            Some(&at(2026, 3, 3, 22, 0, 0))
        ));
    }

    #[test]
    fn daily_late_tick_next_day_still_fires() {
        let mut state = daily_22();
        assert!(state.should_unlock_now(TimerMode::DailySchedule, Some(&at(2026, 3, 2, 22, 0, 59))));
        assert!(state.should_unlock_now(TimerMode::DailySchedule, Some(&at(2026, 3, 3, 22, 0, 1))));
    }

    #[test]
    fn no_wall_clock_never_fires() {
        let mut state = daily_22();
        assert!(!state.should_unlock_now(TimerMode::DailySchedule, None));
        assert_eq!(state.time_until_next_unlock(TimerMode::DailySchedule, None), None);
        assert_eq!(state.last_fired_epoch_sec, 0);
    }

    #[test]
    fn inactive_or_interval_mode_never_fires() {
        let mut state = daily_22();
        let now = at(2026, 3, 2, 22, 0, 0);
        assert!(!state.should_unlock_now(TimerMode::FixedInterval, Some(&now)));
        state.schedule.is_active = false;
        assert!(!state.should_unlock_now(TimerMode::DailySchedule, Some(&now)));
    }

    #[test]
    fn weekly_countdown_same_day_before_time() {
        // 2026-03-02 is a Monday (weekday 1).
        let state = ScheduleState {
            schedule: RecurringSchedule::weekly(1, 18, 0, 60).unwrap(),
            last_fired_epoch_sec: 0,
        };
        let now = at(2026, 3, 2, 17, 0, 0);
        assert_eq!(state.time_until_next_unlock(TimerMode::WeeklySchedule, Some(&now)), Some(3600));
    }

    #[test]
    fn weekly_countdown_after_time_waits_a_week() {
        let state = ScheduleState {
            schedule: RecurringSchedule::weekly(1, 18, 0, 60).unwrap(),
            last_fired_epoch_sec: 0,
        };
        let now = at(2026, 3, 2, 19, 0, 0);
        assert_eq!(
            state.time_until_next_unlock(TimerMode::WeeklySchedule, Some(&now)),
            Some(7 * 86_400 - 3600)
        );
    }

    #[test]
    fn weekly_countdown_to_later_weekday() {
        // Monday 20:00 -> Wednesday 08:00
        let state = ScheduleState {
            schedule: RecurringSchedule::weekly(3, 8, 0, 60).unwrap(),
            last_fired_epoch_sec: 0,
        };
        let now = at(2026, 3, 2, 20, 0, 0);
        assert_eq!(
            state.time_until_next_unlock(TimerMode::WeeklySchedule, Some(&now)),
            Some(2 * 86_400 - 12 * 3600)
        );
    }

    #[test]
    fn weekly_fires_only_on_its_day() {
        let mut state = ScheduleState {
            schedule: RecurringSchedule::weekly(0, 10, 0, 60).unwrap(),
            last_fired_epoch_sec: 0,
        };
        assert!(!state.should_unlock_now(TimerMode::WeeklySchedule, Some(&at(2026, 3, 2, 10, 0, 0))));
        // 2026-03-08 is a Sunday.
        assert!(state.should_unlock_now(TimerMode::WeeklySchedule, Some(&at(2026, 3, 8, 10, 0, 0))));
        assert!(!state.should_unlock_now(TimerMode::WeeklySchedule, Some(&at(2026, 3, 8, 10, 0, 30))));
        assert!(state.should_unlock_now(TimerMode::WeeklySchedule, Some(&at(2026, 3, 15, 10, 0, 0))));
    }

    #[test]
    fn schedule_validation() {
        assert!(RecurringSchedule::daily(24, 0, 30).is_err());
        assert!(RecurringSchedule::daily(12, 60, 30).is_err());
        assert!(RecurringSchedule::weekly(7, 12, 0, 30).is_err());
        assert!(RecurringSchedule::daily(12, 0, 0).is_err());
    }

    #[test]
    fn format_duration_forms() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3661), "01:01:01");
        assert_eq!(format_duration(90_061), "1d 01:01:01");
    }
}
