//! Integration tests for state that must survive a power cycle.
//!
//! Each test boots a controller on an SQLite file, drops it, and boots a
//! second controller on the same file with the uptime clock reset.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use quitbox_core::hardware::{MemoryDisplay, SimulatedServo};
use quitbox_core::settings::ServoCalibration;
use quitbox_core::storage::keys;
use quitbox_core::{
    BoxState, Cause, Config, ConfigUpdate, Controller, Event, Hardware, KeyValueStore, ManualClock,
    ScheduleUpdate, SqliteStore, StoreValue, TimerMode,
};
use tempfile::TempDir;

const MIN_MS: u64 = 60_000;

fn boot_at(path: &Path, clock: &ManualClock) -> Controller {
    Controller::boot(
        Box::new(SqliteStore::open_at(path).unwrap()),
        Arc::new(clock.clone()),
        Config::default(),
        Hardware {
            actuator: Box::new(SimulatedServo::new(ServoCalibration::default())),
            display: Box::new(MemoryDisplay::default()),
        },
    )
    .unwrap()
}

fn open_daily_window(path: &Path, clock: &ManualClock) -> Controller {
    clock.set_wall_clock(Utc.with_ymd_and_hms(2026, 3, 2, 21, 59, 30).unwrap());
    let mut c = boot_at(path, clock);
    c.set_config(ConfigUpdate {
        timer_mode: Some(TimerMode::DailySchedule),
        schedule: Some(ScheduleUpdate {
            hour: 22,
            minute: 0,
            week_day: None,
            unlock_duration_minutes: 30,
        }),
        ..Default::default()
    })
    .unwrap();
    c.lock();
    clock.advance_ms(30_000);
    c.tick();
    assert_eq!(c.state(), BoxState::Unlocked);
    c
}

#[test]
fn test_fresh_box_boots_unlocked() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let c = boot_at(&dir.path().join("box.db"), &clock);
    assert_eq!(c.state(), BoxState::Unlocked);
    assert!(!c.engine().is_running());
}

#[test]
fn test_lockout_resumes_from_wall_clock_deadline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();
    clock.set_wall_clock(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap());

    let mut c = boot_at(&path, &clock);
    c.lock();
    clock.advance_ms(10 * MIN_MS);
    c.flush();
    drop(c);

    // Powered off for five minutes.
    clock.advance_ms(5 * MIN_MS);
    clock.set_uptime_ms(0);
    let c = boot_at(&path, &clock);

    assert_eq!(c.state(), BoxState::Locked);
    assert!(c.engine().is_running());
    assert_eq!(c.engine().time_remaining_ms(0), 15 * MIN_MS);
}

#[test]
fn test_lockout_past_deadline_unlocks_on_first_tick() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();
    clock.set_wall_clock(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap());

    let mut c = boot_at(&path, &clock);
    c.lock();
    drop(c);

    clock.advance_ms(45 * MIN_MS);
    clock.set_uptime_ms(0);
    let mut c = boot_at(&path, &clock);
    assert_eq!(c.state(), BoxState::Locked);

    c.tick();
    assert_eq!(c.state(), BoxState::Unlocked);
    assert_eq!(c.progress().total_cigarettes, 1);
}

#[test]
fn test_lockout_resumes_from_flushed_remainder_without_wall_clock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();

    let mut c = boot_at(&path, &clock);
    c.lock();
    clock.advance_ms(10 * MIN_MS);
    c.flush();
    drop(c);

    clock.set_uptime_ms(0);
    let c = boot_at(&path, &clock);
    assert_eq!(c.state(), BoxState::Locked);
    assert_eq!(c.engine().time_remaining_ms(0), 20 * MIN_MS);
}

#[test]
fn test_weekly_schedule_survives_reboot_and_does_not_refire() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();
    // Monday.
    clock.set_wall_clock(Utc.with_ymd_and_hms(2026, 3, 2, 7, 29, 30).unwrap());

    let mut c = boot_at(&path, &clock);
    c.set_config(ConfigUpdate {
        timer_mode: Some(TimerMode::WeeklySchedule),
        schedule: Some(ScheduleUpdate {
            hour: 7,
            minute: 30,
            week_day: Some(1),
            unlock_duration_minutes: 45,
        }),
        ..Default::default()
    })
    .unwrap();
    c.lock();
    clock.advance_ms(30_000);
    let events = c.tick();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ScheduledUnlock { unlock_duration_minutes: 45, .. })));
    assert_eq!(c.state(), BoxState::Unlocked);
    drop(c);

    clock.advance_ms(10_000);
    clock.set_uptime_ms(0);
    let mut c = boot_at(&path, &clock);
    assert_eq!(c.engine().mode(), TimerMode::WeeklySchedule);
    let schedule = *c.engine().schedule();
    assert_eq!((schedule.week_day, schedule.hour, schedule.minute), (1, 7, 30));
    assert_eq!(schedule.unlock_duration_minutes, 45);
    assert!(schedule.is_active);

    let events = c.tick();
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::ScheduledUnlock { .. })));
    // Next Monday.
    assert_eq!(c.get_status().next_unlock, Some(7 * 86_400 - 10));
}

#[test]
fn test_progress_and_settings_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();

    let mut c = boot_at(&path, &clock);
    c.set_setting(keys::CURRENCY, "USD").unwrap();
    c.set_setting(keys::CIGARETTE_COST, "0.75").unwrap();
    c.lock();
    clock.advance_ms(30 * MIN_MS);
    c.tick();
    c.lock();
    c.emergency_unlock().unwrap();
    drop(c);

    clock.set_uptime_ms(0);
    let c = boot_at(&path, &clock);
    let status = c.get_status();
    assert_eq!(status.total_cigarettes, 1);
    assert_eq!(status.emergency_count, 1);
    assert_eq!(status.currency, "USD");
    assert!((status.money_saved - 0.75).abs() < 1e-9);
    assert_eq!(c.engine().interval_minutes(), 45);
    assert_eq!(c.state(), BoxState::Unlocked);
}

#[test]
fn test_reset_clears_the_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();

    let mut c = boot_at(&path, &clock);
    c.set_setting(keys::CURRENCY, "USD").unwrap();
    c.lock();
    c.reset_progress().unwrap();
    drop(c);

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(store.get(keys::CURRENCY).unwrap(), None);
    assert_eq!(
        store.get(keys::CURRENT_STATE).unwrap(),
        Some(StoreValue::Int(BoxState::Unlocked.as_i64()))
    );
}

#[test]
fn test_unlock_window_resumes_after_reboot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();

    let c = open_daily_window(&path, &clock);
    clock.advance_ms(10 * MIN_MS);
    drop(c);

    // Off for five minutes, fifteen left in the window.
    clock.advance_ms(5 * MIN_MS);
    clock.set_uptime_ms(0);
    let mut c = boot_at(&path, &clock);
    assert_eq!(c.state(), BoxState::Unlocked);

    clock.advance_ms(15 * MIN_MS - 1000);
    c.tick();
    assert_eq!(c.state(), BoxState::Unlocked);

    clock.advance_ms(1000);
    let events = c.tick();
    assert_eq!(c.state(), BoxState::Locked);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::StateChanged {
            to: BoxState::Locked,
            cause: Cause::UnlockWindowClosed,
            ..
        }
    )));
}

#[test]
fn test_unlock_window_closed_while_off_relocks_on_first_tick() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("box.db");
    let clock = ManualClock::new();

    let c = open_daily_window(&path, &clock);
    drop(c);

    clock.advance_ms(40 * MIN_MS);
    clock.set_uptime_ms(0);
    let mut c = boot_at(&path, &clock);
    assert_eq!(c.state(), BoxState::Unlocked);

    let events = c.tick();
    assert_eq!(c.state(), BoxState::Locked);
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::ScheduledUnlock { .. })));
    drop(c);

    // The closed window is not resumed again.
    clock.set_uptime_ms(0);
    let c = boot_at(&path, &clock);
    assert_eq!(c.state(), BoxState::Locked);
}
