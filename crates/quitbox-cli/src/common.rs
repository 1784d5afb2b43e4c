//! Helpers shared by the CLI commands.

use std::error::Error;
use std::sync::Arc;

use quitbox_core::hardware::{SimulatedServo, TracingDisplay};
use quitbox_core::settings::ServoCalibration;
use quitbox_core::{Config, Controller, Hardware, SqliteStore, SystemClock};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Boot a controller on the local store and catch up on anything that
/// came due while no command was running.
pub fn open_controller() -> CliResult<Controller> {
    let config = Config::load_or_default();
    let store = SqliteStore::open()?;
    let clock = SystemClock::new(config.device.utc_offset_minutes);
    let hardware = Hardware {
        actuator: Box::new(SimulatedServo::new(ServoCalibration::default())),
        display: Box::new(TracingDisplay),
    };
    let mut controller = Controller::boot(Box::new(store), Arc::new(clock), config, hardware)?;
    for event in controller.tick() {
        tracing::info!(?event, "caught up");
    }
    Ok(controller)
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Weekday as 0 = Sunday, from a number or an English name.
pub fn parse_weekday(s: &str) -> Result<u8, String> {
    if let Ok(n) = s.parse::<u8>() {
        return if n <= 6 {
            Ok(n)
        } else {
            Err(format!("weekday {n} is outside 0..=6"))
        };
    }
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    let lower = s.to_lowercase();
    NAMES
        .iter()
        .position(|name| lower.starts_with(name))
        .map(|i| i as u8)
        .ok_or_else(|| format!("unknown weekday: {s}"))
}
