//! Actuator and display seams.
//!
//! The controller drives hardware only through [`Actuator`] and
//! [`StatusDisplay`]. Host builds use the simulated servo and a display
//! that logs frames; tests use the shared-log variants to observe calls.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::HardwareError;
use crate::settings::ServoCalibration;
use crate::timer::{format_duration, TimerMode};

/// Lid latch.
pub trait Actuator: Send {
    fn init(&mut self) -> Result<(), HardwareError>;

    fn move_to(&mut self, angle: u8);

    /// Last commanded angle, `None` before the first move.
    fn position(&self) -> Option<u8>;

    fn calibration(&self) -> ServoCalibration;

    fn set_calibration(&mut self, calibration: ServoCalibration);

    /// Move to the locked angle unless already there.
    fn lock(&mut self) {
        let target = self.calibration().locked_angle;
        if self.position() != Some(target) {
            self.move_to(target);
        }
    }

    /// Move to the unlocked angle unless already there.
    fn unlock(&mut self) {
        let target = self.calibration().unlocked_angle;
        if self.position() != Some(target) {
            self.move_to(target);
        }
    }
}

/// Every angle a servo was commanded to, in order.
pub type MoveLog = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Default)]
pub struct SimulatedServo {
    calibration: ServoCalibration,
    angle: Option<u8>,
    log: MoveLog,
    fail_init: bool,
}

impl SimulatedServo {
    pub fn new(calibration: ServoCalibration) -> Self {
        Self {
            calibration,
            ..Default::default()
        }
    }

    /// A servo whose moves can be inspected through the returned log.
    pub fn with_log(calibration: ServoCalibration) -> (Self, MoveLog) {
        let servo = Self::new(calibration);
        let log = Arc::clone(&servo.log);
        (servo, log)
    }

    /// A servo that refuses to initialise.
    pub fn broken() -> Self {
        Self {
            fail_init: true,
            ..Default::default()
        }
    }
}

impl Actuator for SimulatedServo {
    fn init(&mut self) -> Result<(), HardwareError> {
        if self.fail_init {
            return Err(HardwareError::Actuator("servo did not respond".into()));
        }
        tracing::debug!("simulated servo attached");
        Ok(())
    }

    fn move_to(&mut self, angle: u8) {
        tracing::info!(angle, "servo move");
        self.angle = Some(angle);
        if let Ok(mut log) = self.log.lock() {
            log.push(angle);
        }
    }

    fn position(&self) -> Option<u8> {
        self.angle
    }

    fn calibration(&self) -> ServoCalibration {
        self.calibration
    }

    fn set_calibration(&mut self, calibration: ServoCalibration) {
        self.calibration = calibration;
    }
}

/// What the status display shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Setup { network_connected: bool },
    Countdown { remaining_seconds: u64 },
    Scheduled {
        mode: TimerMode,
        until_next_seconds: Option<u64>,
        hour: u8,
        minute: u8,
    },
    /// Locked with no countdown to show.
    Locked,
    Unlocked,
    Notice { message: String },
}

/// Characters per display line.
const LINE_WIDTH: usize = 21;

impl Screen {
    /// Text lines as laid out on the panel.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Screen::Setup { network_connected } => {
                if *network_connected {
                    vec!["SETUP MODE".into(), "WiFi: Connected".into(), "Connect to configure".into()]
                } else {
                    vec!["SETUP MODE".into(), "WiFi: Connecting...".into(), "Please wait...".into()]
                }
            }
            Screen::Countdown { remaining_seconds } => vec![
                "LOCKED".into(),
                format_duration(*remaining_seconds),
                "Time until unlock".into(),
            ],
            Screen::Scheduled {
                mode,
                until_next_seconds,
                hour,
                minute,
            } => {
                let title = match mode {
                    TimerMode::WeeklySchedule => "WEEKLY SCHEDULE",
                    TimerMode::CustomSchedule => "CUSTOM SCHEDULE",
                    _ => "DAILY SCHEDULE",
                };
                let countdown = match until_next_seconds {
                    Some(secs) if *secs > 86_400 => {
                        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
                    }
                    Some(secs) => format_duration(*secs),
                    None => "--:--:--".into(),
                };
                vec![
                    title.into(),
                    countdown,
                    "Until next unlock".into(),
                    format!("Schedule: {hour:02}:{minute:02}"),
                ]
            }
            Screen::Locked => vec!["LOCKED".into(), "Emergency only".into()],
            Screen::Unlocked => vec!["UNLOCKED".into(), "Box is ready".into()],
            Screen::Notice { message } => {
                let mut lines = vec!["NOTICE".to_string()];
                lines.extend(wrap(message, LINE_WIDTH));
                lines
            }
        }
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub trait StatusDisplay: Send {
    fn init(&mut self) -> Result<(), HardwareError>;
    fn render(&mut self, screen: &Screen);
}

/// Writes each frame to the log.
#[derive(Debug, Default)]
pub struct TracingDisplay;

impl StatusDisplay for TracingDisplay {
    fn init(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn render(&mut self, screen: &Screen) {
        tracing::debug!(lines = ?screen.lines(), "display");
    }
}

/// Every frame a display rendered, in order.
pub type FrameLog = Arc<Mutex<Vec<Screen>>>;

/// Keeps rendered frames in memory.
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    frames: FrameLog,
}

impl MemoryDisplay {
    pub fn with_log() -> (Self, FrameLog) {
        let display = Self::default();
        let log = Arc::clone(&display.frames);
        (display, log)
    }
}

impl StatusDisplay for MemoryDisplay {
    fn init(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn render(&mut self, screen: &Screen) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(screen.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_unlock_are_idempotent() {
        let (mut servo, log) = SimulatedServo::with_log(ServoCalibration::default());
        servo.lock();
        servo.lock();
        servo.unlock();
        servo.unlock();
        assert_eq!(*log.lock().unwrap(), vec![0, 90]);
    }

    #[test]
    fn calibration_changes_targets() {
        let (mut servo, log) = SimulatedServo::with_log(ServoCalibration {
            locked_angle: 10,
            unlocked_angle: 100,
        });
        servo.unlock();
        assert_eq!(servo.position(), Some(100));
        assert_eq!(*log.lock().unwrap(), vec![100]);
    }

    #[test]
    fn broken_servo_fails_init() {
        assert!(SimulatedServo::broken().init().is_err());
    }

    #[test]
    fn notice_wraps_long_messages() {
        let screen = Screen::Notice {
            message: "Emergency unlock limit reached for today".into(),
        };
        let lines = screen.lines();
        assert_eq!(lines[0], "NOTICE");
        assert!(lines[1..].iter().all(|l| l.len() <= LINE_WIDTH));
        assert_eq!(lines[1..].join(" "), "Emergency unlock limit reached for today");
    }

    #[test]
    fn scheduled_screen_shows_days_for_long_waits() {
        let screen = Screen::Scheduled {
            mode: TimerMode::WeeklySchedule,
            until_next_seconds: Some(2 * 86_400 + 3 * 3600),
            hour: 22,
            minute: 5,
        };
        assert_eq!(
            screen.lines(),
            vec!["WEEKLY SCHEDULE", "2d 3h", "Until next unlock", "Schedule: 22:05"]
        );
    }
}
