//! Fixed limits of the box firmware.

/// Shortest lockout the box accepts.
pub const MIN_TIMER_MINUTES: u32 = 1;
/// Longest lockout the box accepts (24 hours).
pub const MAX_TIMER_MINUTES: u32 = 1440;
/// Lockout used when nothing has been configured.
pub const DEFAULT_TIMER_MINUTES: u32 = 30;

/// Minutes added to the next interval per emergency grant.
pub const EMERGENCY_UNLOCK_PENALTY: u32 = 15;
pub const MAX_EMERGENCY_UNLOCKS_PER_DAY: u32 = 3;
/// Length of the uptime-based emergency window.
pub const EMERGENCY_WINDOW_MS: u64 = 86_400_000;

/// Minimum gatekeeper session length before an unlock may be granted.
pub const AI_EMERGENCY_DELAY_MINUTES: u32 = 10;
pub const AI_MIN_MESSAGES: u32 = 5;
/// Sessions older than this are expired.
pub const AI_MAX_SESSION_SECS: u64 = 1800;

pub const DEFAULT_DAILY_LIMIT: u32 = 10;
pub const DEFAULT_CIGARETTE_COST: f64 = 0.50;
pub const DEFAULT_PACK_COST: f64 = 10.00;
pub const DEFAULT_CIGARETTES_PER_PACK: u32 = 20;

pub const SERVO_LOCKED_ANGLE: u8 = 0;
pub const SERVO_UNLOCKED_ANGLE: u8 = 90;

pub const DISPLAY_UPDATE_INTERVAL_MS: u64 = 1000;

pub const SECS_PER_DAY: i64 = 86_400;
pub const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// Clamp a lockout length into the accepted range.
pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(MIN_TIMER_MINUTES, MAX_TIMER_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_interval_bounds() {
        assert_eq!(clamp_interval(0), MIN_TIMER_MINUTES);
        assert_eq!(clamp_interval(45), 45);
        assert_eq!(clamp_interval(5000), MAX_TIMER_MINUTES);
    }
}
