mod engine;
mod policy;
mod schedule;

pub use engine::{Countdown, TimerEngine, TimerEvent};
pub use policy::{next_interval, policy_interval, TimerMode};
pub use schedule::{format_duration, RecurringSchedule, ScheduleState};
