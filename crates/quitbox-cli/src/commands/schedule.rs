use clap::Subcommand;
use quitbox_core::timer::format_duration;
use quitbox_core::{ConfigUpdate, ScheduleUpdate, TimerMode};

use crate::common::{open_controller, parse_weekday, print_json, CliResult};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Show the schedule and the time until the next unlock
    Show,
    /// Unlock every day at HOUR:MINUTE
    Daily {
        hour: u8,
        minute: u8,
        /// Minutes the box stays open
        #[arg(long, default_value = "30")]
        duration: u32,
    },
    /// Unlock once a week on DAY (0 = Sunday, or a name) at HOUR:MINUTE
    Weekly {
        #[arg(value_parser = parse_weekday)]
        day: u8,
        hour: u8,
        minute: u8,
        /// Minutes the box stays open
        #[arg(long, default_value = "30")]
        duration: u32,
    },
}

pub fn run(action: ScheduleAction) -> CliResult {
    let mut controller = open_controller()?;

    let update = match action {
        ScheduleAction::Show => {
            let status = controller.get_status();
            let config = controller.get_config();
            print_json(&serde_json::json!({
                "timerMode": config.timer_mode,
                "schedule": config.schedule,
                "nextUnlockSeconds": status.next_unlock,
                "nextUnlockIn": status.next_unlock.map(format_duration),
            }))?;
            return Ok(());
        }
        ScheduleAction::Daily {
            hour,
            minute,
            duration,
        } => ConfigUpdate {
            timer_mode: Some(TimerMode::DailySchedule),
            schedule: Some(ScheduleUpdate {
                hour,
                minute,
                week_day: None,
                unlock_duration_minutes: duration,
            }),
            ..Default::default()
        },
        ScheduleAction::Weekly {
            day,
            hour,
            minute,
            duration,
        } => ConfigUpdate {
            timer_mode: Some(TimerMode::WeeklySchedule),
            schedule: Some(ScheduleUpdate {
                hour,
                minute,
                week_day: Some(day),
                unlock_duration_minutes: duration,
            }),
            ..Default::default()
        },
    };

    print_json(&controller.set_config(update)?)?;
    controller.flush();
    Ok(())
}
