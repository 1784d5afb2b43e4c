use clap::{Subcommand, ValueEnum};
use quitbox_core::{ConfigUpdate, TimerMode};

use crate::common::{open_controller, print_json, CliResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    FixedInterval,
    GradualReduction,
    CompleteQuit,
    EmergencyOnly,
    DailySchedule,
    WeeklySchedule,
    CustomSchedule,
}

impl From<ModeArg> for TimerMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::FixedInterval => TimerMode::FixedInterval,
            ModeArg::GradualReduction => TimerMode::GradualReduction,
            ModeArg::CompleteQuit => TimerMode::CompleteQuit,
            ModeArg::EmergencyOnly => TimerMode::EmergencyOnly,
            ModeArg::DailySchedule => TimerMode::DailySchedule,
            ModeArg::WeeklySchedule => TimerMode::WeeklySchedule,
            ModeArg::CustomSchedule => TimerMode::CustomSchedule,
        }
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print timer configuration as JSON
    Show,
    /// Change mode, interval or daily limit
    Set {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Lockout length in minutes (1-1440)
        #[arg(long)]
        interval: Option<u32>,
        /// Daily cigarette limit (display only)
        #[arg(long)]
        daily_limit: Option<u32>,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    let mut controller = open_controller()?;

    match action {
        TimerAction::Show => print_json(&controller.get_config())?,
        TimerAction::Set {
            mode,
            interval,
            daily_limit,
        } => {
            let update = ConfigUpdate {
                timer_mode: mode.map(TimerMode::from),
                interval_minutes: interval,
                daily_limit,
                schedule: None,
            };
            print_json(&controller.set_config(update)?)?;
        }
    }

    controller.flush();
    Ok(())
}
