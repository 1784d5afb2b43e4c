//! Host configuration: loop timing, the network the box sits on, and the
//! remote AI endpoint. Box behaviour lives under `timer`, `schedule` and
//! `settings` instead.

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use quitbox_core::storage::EmergencyReset;
use quitbox_core::Config;

use crate::common::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the host configuration as JSON
    Show,
    /// Print one value by dotted path (e.g. "network.ssid")
    Get { key: String },
    /// Record which network the box is attached to
    Network(NetworkArgs),
    /// Control loop timing and the emergency window
    Device(DeviceArgs),
    /// Remote AI responder endpoint
    Ai(AiArgs),
    /// Restore defaults
    Reset,
}

#[derive(Args)]
#[command(group(ArgGroup::new("attachment").required(true).args(["ssid", "ap"])))]
pub struct NetworkArgs {
    /// Joined network
    #[arg(long)]
    pub ssid: Option<String>,
    /// Serving its own access point
    #[arg(long)]
    pub ap: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResetArg {
    Uptime,
    Calendar,
}

impl From<ResetArg> for EmergencyReset {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::Uptime => EmergencyReset::Uptime,
            ResetArg::Calendar => EmergencyReset::Calendar,
        }
    }
}

#[derive(Args)]
pub struct DeviceArgs {
    #[arg(long)]
    pub tick_ms: Option<u64>,
    #[arg(long)]
    pub flush_secs: Option<u64>,
    #[arg(long)]
    pub display_refresh_ms: Option<u64>,
    #[arg(long)]
    pub servo_settle_ms: Option<u64>,
    /// Local time offset from UTC, in minutes
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<i32>,
    /// When the daily emergency count starts over
    #[arg(long, value_enum)]
    pub emergency_reset: Option<ResetArg>,
}

#[derive(Args)]
pub struct AiArgs {
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

pub fn run(action: ConfigAction) -> CliResult {
    // Reset must work even when the file on disk no longer parses.
    let mut config = match action {
        ConfigAction::Reset => Config::default(),
        _ => Config::load()?,
    };
    match action {
        ConfigAction::Show => return print_json(&config),
        ConfigAction::Get { key } => {
            let value = config.get(&key).ok_or(format!("unknown key: {key}"))?;
            println!("{value}");
            return Ok(());
        }
        ConfigAction::Network(args) => {
            config.network.ap_mode = args.ap;
            config.network.ssid = args.ssid.unwrap_or_default();
        }
        ConfigAction::Device(args) => {
            let device = &mut config.device;
            if let Some(ms) = args.tick_ms {
                device.tick_interval_ms = ms;
            }
            if let Some(secs) = args.flush_secs {
                device.flush_interval_secs = secs;
            }
            if let Some(ms) = args.display_refresh_ms {
                device.display_refresh_ms = ms;
            }
            if let Some(ms) = args.servo_settle_ms {
                device.servo_settle_ms = ms;
            }
            if let Some(offset) = args.utc_offset {
                device.utc_offset_minutes = offset;
            }
            if let Some(reset) = args.emergency_reset {
                device.emergency_reset = reset.into();
            }
        }
        ConfigAction::Ai(args) => {
            if let Some(endpoint) = args.endpoint {
                config.ai.endpoint = endpoint;
            }
            if let Some(model) = args.model {
                config.ai.model = model;
            }
            if let Some(secs) = args.timeout_secs {
                config.ai.request_timeout_secs = secs;
            }
        }
        ConfigAction::Reset => {}
    }

    config.validate()?;
    config.save()?;
    print_json(&config)
}
