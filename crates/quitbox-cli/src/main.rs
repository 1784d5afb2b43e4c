use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "quitbox", version, about = "QuitBox controller CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Control(commands::control::ControlAction),
    /// Timer mode and lockout interval
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Recurring unlock schedule
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Device settings stored on the box
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Host configuration file
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Talk to the AI gatekeeper to earn an emergency unlock
    Ai(commands::ai::AiArgs),
    /// Run the control loop; Enter presses the button, `q` quits
    Run,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUITBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Control(action) => commands::control::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Ai(args) => commands::ai::run(args),
        Commands::Run => commands::run::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
