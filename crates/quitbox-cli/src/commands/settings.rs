use clap::{Args, Subcommand};
use quitbox_core::storage::keys;

use crate::common::{open_controller, print_json, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print all device settings as JSON
    List,
    /// Calibrate the latch servo end positions (degrees, 0-180)
    Servo(ServoArgs),
    /// Networks that may or may not grant emergency unlocks
    Networks(NetworkArgs),
    /// Set any other device setting by its store key (e.g. "currency", "ai_personality")
    Set { key: String, value: String },
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("end").required(true).multiple(true).args(["locked", "unlocked"])))]
pub struct ServoArgs {
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=180))]
    pub locked: Option<u8>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=180))]
    pub unlocked: Option<u8>,
}

#[derive(Args)]
pub struct NetworkArgs {
    /// Replace the allow list (repeatable; an empty list allows any network)
    #[arg(long = "allow", value_name = "SSID")]
    pub allowed: Vec<String>,
    /// Replace the block list (repeatable)
    #[arg(long = "block", value_name = "SSID")]
    pub blocked: Vec<String>,
    /// Refuse emergency unlocks on open networks
    #[arg(long)]
    pub block_public: Option<bool>,
    /// Empty both lists before applying the above
    #[arg(long)]
    pub clear: bool,
}

impl NetworkArgs {
    /// Store writes for this invocation, in order.
    fn writes(&self) -> CliResult<Vec<(&'static str, String)>> {
        let mut writes = Vec::new();
        if self.clear || !self.allowed.is_empty() {
            writes.push((keys::ALLOWED_NETWORKS, serde_json::to_string(&self.allowed)?));
        }
        if self.clear || !self.blocked.is_empty() {
            writes.push((keys::BLOCKED_NETWORKS, serde_json::to_string(&self.blocked)?));
        }
        if let Some(block) = self.block_public {
            writes.push((keys::BLOCK_ON_PUBLIC, block.to_string()));
        }
        Ok(writes)
    }
}

pub fn run(action: SettingsAction) -> CliResult {
    let mut controller = open_controller()?;

    let writes = match action {
        SettingsAction::List => Vec::new(),
        SettingsAction::Servo(args) => {
            let mut writes = Vec::new();
            if let Some(angle) = args.locked {
                writes.push((keys::SERVO_LOCKED_POS, angle.to_string()));
            }
            if let Some(angle) = args.unlocked {
                writes.push((keys::SERVO_UNLOCKED_POS, angle.to_string()));
            }
            writes
        }
        SettingsAction::Networks(args) => {
            let writes = args.writes()?;
            if writes.is_empty() {
                return Err("nothing to change; pass --allow, --block, --block-public or --clear".into());
            }
            writes
        }
        SettingsAction::Set { key, value } => {
            controller.set_setting(&key, &value)?;
            controller.flush();
            println!("ok");
            return Ok(());
        }
    };

    for (key, value) in &writes {
        controller.set_setting(key, value)?;
    }
    controller.flush();
    print_json(controller.settings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        action: SettingsAction,
    }

    fn parse(args: &[&str]) -> Result<SettingsAction, clap::Error> {
        Cli::try_parse_from(std::iter::once("settings").chain(args.iter().copied()))
            .map(|cli| cli.action)
    }

    #[test]
    fn network_lists_are_written_as_json() {
        let Ok(SettingsAction::Networks(args)) =
            parse(&["networks", "--allow", "home", "--allow", "office", "--block-public", "true"])
        else {
            panic!("networks did not parse");
        };
        assert_eq!(
            args.writes().unwrap(),
            vec![
                (keys::ALLOWED_NETWORKS, r#"["home","office"]"#.to_string()),
                (keys::BLOCK_ON_PUBLIC, "true".to_string()),
            ]
        );
    }

    #[test]
    fn clear_empties_both_lists() {
        let Ok(SettingsAction::Networks(args)) = parse(&["networks", "--clear"]) else {
            panic!("networks did not parse");
        };
        assert_eq!(
            args.writes().unwrap(),
            vec![
                (keys::ALLOWED_NETWORKS, "[]".to_string()),
                (keys::BLOCKED_NETWORKS, "[]".to_string()),
            ]
        );
    }

    #[test]
    fn servo_needs_an_end() {
        assert!(parse(&["servo"]).is_err());
        assert!(parse(&["servo", "--locked", "200"]).is_err());
        assert!(matches!(
            parse(&["servo", "--locked", "10", "--unlocked", "100"]),
            Ok(SettingsAction::Servo(ServoArgs { locked: Some(10), unlocked: Some(100) }))
        ));
    }
}
