use clap::Subcommand;
use quitbox_core::api::{ActionResponse, GrantResponse};
use quitbox_core::{BoxService, Controller};

use crate::common::{open_controller, print_json, CliResult};

#[derive(Subcommand)]
pub enum ControlAction {
    /// Print box status as JSON
    Status,
    /// Open the box without counting usage
    Unlock,
    /// Close the box and start the next lockout
    Lock,
    /// Spend one emergency unlock (adds a penalty to the next lockout)
    Emergency,
    /// Simulate a press of the physical button
    Button,
    /// Sweep the servo through both positions
    TestServo,
    /// Erase all counters and settings
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: ControlAction) -> CliResult {
    let mut controller = open_controller()?;

    match action {
        ControlAction::Status => print_json(&controller.get_status())?,
        ControlAction::Unlock => {
            let response = match controller.manual_unlock() {
                Ok(()) => ActionResponse::ok("Box unlocked"),
                Err(denial) => ActionResponse::denied(denial),
            };
            print_json(&response)?;
        }
        ControlAction::Lock => {
            let response = if controller.lock() {
                ActionResponse::ok("Box locked")
            } else {
                ActionResponse::ok("Box already locked")
            };
            print_json(&response)?;
        }
        ControlAction::Emergency => {
            let result = controller.emergency_unlock();
            print_json(&GrantResponse::from(result))?;
            if let Err(denial) = result {
                controller.flush();
                return Err(denial.into());
            }
        }
        ControlAction::Button => {
            controller.press_button();
            for event in controller.tick() {
                print_json(&event)?;
            }
        }
        ControlAction::Reset { yes } => {
            if !yes {
                return Err("refusing to reset without --yes".into());
            }
            controller.reset_progress()?;
            print_json(&ActionResponse::ok("Progress reset"))?;
        }
        ControlAction::TestServo => return test_servo(controller),
    }

    controller.flush();
    Ok(())
}

/// The sweep pauses between moves, so it runs on the async service,
/// which also flushes on shutdown.
fn test_servo(controller: Controller) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (service, _events, task) = BoxService::spawn(controller);
        let angles = service.test_servo_sweep().await;
        service.shutdown();
        task.await?;
        print_json(&serde_json::json!({ "success": true, "angles": angles }))
    })
}
