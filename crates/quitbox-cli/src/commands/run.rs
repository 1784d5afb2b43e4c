use std::io::BufRead;

use quitbox_core::BoxService;
use tokio::sync::mpsc;

use crate::common::{open_controller, CliResult};

/// Run the control loop in the foreground, printing events as JSON lines.
/// Each empty line on stdin is a button press; `q` or end of input stops.
pub fn run() -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (service, mut events, task) = BoxService::spawn(open_controller()?);

        let input = service.clone();
        let (quit_tx, mut quit_rx) = mpsc::unbounded_channel::<()>();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(l) if matches!(l.trim(), "q" | "quit") => break,
                    Ok(_) => input.press_button(),
                    Err(_) => break,
                }
            }
            let _ = quit_tx.send(());
        });

        tracing::info!("control loop running; Enter presses the button, q quits");
        loop {
            tokio::select! {
                Some(event) = events.recv() => println!("{}", serde_json::to_string(&event)?),
                _ = quit_rx.recv() => break,
            }
        }

        service.shutdown();
        task.await?;
        Ok(())
    })
}
