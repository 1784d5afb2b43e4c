//! Interactive gatekeeper session.
//!
//! Sessions live in memory, so the whole conversation runs inside one
//! process on the async service.

use std::io::{BufRead, Write};

use clap::Args;
use quitbox_core::api::{ChatResponse, GrantResponse};
use quitbox_core::{BoxService, ReflectionStep};

use crate::common::{open_controller, CliResult};

#[derive(Args)]
pub struct AiArgs {
    /// What is making you want to smoke
    #[arg(long)]
    pub trigger: String,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Chat(String),
    Reflect(String),
    Question,
    Answer(String),
    Status,
    Done,
    Abandon,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line.split_once(' ') {
        Some(("/answer", rest)) => Input::Answer(rest.trim().to_string()),
        Some(("/reflect", rest)) => Input::Reflect(rest.trim().to_string()),
        _ => match line {
            "" => Input::Empty,
            "/reflect" => Input::Reflect(String::new()),
            "/abandon" => Input::Abandon,
            "/question" => Input::Question,
            "/status" => Input::Status,
            "/done" => Input::Done,
            "/quit" | "/q" => Input::Quit,
            text => Input::Chat(text.to_string()),
        },
    }
}

const HELP: &str = "Type to chat. /reflect [trigger] (re)starts the reflection, /question shows \
its question, /answer <text> answers it, /status shows progress, /done asks for the unlock, \
/abandon ends the session without one, /quit leaves.";

pub fn run(args: AiArgs) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (service, _events, task) = BoxService::spawn(open_controller()?);
        let result = converse(&service, &args.trigger).await;
        service.shutdown();
        task.await?;
        result
    })
}

async fn converse(service: &BoxService, trigger: &str) -> CliResult {
    let session = service.start_ai_session(trigger).await?;
    println!(
        "Session {} started. Stay at least {} minutes.",
        session.session_id,
        session.min_duration_seconds / 60
    );
    println!("{HELP}");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };

        match parse_input(&line?) {
            Input::Empty => {}
            Input::Chat(message) => {
                let response = ChatResponse::from(service.ai_chat(&message).await);
                match response.turn {
                    Some(turn) => println!(
                        "{}\n  [{}s / {}s, {} messages]",
                        turn.reply, turn.elapsed_seconds, turn.required_seconds, turn.message_count
                    ),
                    None => println!("{}", response.reason.unwrap_or_default()),
                }
            }
            Input::Reflect(trigger) => {
                let step = service.start_reflection(&trigger, None).await?;
                println!("{}", step.text());
            }
            Input::Question => match service.reflection_question().await? {
                ReflectionStep::Question { index, text } => println!("Q{}: {text}", index + 1),
                ReflectionStep::Summary { text } => println!("{text}"),
            },
            Input::Answer(text) => {
                let turn = service.reflection_answer(&text).await?;
                println!("{}", turn.next.text());
            }
            Input::Status => {
                let status = service.status().await;
                println!(
                    "{}s elapsed, {} messages",
                    status.session_elapsed.unwrap_or(0),
                    status.message_count.unwrap_or(0)
                );
            }
            Input::Done => {
                let response = GrantResponse::from(service.complete_ai_session().await);
                println!("{}", serde_json::to_string_pretty(&response)?);
                if response.success {
                    break;
                }
            }
            Input::Abandon => {
                service.abandon_ai_session().await?;
                println!("Session abandoned. The box stays as it is.");
                break;
            }
            Input::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_chat() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/done"), Input::Done);
        assert_eq!(parse_input("/q"), Input::Quit);
        assert_eq!(parse_input("/answer it calms me"), Input::Answer("it calms me".into()));
        assert_eq!(parse_input("/reflect"), Input::Reflect(String::new()));
        assert_eq!(parse_input("/reflect so bored"), Input::Reflect("so bored".into()));
        assert_eq!(parse_input("/abandon"), Input::Abandon);
        assert_eq!(parse_input("I really want one"), Input::Chat("I really want one".into()));
    }
}
