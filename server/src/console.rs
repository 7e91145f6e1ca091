//! Operator console: start/stop the round and inspect the player count from stdin

use crate::network::{ControlError, ServerHandle};
use log::info;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    Stop,
    Players,
    Help,
    Quit,
}

pub const HELP: &str = "commands: start | stop | players | help | quit";

pub fn parse_operator_command(line: &str) -> Option<OperatorCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => Some(OperatorCommand::Start),
        "stop" | "x" => Some(OperatorCommand::Stop),
        "players" | "p" => Some(OperatorCommand::Players),
        "help" | "?" => Some(OperatorCommand::Help),
        "quit" | "exit" | "q" => Some(OperatorCommand::Quit),
        _ => None,
    }
}

/// Executes one command, returning the text shown to the operator
pub async fn execute(handle: &ServerHandle, command: OperatorCommand) -> String {
    let result = match command {
        OperatorCommand::Start => handle
            .start_round()
            .await
            .map(|_| "Round started".to_string()),
        OperatorCommand::Stop => handle
            .stop_round()
            .await
            .map(|_| "Round stopped".to_string()),
        OperatorCommand::Players => handle
            .player_count()
            .await
            .map(|count| format!("Connected players: {}", count)),
        OperatorCommand::Help => Ok(HELP.to_string()),
        OperatorCommand::Quit => {
            handle.shutdown();
            Ok("Shutting down".to_string())
        }
    };

    result.unwrap_or_else(|e: ControlError| format!("Rejected: {}", e))
}

/// Runs operator commands until `quit` or the input closes
pub async fn run_console(handle: ServerHandle, mut lines: mpsc::UnboundedReceiver<String>) {
    println!("{}", HELP);

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }

        match parse_operator_command(&line) {
            Some(command) => {
                println!("{}", execute(&handle, command).await);
                if command == OperatorCommand::Quit {
                    return;
                }
            }
            None => println!("Unknown command {:?}; {}", line.trim(), HELP),
        }
    }

    info!("Operator console closed");
}
