//! Binary entrypoint that launches the chat agent server.

use std::process::ExitCode;

use chat_agent::start_chat_agent;

/// Load configuration, initialise logging and serve until Ctrl+C.
fn main() -> ExitCode {
    start_chat_agent::run()
}
