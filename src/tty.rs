//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Error, ErrorCode, Result};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn is_stdout_tty() -> bool {
    io::stdout().is_terminal()
}

pub fn prompt(message: &str) -> Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        Error::new(
            ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    Ok(line.trim().to_string())
}

pub fn prompt_password(message: &str) -> Result<String> {
    prompt(message)
}

/// Ask a yes/no question; anything other than y/yes counts as no.
pub fn confirm(message: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N]: ", message))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Print status message to stderr if running in a terminal.
pub fn status(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", message);
    }
}

// log_status! macro is defined in lib.rs (#[macro_export]) and available crate-wide.
