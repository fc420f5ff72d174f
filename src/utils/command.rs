//! Subprocess execution primitives with consistent error handling.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

/// Captured output from a child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

/// Run a program with captured output.
///
/// A missing binary maps to `tool.not_installed`; any other spawn failure
/// maps to `internal.io_error`. A nonzero exit is not an error here, the
/// caller decides what a failed exit means.
pub fn capture(program: &str, args: &[String], current_dir: Option<&Path>) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    let out = cmd.output().map_err(|e| spawn_error(program, e))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        success: out.status.success(),
        exit_code: out.status.code().unwrap_or(-1),
    })
}

/// Run a program and return trimmed stdout on success.
///
/// Returns an error with stderr (or stdout fallback) if the exit is nonzero.
pub fn run(program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        Error::internal_io(
            format!("Failed to run {}: {}", context, e),
            Some(context.to_string()),
        )
    })?;

    if !output.status.success() {
        return Err(Error::internal_io(
            format!("{} failed: {}", context, error_text(&output)),
            Some(context.to_string()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a program with inherited stdio, returning its exit code.
///
/// Used for child processes that talk to the user directly (browser login
/// flows, wrapped packaging commands).
pub fn run_interactive(program: &str, args: &[String], current_dir: Option<&Path>) -> Result<i32> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    let status = cmd.status().map_err(|e| spawn_error(program, e))?;

    Ok(status.code().unwrap_or(-1))
}

fn spawn_error(program: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::tool_not_installed(program)
    } else {
        Error::internal_io(
            format!("Failed to run {}: {}", program, e),
            Some(program.to_string()),
        )
    }
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reports_exit_code() {
        let out = capture("sh", &["-c".to_string(), "exit 3".to_string()], None).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn capture_missing_binary_is_tool_not_installed() {
        let err = capture("imprint-no-such-binary", &[], None).unwrap_err();
        assert_eq!(err.code.as_str(), "tool.not_installed");
    }

    #[test]
    fn run_returns_trimmed_stdout() {
        let result = run("echo", &["hello"], "echo test");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"stderr content".to_vec(),
        };
        assert_eq!(error_text(&output), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"".to_vec(),
        };
        assert_eq!(error_text(&output), "stdout content");
    }
}
