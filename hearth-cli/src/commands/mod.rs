//! CLI command implementations

pub mod accounts;
pub mod logs;
pub mod net;
pub mod plugin;
pub mod prompt;
pub mod status;

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::Password;
use hearth_core::{EntryPoint, LogEvent, LoggingService, OperationResult, ShellContext};
use serde::Serialize;

use crate::output;

/// Environment variable holding a non-interactive password
pub const PASSWORD_ENV: &str = "HEARTH_PASSWORD";

/// Store a failed command in the event log
///
/// Skipped when the log cannot be opened; the failure itself was already printed.
pub fn log_failure(command: &str, error: &anyhow::Error) {
    let Ok(hearth_dir) = get_hearth_dir() else {
        return;
    };
    if let Ok(log) = LoggingService::new(&hearth_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")) {
        let _ = log.log(
            LogEvent::new("command_failed")
                .with_operation(command)
                .with_error(error.to_string())
                .with_error_details(format!("{:?}", error)),
        );
    }
}

/// Get the hearth directory from environment or default
pub fn get_hearth_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("HEARTH_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".hearth"))
}

/// Open the shell context for a CLI invocation
pub fn get_context() -> Result<ShellContext> {
    let hearth_dir = get_hearth_dir()?;

    std::fs::create_dir_all(&hearth_dir)
        .with_context(|| format!("Failed to create hearth directory: {:?}", hearth_dir))?;

    ShellContext::new(&hearth_dir, EntryPoint::Cli).context("Failed to initialize hearth")
}

/// Get password from --password flag, HEARTH_PASSWORD env var, or prompt
pub fn get_password_or_prompt(password_flag: Option<String>, prompt: &str) -> Result<String> {
    // 1. Check --password flag first
    if let Some(p) = password_flag {
        return Ok(p);
    }

    // 2. Check HEARTH_PASSWORD environment variable
    if let Ok(p) = env::var(PASSWORD_ENV) {
        return Ok(p);
    }

    // 3. Prompt interactively
    let p = Password::new().with_prompt(prompt).interact()?;
    Ok(p)
}

/// Get a new password, asking twice when prompting
pub fn get_password_with_confirm(password_flag: Option<String>, prompt: &str) -> Result<String> {
    if let Some(p) = password_flag {
        return Ok(p);
    }

    let p = Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    Ok(p)
}

/// A failure that has already been shown to the user
///
/// `main` exits non-zero on it without printing again.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation failed")
    }
}

impl std::error::Error for Reported {}

/// Print the outcome of a named operation, as JSON or for a human
///
/// A failed operation is printed and returned as [`Reported`], so callers
/// still reach their shutdown path before the process exits non-zero.
pub fn report<T, F>(result: OperationResult<T>, json: bool, on_success: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return if result.success {
            Ok(())
        } else {
            Err(Reported.into())
        };
    }

    match (&result.data, result.user_message()) {
        (Some(data), _) if result.success => {
            on_success(data);
            Ok(())
        }
        (_, Some(message)) => {
            output::error(&message);
            Err(Reported.into())
        }
        _ => Err(Reported.into()),
    }
}
