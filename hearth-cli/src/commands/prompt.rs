//! Terminal password prompt

use colored::Colorize;
use dialoguer::Password;
use hearth_core::ports::{PasswordPrompt, PromptOutcome};

/// Prompts on the terminal; cancels when stdin is not a terminal or input fails
pub struct DialoguerPrompt;

impl PasswordPrompt for DialoguerPrompt {
    fn get_password(&self, title: &str, for_what: &str, hint: Option<&str>) -> PromptOutcome {
        if atty::isnt(atty::Stream::Stdin) {
            return PromptOutcome::Cancelled;
        }

        eprintln!("{} {}", title.bold(), for_what.dimmed());
        if let Some(hint) = hint {
            eprintln!("  Hint: {}", hint.cyan());
        }

        match Password::new().with_prompt("Password").interact() {
            Ok(password) => PromptOutcome::entered(password),
            Err(_) => PromptOutcome::Cancelled,
        }
    }
}
