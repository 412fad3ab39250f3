//! Password prompt port
//!
//! A prompt blocks the calling flow until the user answers or dismisses it.
//! The outcome type makes "password together with cancellation" unrepresentable.

use std::collections::VecDeque;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};

/// Answer to a password prompt
#[derive(Debug)]
pub enum PromptOutcome {
    Entered(Zeroizing<String>),
    Cancelled,
}

impl PromptOutcome {
    pub fn entered(password: impl Into<String>) -> Self {
        Self::Entered(Zeroizing::new(password.into()))
    }

    /// `(password, ok)` view of the outcome; the password is empty whenever ok is false
    pub fn into_parts(self) -> (Zeroizing<String>, bool) {
        match self {
            Self::Entered(password) => (password, true),
            Self::Cancelled => (Zeroizing::new(String::new()), false),
        }
    }

    /// Map cancellation to `Error::Cancelled` naming what the password was for
    pub fn into_result(self, for_what: &str) -> Result<Zeroizing<String>> {
        match self {
            Self::Entered(password) => Ok(password),
            Self::Cancelled => Err(Error::cancelled(for_what.to_string())),
        }
    }
}

/// Blocking password prompt
pub trait PasswordPrompt {
    fn get_password(&self, title: &str, for_what: &str, hint: Option<&str>) -> PromptOutcome;
}

/// One prompt as seen by a [`ScriptedPrompt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub title: String,
    pub for_what: String,
    pub hint: Option<String>,
}

/// Prompt that answers from a prepared script.
///
/// Used for non-interactive runs (password given on the command line) and in
/// tests. `None` entries answer with a cancellation; an exhausted script
/// cancels every further prompt.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    repeat: Option<String>,
    seen: Mutex<Vec<PromptRecord>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| a.map(Into::into)).collect()),
            repeat: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer every prompt with the same password
    pub fn always(password: impl Into<String>) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            repeat: Some(password.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, oldest first
    pub fn seen(&self) -> Vec<PromptRecord> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn get_password(&self, title: &str, for_what: &str, hint: Option<&str>) -> PromptOutcome {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(PromptRecord {
                title: title.to_string(),
                for_what: for_what.to_string(),
                hint: hint.map(str::to_string),
            });
        }

        let scripted = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front());

        match scripted {
            Some(Some(password)) => PromptOutcome::entered(password),
            Some(None) => PromptOutcome::Cancelled,
            None => match &self.repeat {
                Some(password) => PromptOutcome::entered(password.clone()),
                None => PromptOutcome::Cancelled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_never_carries_password() {
        let (password, ok) = PromptOutcome::Cancelled.into_parts();
        assert!(!ok);
        assert!(password.is_empty());
    }

    #[test]
    fn test_scripted_prompt_answers_in_order() {
        let prompt = ScriptedPrompt::new([Some("one"), None]);
        assert!(matches!(prompt.get_password("t", "a", None), PromptOutcome::Entered(p) if p.as_str() == "one"));
        assert!(matches!(prompt.get_password("t", "b", Some("pet")), PromptOutcome::Cancelled));
        // exhausted
        assert!(matches!(prompt.get_password("t", "c", None), PromptOutcome::Cancelled));

        let seen = prompt.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].hint.as_deref(), Some("pet"));
    }

    #[test]
    fn test_cancellation_maps_to_error() {
        let err = PromptOutcome::Cancelled.into_result("export key").unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }
}
