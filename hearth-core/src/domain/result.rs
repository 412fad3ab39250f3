//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// `WrongPassword`, `NotFound`, `Cancelled` and `ResourceBusy` are recoverable:
/// the caller re-prompts, retries or abandons the single operation.
/// `StorageCorruption` is fatal to the operation on that one account only.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Wrong password for account {0}")]
    WrongPassword(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    #[error("Storage corruption: {0}")]
    StorageCorruption(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Node error: {0}")]
    Node(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a wrong password error for an account
    pub fn wrong_password(account: impl Into<String>) -> Self {
        Self::WrongPassword(account.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a cancelled error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a resource busy error
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::ResourceBusy(msg.into())
    }

    /// Create a storage corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::StorageCorruption(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the caller can sensibly retry or re-prompt
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::WrongPassword(_)
                | Self::NotFound(_)
                | Self::Cancelled(_)
                | Self::ResourceBusy(_)
                | Self::Validation(_)
        )
    }

    /// Short machine-readable kind, used in logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WrongPassword(_) => "wrong_password",
            Self::NotFound(_) => "not_found",
            Self::Cancelled(_) => "cancelled",
            Self::ResourceBusy(_) => "resource_busy",
            Self::StorageCorruption(_) => "storage_corruption",
            Self::Validation(_) => "validation",
            Self::Encryption(_) => "encryption",
            Self::Plugin(_) => "plugin",
            Self::Node(_) => "node",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with context, the shape failures take when shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a successful result with context
    pub fn ok_with_context(data: T, context: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: Some(context),
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }

    /// Wrap the outcome of a named operation on a named subject (account or plugin)
    pub fn for_operation(operation: &str, subject: &str, result: Result<T>) -> Self {
        let mut context = HashMap::new();
        context.insert("operation".to_string(), serde_json::json!(operation));
        context.insert("subject".to_string(), serde_json::json!(subject));
        match result {
            Ok(data) => Self::ok_with_context(data, context),
            Err(e) => {
                context.insert("kind".to_string(), serde_json::json!(e.kind()));
                Self::fail_with_context(e.to_string(), context)
            }
        }
    }

    /// One-line message for the user: "<operation> failed for <subject>: <error>"
    pub fn user_message(&self) -> Option<String> {
        let error = self.error.as_deref()?;
        let field = |key: &str| {
            self.context
                .as_ref()
                .and_then(|c| c.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        match (field("operation"), field("subject")) {
            (Some(op), Some(subject)) => Some(format!("{} failed for {}: {}", op, subject, error)),
            (Some(op), None) => Some(format!("{} failed: {}", op, error)),
            _ => Some(error.to_string()),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
        assert!(result.user_message().is_none());
    }

    #[test]
    fn test_from_result() {
        let err: Result<i32> = Err(Error::validation("bad input"));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Validation error"));
    }

    #[test]
    fn test_user_message_names_operation_and_subject() {
        let result: OperationResult<()> = OperationResult::for_operation(
            "export key",
            "0xabc",
            Err(Error::wrong_password("0xabc")),
        );
        assert!(!result.success);
        let msg = result.user_message().unwrap();
        assert!(msg.starts_with("export key failed for 0xabc"));
        assert_eq!(
            result.context.unwrap()["kind"],
            serde_json::json!("wrong_password")
        );
    }

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(Error::wrong_password("a").is_recoverable());
        assert!(Error::not_found("a").is_recoverable());
        assert!(Error::cancelled("a").is_recoverable());
        assert!(Error::busy("a").is_recoverable());
        assert!(!Error::corruption("a").is_recoverable());
    }
}
