mod context;
mod format;

pub use context::ErrorContext;
pub use format::{format_error_chain, format_error_line};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Access to '{resource}' denied: {reason}")]
    AccessDenied { resource: String, reason: String },

    #[error("Locking protocol violated on '{resource}': {details}")]
    ProtocolViolation { resource: String, details: String },

    #[error(
        "Locks held by '{owner}' cannot be released while streams are open on {}",
        .resources.join(", ")
    )]
    OpenStreams { owner: String, resources: Vec<String> },

    #[error("Failed to manage snapshot of '{resource}': {details}")]
    Snapshot { resource: String, details: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LockError {
    pub(crate) fn access_denied(resource: impl ToString, reason: impl Into<String>) -> Self {
        LockError::AccessDenied {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol_violation(resource: impl ToString, details: impl Into<String>) -> Self {
        LockError::ProtocolViolation {
            resource: resource.to_string(),
            details: details.into(),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, LockError::AccessDenied { .. })
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, LockError::ProtocolViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
