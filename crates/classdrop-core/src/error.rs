//! Error types module
//!
//! Every failure the upload core can report is an [`UploadError`]. Its
//! [`ErrorKind`] is what callers branch on; the [`TaskError`] value derived from
//! it is what gets stored on a rejected or failed task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like validation rejections
    Debug,
    /// Warning level - for runtime failures of a single task
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the caller.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "FILE_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether an explicit re-submission of the same file may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the end user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Human message rendered next to the task
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Error taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    CapacityExceeded,
    FileTooLarge,
    UnsupportedType,
    UnknownRole,
    GrantDenied,
    Network,
    Transport,
    GrantExpired,
    Cancelled,
    ProcessingFailed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::FileTooLarge => "file_too_large",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::UnknownRole => "unknown_role",
            ErrorKind::GrantDenied => "grant_denied",
            ErrorKind::Network => "network",
            ErrorKind::Transport => "transport",
            ErrorKind::GrantExpired => "grant_expired",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ProcessingFailed => "processing_failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    #[error("Capacity exceeded: {attempted} files would exceed the session limit of {limit}")]
    CapacityExceeded { limit: usize, attempted: usize },

    #[error("File too large: {name} is {size_bytes} bytes, limit is {max_bytes} bytes")]
    FileTooLarge {
        name: String,
        size_bytes: u64,
        max_bytes: u64,
    },

    #[error("Unsupported file type: {name} ({extension})")]
    UnsupportedType { name: String, extension: String },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Upload grant denied with status {status}: {message}")]
    GrantDenied { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upload grant expired at {expires_at}")]
    GrantExpired { expires_at: DateTime<Utc> },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        UploadError::CapacityExceeded { .. } => (
            "CAPACITY_EXCEEDED",
            false,
            Some("Submit fewer files or start a new session"),
            LogLevel::Debug,
        ),
        UploadError::FileTooLarge { .. } => (
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size and try again"),
            LogLevel::Debug,
        ),
        UploadError::UnsupportedType { .. } => (
            "UNSUPPORTED_TYPE",
            false,
            Some("Convert the file to an allowed format"),
            LogLevel::Debug,
        ),
        UploadError::UnknownRole(_) => ("UNKNOWN_ROLE", false, None, LogLevel::Warn),
        UploadError::GrantDenied { .. } => (
            "GRANT_DENIED",
            false,
            Some("Check your permissions or sign in again"),
            LogLevel::Warn,
        ),
        UploadError::Network(_) => (
            "NETWORK_ERROR",
            true,
            Some("Check your connection and retry"),
            LogLevel::Warn,
        ),
        UploadError::Transport(_) => (
            "TRANSPORT_ERROR",
            true,
            Some("Retry the upload"),
            LogLevel::Warn,
        ),
        UploadError::GrantExpired { .. } => (
            "GRANT_EXPIRED",
            true,
            Some("Retry the upload to obtain a fresh grant"),
            LogLevel::Warn,
        ),
        UploadError::Cancelled => ("CANCELLED", true, None, LogLevel::Debug),
        UploadError::ProcessingFailed(_) => (
            "PROCESSING_FAILED",
            true,
            Some("Retry the upload or contact support if this persists"),
            LogLevel::Warn,
        ),
    }
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            UploadError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            UploadError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            UploadError::UnknownRole(_) => ErrorKind::UnknownRole,
            UploadError::GrantDenied { .. } => ErrorKind::GrantDenied,
            UploadError::Network(_) => ErrorKind::Network,
            UploadError::Transport(_) => ErrorKind::Transport,
            UploadError::GrantExpired { .. } => ErrorKind::GrantExpired,
            UploadError::Cancelled => ErrorKind::Cancelled,
            UploadError::ProcessingFailed(_) => ErrorKind::ProcessingFailed,
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::CapacityExceeded { limit, attempted } => format!(
                "You can upload at most {} files per session ({} requested)",
                limit, attempted
            ),
            UploadError::FileTooLarge {
                name, max_bytes, ..
            } => format!(
                "{} exceeds the maximum allowed size of {} MB",
                name,
                max_bytes / 1024 / 1024
            ),
            UploadError::UnsupportedType { name, extension } => {
                if extension.is_empty() {
                    format!("{} has no file extension", name)
                } else {
                    format!("{} files are not allowed ({})", extension, name)
                }
            }
            UploadError::UnknownRole(role) => format!("Unknown role: {}", role),
            UploadError::GrantDenied { status, message } => {
                format!("Upload was not authorized ({}): {}", status, message)
            }
            UploadError::Network(msg) => format!("Could not reach the upload service: {}", msg),
            UploadError::Transport(msg) => format!("Upload to storage failed: {}", msg),
            UploadError::GrantExpired { .. } => "Upload link expired before use".to_string(),
            UploadError::Cancelled => "Upload cancelled".to_string(),
            UploadError::ProcessingFailed(msg) => format!("Processing failed: {}", msg),
        }
    }
}

/// Error value carried by a rejected or failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.to_string()
        } else {
            message
        };
        Self { kind, message }
    }
}

impl From<&UploadError> for TaskError {
    fn from(err: &UploadError) -> Self {
        TaskError::new(err.kind(), err.client_message())
    }
}

impl From<UploadError> for TaskError {
    fn from(err: UploadError) -> Self {
        TaskError::from(&err)
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
