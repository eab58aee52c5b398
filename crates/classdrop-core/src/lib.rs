//! Classdrop Core Library
//!
//! This crate provides the domain models, error taxonomy, role policies, file
//! validation and configuration shared by the upload client and the session
//! orchestrator.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod policy;
pub mod traits;
pub mod validation;

// Re-export commonly used types
pub use config::{ClientConfig, ProcessingMode};
pub use error::{ErrorKind, ErrorMetadata, LogLevel, TaskError, UploadError};
pub use models::{
    AuthToken, GrantRequest, Policy, ProcessingEvent, Role, SourceFile, TaskStatus, Transition,
    UploadGrant, UploadTask,
};
pub use policy::resolve;
pub use traits::{GrantProvider, ProcessingObserver, ProgressCallback, Transfer};
pub use validation::{validate_batch, BatchDecision};
