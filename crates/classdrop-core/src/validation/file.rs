//! Pre-flight checks for a batch of candidate files.
//!
//! The capacity check runs before any per-file check, and both run before any
//! network I/O, so no grant is ever requested for a file that cannot succeed.

use crate::error::UploadError;
use crate::models::{Policy, SourceFile};

/// Outcome of validating a whole batch.
#[derive(Debug, Clone)]
pub enum BatchDecision {
    /// The batch would push the session past its file limit. Nothing is accepted.
    Rejected(UploadError),
    /// Per-file verdicts in submission order.
    Evaluated(Vec<Result<(), UploadError>>),
}

/// Check one file's size and type against the policy.
pub fn validate_file(file: &SourceFile, policy: &Policy) -> Result<(), UploadError> {
    let size_bytes = file.size_bytes();
    if size_bytes > policy.max_file_size_bytes {
        return Err(UploadError::FileTooLarge {
            name: file.name.clone(),
            size_bytes,
            max_bytes: policy.max_file_size_bytes,
        });
    }

    let extension = file.extension();
    if !policy.allows_extension(&extension) {
        return Err(UploadError::UnsupportedType {
            name: file.name.clone(),
            extension,
        });
    }

    Ok(())
}

/// Validate a batch against the policy given the number of tasks already held.
pub fn validate_batch(
    files: &[SourceFile],
    policy: &Policy,
    current_task_count: usize,
) -> BatchDecision {
    let attempted = current_task_count + files.len();
    if attempted > policy.max_files_per_session {
        tracing::debug!(
            limit = policy.max_files_per_session,
            attempted,
            "Rejecting batch over session capacity"
        );
        return BatchDecision::Rejected(UploadError::CapacityExceeded {
            limit: policy.max_files_per_session,
            attempted,
        });
    }

    BatchDecision::Evaluated(
        files
            .iter()
            .map(|file| validate_file(file, policy))
            .collect(),
    )
}
