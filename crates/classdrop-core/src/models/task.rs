use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::constants::is_processable;
use crate::error::TaskError;
use crate::models::SourceFile;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Validating,
    Rejected,
    Granted,
    Uploading,
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Validating => write!(f, "validating"),
            TaskStatus::Rejected => write!(f, "rejected"),
            TaskStatus::Granted => write!(f, "granted"),
            TaskStatus::Uploading => write!(f, "uploading"),
            TaskStatus::Uploaded => write!(f, "uploaded"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Rejected | TaskStatus::Failed | TaskStatus::Completed
        )
    }

    /// Edges of the per-task state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Validating, Rejected)
                | (Validating, Granted)
                | (Granted, Uploading)
                | (Granted, Failed)
                | (Uploading, Uploaded)
                | (Uploading, Failed)
                | (Uploaded, Processing)
                | (Uploaded, Completed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    fn holds_public_url(&self) -> bool {
        matches!(
            self,
            TaskStatus::Uploaded | TaskStatus::Processing | TaskStatus::Completed
        )
    }
}

/// A state change requested for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Reject(TaskError),
    Grant,
    StartUpload,
    Progress(f64),
    FinishUpload { public_url: String },
    StartProcessing,
    Complete,
    Fail(TaskError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid task transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One file's journey from validation to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub category: String,
    pub status: TaskStatus,
    pub progress_percent: f64,
    pub public_url: Option<String>,
    pub error: Option<TaskError>,
    pub requires_processing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadTask {
    /// Create a task in `validating` for an accepted or about-to-be-rejected file.
    pub fn new(file: &SourceFile, category: impl Into<String>) -> Self {
        let now = Utc::now();
        let mime_type = file.effective_mime_type();
        Self {
            id: Uuid::new_v4(),
            requires_processing: is_processable(&file.name, &mime_type),
            name: file.name.clone(),
            size_bytes: file.size_bytes(),
            mime_type,
            category: category.into(),
            status: TaskStatus::Validating,
            progress_percent: 0.0,
            public_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition.
    ///
    /// Returns `Ok(true)` when the task changed and `Ok(false)` for progress
    /// reports that are stale (task no longer uploading) or not higher than the
    /// current value. Any edge outside the state machine is rejected.
    pub fn apply(&mut self, transition: Transition) -> Result<bool, InvalidTransition> {
        let next = match &transition {
            Transition::Progress(percent) => {
                if self.status != TaskStatus::Uploading || !percent.is_finite() {
                    return Ok(false);
                }
                let percent = percent.clamp(0.0, 100.0);
                if percent <= self.progress_percent {
                    return Ok(false);
                }
                self.progress_percent = percent;
                self.updated_at = Utc::now();
                return Ok(true);
            }
            Transition::Reject(_) => TaskStatus::Rejected,
            Transition::Grant => TaskStatus::Granted,
            Transition::StartUpload => TaskStatus::Uploading,
            Transition::FinishUpload { .. } => TaskStatus::Uploaded,
            Transition::StartProcessing => TaskStatus::Processing,
            Transition::Complete => TaskStatus::Completed,
            Transition::Fail(_) => TaskStatus::Failed,
        };

        let invalid = InvalidTransition {
            from: self.status,
            to: next,
        };
        if !self.status.can_transition_to(next) {
            return Err(invalid);
        }
        match (&transition, self.status) {
            (Transition::StartProcessing, _) if !self.requires_processing => return Err(invalid),
            (Transition::Complete, TaskStatus::Uploaded) if self.requires_processing => {
                return Err(invalid)
            }
            _ => {}
        }

        match transition {
            Transition::Reject(error) | Transition::Fail(error) => self.error = Some(error),
            Transition::StartUpload => self.progress_percent = 0.0,
            Transition::FinishUpload { public_url } => {
                self.progress_percent = 100.0;
                self.public_url = Some(public_url);
            }
            _ => {}
        }
        self.status = next;
        if !self.status.holds_public_url() {
            self.public_url = None;
        }
        self.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn task(name: &str) -> UploadTask {
        UploadTask::new(&SourceFile::new(name, "", vec![1u8; 8]), "assignment")
    }

    #[test]
    fn new_task_starts_validating() {
        let t = task("essay.pdf");
        assert_eq!(t.status, TaskStatus::Validating);
        assert_eq!(t.mime_type, "application/pdf");
        assert!(t.requires_processing);
        assert_eq!(t.size_bytes, 8);
        assert!(t.public_url.is_none());
    }

    #[test]
    fn happy_path_with_processing() {
        let mut t = task("essay.pdf");
        assert!(t.apply(Transition::Grant).unwrap());
        assert!(t.apply(Transition::StartUpload).unwrap());
        assert!(t.apply(Transition::Progress(40.0)).unwrap());
        assert!(t
            .apply(Transition::FinishUpload {
                public_url: "https://cdn/essay.pdf".to_string()
            })
            .unwrap());
        assert_eq!(t.progress_percent, 100.0);
        assert!(t.apply(Transition::StartProcessing).unwrap());
        assert!(t.apply(Transition::Complete).unwrap());
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.public_url.as_deref(), Some("https://cdn/essay.pdf"));
    }

    #[test]
    fn non_processable_task_completes_from_uploaded() {
        let mut t = task("photo.jpg");
        assert!(!t.requires_processing);
        t.apply(Transition::Grant).unwrap();
        t.apply(Transition::StartUpload).unwrap();
        t.apply(Transition::FinishUpload {
            public_url: "https://cdn/photo.jpg".to_string(),
        })
        .unwrap();
        assert!(t.apply(Transition::StartProcessing).is_err());
        assert!(t.apply(Transition::Complete).unwrap());
    }

    #[test]
    fn processable_task_cannot_skip_processing() {
        let mut t = task("essay.pdf");
        t.apply(Transition::Grant).unwrap();
        t.apply(Transition::StartUpload).unwrap();
        t.apply(Transition::FinishUpload {
            public_url: "https://cdn/essay.pdf".to_string(),
        })
        .unwrap();
        let err = t.apply(Transition::Complete).unwrap_err();
        assert_eq!(err.from, TaskStatus::Uploaded);
        assert_eq!(err.to, TaskStatus::Completed);
    }

    #[test]
    fn cannot_skip_granted_or_go_backwards() {
        let mut t = task("essay.pdf");
        assert!(t.apply(Transition::StartUpload).is_err());
        t.apply(Transition::Grant).unwrap();
        assert!(t.apply(Transition::Grant).is_err());
        assert!(t
            .apply(Transition::Reject(TaskError::new(ErrorKind::FileTooLarge, "big")))
            .is_err());
    }

    #[test]
    fn progress_is_monotonic_and_ignored_outside_uploading() {
        let mut t = task("essay.pdf");
        assert!(!t.apply(Transition::Progress(10.0)).unwrap());
        t.apply(Transition::Grant).unwrap();
        t.apply(Transition::StartUpload).unwrap();
        assert!(t.apply(Transition::Progress(30.0)).unwrap());
        assert!(!t.apply(Transition::Progress(20.0)).unwrap());
        assert_eq!(t.progress_percent, 30.0);
        assert!(t.apply(Transition::Progress(250.0)).unwrap());
        assert_eq!(t.progress_percent, 100.0);
    }

    #[test]
    fn non_finite_progress_is_ignored() {
        let mut t = task("essay.pdf");
        t.apply(Transition::Grant).unwrap();
        t.apply(Transition::StartUpload).unwrap();
        t.apply(Transition::Progress(12.0)).unwrap();

        assert!(!t.apply(Transition::Progress(f64::NAN)).unwrap());
        assert!(!t.apply(Transition::Progress(f64::INFINITY)).unwrap());
        assert_eq!(t.progress_percent, 12.0);
        assert!(t.apply(Transition::Progress(13.0)).unwrap());
    }

    #[test]
    fn failure_clears_public_url_and_records_error() {
        let mut t = task("essay.pdf");
        t.apply(Transition::Grant).unwrap();
        t.apply(Transition::StartUpload).unwrap();
        t.apply(Transition::FinishUpload {
            public_url: "https://cdn/essay.pdf".to_string(),
        })
        .unwrap();
        t.apply(Transition::StartProcessing).unwrap();
        t.apply(Transition::Fail(TaskError::new(
            ErrorKind::ProcessingFailed,
            "extraction failed",
        )))
        .unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert!(t.public_url.is_none());
        assert_eq!(t.error.as_ref().map(|e| e.kind), Some(ErrorKind::ProcessingFailed));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut t = task("virus.exe");
        t.apply(Transition::Reject(TaskError::new(
            ErrorKind::UnsupportedType,
            "nope",
        )))
        .unwrap();
        assert!(t.is_terminal());
        assert!(t.apply(Transition::Grant).is_err());
        assert!(t
            .apply(Transition::Fail(TaskError::new(ErrorKind::Cancelled, "x")))
            .is_err());
    }
}
