pub mod fakes;

use classdrop_core::constants::MB;
use classdrop_core::{AuthToken, SourceFile, TaskStatus, UploadTask};
use classdrop_session::{SessionComponents, SessionConfig, SessionEvent, UploadSession};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use fakes::{FakeGrants, FakeProcessing, FakeTransfer};

/// Long enough that a healthy session always finishes first.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

pub struct TestSession {
    pub session: UploadSession,
    pub grants: Arc<FakeGrants>,
    pub transfer: Arc<FakeTransfer>,
    pub processing: Arc<FakeProcessing>,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        max_concurrent_transfers: 4,
        event_buffer: 4096,
    }
}

pub fn build_session(
    role: &str,
    grants: FakeGrants,
    transfer: FakeTransfer,
    processing: FakeProcessing,
    config: SessionConfig,
) -> TestSession {
    let grants = Arc::new(grants);
    let transfer = Arc::new(transfer);
    let processing = Arc::new(processing);
    let components = SessionComponents {
        grants: grants.clone(),
        transfer: transfer.clone(),
        processing: processing.clone(),
    };
    let session = UploadSession::new(role, AuthToken::new("test-token"), components, config)
        .expect("role should resolve");
    let events = session.subscribe();

    TestSession {
        session,
        grants,
        transfer,
        processing,
        events,
    }
}

pub fn student_session() -> TestSession {
    build_session(
        "student",
        FakeGrants::new(),
        FakeTransfer::new(),
        FakeProcessing::new(),
        test_config(),
    )
}

/// A file of `size_mb` megabytes (fractional sizes allowed).
pub fn file(name: &str, size_mb: f64) -> SourceFile {
    let len = (size_mb * MB as f64) as usize;
    SourceFile::new(name, "", vec![0u8; len])
}

pub fn small(name: &str) -> SourceFile {
    SourceFile::new(name, "", vec![1u8; 64])
}

pub async fn settle(session: &UploadSession) {
    tokio::time::timeout(TEST_DEADLINE, session.wait_until_terminal())
        .await
        .expect("session did not settle in time");
}

/// Drain everything published so far, grouping task updates by id.
pub fn drain_updates(events: &mut broadcast::Receiver<SessionEvent>) -> (HashMap<Uuid, Vec<UploadTask>>, Vec<SessionEvent>) {
    let mut per_task: HashMap<Uuid, Vec<UploadTask>> = HashMap::new();
    let mut other = Vec::new();
    loop {
        match events.try_recv() {
            Ok(SessionEvent::TaskUpdated(task)) => per_task.entry(task.id).or_default().push(task),
            Ok(event) => other.push(event),
            Err(broadcast::error::TryRecvError::Empty) => break,
            Err(e) => panic!("event stream broken: {e}"),
        }
    }
    (per_task, other)
}

/// Wait until `id` is uploading with some progress reported.
pub async fn wait_for_progress(events: &mut broadcast::Receiver<SessionEvent>, id: Uuid) {
    tokio::time::timeout(TEST_DEADLINE, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::TaskUpdated(task))
                    if task.id == id
                        && task.status == TaskStatus::Uploading
                        && task.progress_percent > 0.0 =>
                {
                    return
                }
                Ok(_) => continue,
                Err(e) => panic!("event stream broken: {e}"),
            }
        }
    })
    .await
    .expect("task never reported progress");
}

/// Poll the snapshot until `id` satisfies `done`.
pub async fn wait_for_task(
    session: &UploadSession,
    id: Uuid,
    done: impl Fn(&UploadTask) -> bool,
) -> UploadTask {
    tokio::time::timeout(TEST_DEADLINE, async {
        loop {
            if let Some(task) = session.task(id).filter(|t| done(t)) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("task never reached the expected state")
}
