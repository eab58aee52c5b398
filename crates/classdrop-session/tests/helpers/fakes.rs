//! In-memory collaborators for driving a session without a network.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use classdrop_core::{
    AuthToken, GrantProvider, GrantRequest, ProcessingEvent, ProcessingObserver, ProgressCallback,
    TaskStatus, Transfer, UploadError, UploadGrant, UploadTask,
};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const WRITE_SCHEME: &str = "memory://";

fn name_from_write_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Grants every request unless a denial is queued for the file name.
#[derive(Default)]
pub struct FakeGrants {
    calls: AtomicUsize,
    denials: Mutex<HashMap<String, usize>>,
    expired: Mutex<HashSet<String>>,
}

impl FakeGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny the next `times` requests for `name` with a 403.
    pub fn deny(self, name: &str, times: usize) -> Self {
        self.denials.lock().unwrap().insert(name.to_string(), times);
        self
    }

    /// Hand out an already expired grant for `name`.
    pub fn expire(self, name: &str) -> Self {
        self.expired.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GrantProvider for FakeGrants {
    async fn request_grant(
        &self,
        request: &GrantRequest,
        _auth: &AuthToken,
    ) -> Result<UploadGrant, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(remaining) = self.denials.lock().unwrap().get_mut(&request.file_name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(UploadError::GrantDenied {
                    status: 403,
                    message: format!("{} may not be written", request.file_name),
                });
            }
        }

        let expires_at = if self.expired.lock().unwrap().contains(&request.file_name) {
            Utc::now() - ChronoDuration::seconds(1)
        } else {
            Utc::now() + ChronoDuration::minutes(15)
        };

        Ok(UploadGrant {
            write_url: format!("{}{}/{}", WRITE_SCHEME, request.folder, request.file_name),
            public_url: format!("https://cdn.test/{}/{}", request.folder, request.file_name),
            expires_at,
        })
    }
}

/// Reports progress in quarter steps and returns the granted public URL.
pub struct FakeTransfer {
    step_delay: Duration,
    hang: HashSet<String>,
    fail: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransfer {
    pub fn new() -> Self {
        Self {
            step_delay: Duration::from_millis(1),
            hang: HashSet::new(),
            fail: HashSet::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Report 30% for `name` and then never finish.
    pub fn hang_on(mut self, name: &str) -> Self {
        self.hang.insert(name.to_string());
        self
    }

    /// Fail the write for `name` half way through.
    pub fn fail_on(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn upload(
        &self,
        _data: Bytes,
        _content_type: &str,
        grant: &UploadGrant,
        on_progress: ProgressCallback,
    ) -> Result<String, UploadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let name = name_from_write_url(&grant.write_url);
        on_progress(0.0);

        if self.hang.contains(name) {
            on_progress(30.0);
            std::future::pending::<()>().await;
        }

        for percent in [25.0, 50.0, 75.0] {
            tokio::time::sleep(self.step_delay).await;
            on_progress(percent);
            if percent == 50.0 && self.fail.contains(name) {
                return Err(UploadError::Transport("connection reset".to_string()));
            }
        }
        tokio::time::sleep(self.step_delay).await;
        on_progress(100.0);

        Ok(grant.public_url.clone())
    }
}

/// Emits `processing` then `completed`, or `failed` for configured names.
#[derive(Default)]
pub struct FakeProcessing {
    fail: HashSet<String>,
    hang: HashSet<String>,
    watched: AtomicUsize,
}

impl FakeProcessing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }

    /// Emit `processing` for `name` and then nothing more.
    pub fn hang_on(mut self, name: &str) -> Self {
        self.hang.insert(name.to_string());
        self
    }

    pub fn watched(&self) -> usize {
        self.watched.load(Ordering::SeqCst)
    }
}

impl ProcessingObserver for FakeProcessing {
    fn watch(&self, task: &UploadTask, _auth: &AuthToken) -> BoxStream<'static, ProcessingEvent> {
        assert_eq!(task.status, TaskStatus::Uploaded);
        assert!(task.requires_processing);
        self.watched.fetch_add(1, Ordering::SeqCst);

        if self.hang.contains(&task.name) {
            return stream::once(async { ProcessingEvent::Processing })
                .chain(stream::pending())
                .boxed();
        }

        let outcome = if self.fail.contains(&task.name) {
            ProcessingEvent::Failed {
                error: Some("transcoding failed".to_string()),
            }
        } else {
            ProcessingEvent::Completed
        };
        stream::iter(vec![ProcessingEvent::Processing, outcome]).boxed()
    }
}
