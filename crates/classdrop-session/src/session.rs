//! Upload session: the task registry plus the drivers that move accepted tasks
//! through grant, transfer and processing.
//!
//! Every accepted task gets its own driver future. A shared semaphore bounds
//! how many of them hold a transfer slot at once; a task waiting for a slot
//! stays in `granted`. Each driver races its work against a per-task
//! cancellation token, and whichever error ends the run is recorded on that
//! task only.

use chrono::Utc;
use classdrop_core::{
    resolve, validate_batch, AuthToken, BatchDecision, ErrorMetadata, GrantProvider, GrantRequest,
    LogLevel, Policy, ProcessingEvent, ProcessingObserver, ProgressCallback, SourceFile,
    TaskError, TaskStatus, Transfer, Transition, UploadError, UploadTask,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::registry::{TaskEntry, TaskRegistry};
use crate::SessionConfig;

/// External collaborators a session drives.
#[derive(Clone)]
pub struct SessionComponents {
    pub grants: Arc<dyn GrantProvider>,
    pub transfer: Arc<dyn Transfer>,
    pub processing: Arc<dyn ProcessingObserver>,
}

/// Change notifications published by a session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A task was created or changed; carries the task after the change.
    TaskUpdated(UploadTask),
    /// A whole batch was refused before any task was created.
    BatchRejected(TaskError),
    /// Every task in the session reached a terminal state.
    AllTerminal,
}

/// Outcome of one `submit` call.
#[derive(Clone, Debug, Default)]
pub struct SubmitReceipt {
    /// Tasks that passed validation and are being driven, in input order
    pub accepted: Vec<Uuid>,
    /// Tasks created directly in `rejected`
    pub rejected: Vec<Uuid>,
    /// Set when the batch as a whole was refused; no tasks were created
    pub batch_error: Option<TaskError>,
}

impl SubmitReceipt {
    pub fn task_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.accepted.iter().chain(self.rejected.iter())
    }
}

struct SessionInner {
    policy: Policy,
    auth: AuthToken,
    components: SessionComponents,
    registry: Mutex<TaskRegistry>,
    transfer_slots: Arc<Semaphore>,
    events: broadcast::Sender<SessionEvent>,
    all_terminal: watch::Sender<bool>,
    shutdown: CancellationToken,
}

/// A bounded set of uploads created under one role policy.
///
/// `submit` spawns onto the current Tokio runtime and must be called from
/// within one. Dropping the session cancels every task still in flight.
pub struct UploadSession {
    inner: Arc<SessionInner>,
}

impl UploadSession {
    /// Create a session for `role`. Fails with `UnknownRole` before any task
    /// can exist.
    pub fn new(
        role: &str,
        auth: AuthToken,
        components: SessionComponents,
        config: SessionConfig,
    ) -> Result<Self, UploadError> {
        let policy = resolve(role)?;
        tracing::debug!(
            role = role,
            max_files = policy.max_files_per_session,
            max_file_size_bytes = policy.max_file_size_bytes,
            "Resolved upload policy"
        );
        Ok(Self::with_policy(policy, auth, components, config))
    }

    pub fn with_policy(
        policy: Policy,
        auth: AuthToken,
        components: SessionComponents,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (all_terminal, _) = watch::channel(true);

        Self {
            inner: Arc::new(SessionInner {
                policy,
                auth,
                components,
                registry: Mutex::new(TaskRegistry::new()),
                transfer_slots: Arc::new(Semaphore::new(config.max_concurrent_transfers.max(1))),
                events,
                all_terminal,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.inner.policy
    }

    /// Receive events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// All tasks in insertion order.
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.inner.registry().snapshot()
    }

    pub fn task(&self, id: Uuid) -> Option<UploadTask> {
        self.inner.registry().get(id).cloned()
    }

    pub fn is_all_terminal(&self) -> bool {
        self.inner.registry().all_terminal()
    }

    /// Validate and enqueue a batch.
    ///
    /// The capacity check and task creation happen under one registry lock, so
    /// concurrent submissions can never overshoot the policy limit. A batch
    /// over capacity creates no tasks and triggers no grant requests.
    #[tracing::instrument(skip(self, files), fields(batch_size = files.len()))]
    pub fn submit(&self, files: Vec<SourceFile>, category: &str, folder: &str) -> SubmitReceipt {
        let inner = &self.inner;
        let mut receipt = SubmitReceipt::default();
        let mut accepted = Vec::new();

        {
            let mut registry = inner.registry();
            let verdicts = match validate_batch(&files, &inner.policy, registry.len()) {
                BatchDecision::Rejected(err) => {
                    tracing::info!(error = %err, "Upload batch rejected");
                    let error = TaskError::from(&err);
                    let _ = inner.events.send(SessionEvent::BatchRejected(error.clone()));
                    receipt.batch_error = Some(error);
                    return receipt;
                }
                BatchDecision::Evaluated(verdicts) => verdicts,
            };

            // Create the whole batch before rejecting any of it, so the
            // all-terminal flag never flips while the batch is half inserted.
            let mut created = Vec::with_capacity(files.len());
            for (file, verdict) in files.into_iter().zip(verdicts) {
                let task = UploadTask::new(&file, category);
                let id = task.id;
                let cancel = inner.shutdown.child_token();
                registry.insert(TaskEntry {
                    task: task.clone(),
                    source: file.clone(),
                    folder: folder.to_string(),
                    cancel: cancel.clone(),
                });
                inner.publish(&registry, task);
                created.push((id, file, cancel, verdict));
            }

            for (id, file, cancel, verdict) in created {
                match verdict {
                    Ok(()) => {
                        receipt.accepted.push(id);
                        accepted.push((id, file, cancel));
                    }
                    Err(err) => {
                        tracing::debug!(task_id = %id, error = %err, "File rejected");
                        inner.apply_locked(
                            &mut registry,
                            id,
                            Transition::Reject(TaskError::from(&err)),
                        );
                        receipt.rejected.push(id);
                    }
                }
            }
        }

        tracing::info!(
            accepted = receipt.accepted.len(),
            rejected = receipt.rejected.len(),
            "Upload batch submitted"
        );

        for (id, file, cancel) in accepted {
            let inner = Arc::clone(inner);
            let folder = folder.to_string();
            tokio::spawn(async move {
                SessionInner::drive(inner, id, file, folder, cancel).await;
            });
        }

        receipt
    }

    /// Cancel one task. Returns false when the task is unknown or already
    /// terminal.
    pub fn cancel(&self, id: Uuid) -> bool {
        let registry = self.inner.registry();
        match registry.entry(id) {
            Some(entry) if !entry.task.is_terminal() => {
                tracing::info!(task_id = %id, "Cancelling upload");
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel every non-terminal task. The session stays usable.
    pub fn cancel_all(&self) {
        let registry = self.inner.registry();
        let mut cancelled = 0usize;
        for entry in registry.entries().filter(|e| !e.task.is_terminal()) {
            entry.cancel.cancel();
            cancelled += 1;
        }
        tracing::info!(cancelled, "Cancelling all uploads");
    }

    /// Re-submit the source of a failed task as a new task.
    ///
    /// The failed task is left as it is and the new one counts toward the
    /// session capacity. Returns `None` unless `id` names a failed task.
    pub fn retry(&self, id: Uuid) -> Option<SubmitReceipt> {
        let (source, category, folder) = {
            let registry = self.inner.registry();
            let entry = registry.entry(id)?;
            if entry.task.status != TaskStatus::Failed {
                return None;
            }
            (
                entry.source.clone(),
                entry.task.category.clone(),
                entry.folder.clone(),
            )
        };

        tracing::info!(task_id = %id, "Retrying failed upload as a new task");
        Some(self.submit(vec![source], &category, &folder))
    }

    /// Resolve once every task in the session is terminal.
    pub async fn wait_until_terminal(&self) {
        let mut rx = self.inner.all_terminal.subscribe();
        // The sender lives as long as `self`, so this only returns on `true`.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl SessionInner {
    fn registry(&self) -> MutexGuard<'_, TaskRegistry> {
        // A panic while holding the lock cannot leave a task half-updated.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish a changed task and refresh the all-terminal flag. Called with
    /// the registry locked so events for one task keep their order.
    fn publish(&self, registry: &TaskRegistry, task: UploadTask) {
        let _ = self.events.send(SessionEvent::TaskUpdated(task));

        let done = registry.all_terminal();
        let became_done = self.all_terminal.send_if_modified(|current| {
            if *current == done {
                return false;
            }
            *current = done;
            true
        }) && done;

        if became_done {
            tracing::debug!("All uploads terminal");
            let _ = self.events.send(SessionEvent::AllTerminal);
        }
    }

    fn apply(&self, id: Uuid, transition: Transition) -> Option<UploadTask> {
        let mut registry = self.registry();
        self.apply_locked(&mut registry, id, transition)
    }

    fn apply_locked(
        &self,
        registry: &mut TaskRegistry,
        id: Uuid,
        transition: Transition,
    ) -> Option<UploadTask> {
        match registry.apply(id, transition) {
            Ok(Some(task)) => {
                self.publish(registry, task.clone());
                Some(task)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "Discarded invalid task transition");
                None
            }
        }
    }

    /// Move a task to `failed` unless it already finished.
    fn fail(&self, id: Uuid, err: &UploadError) {
        let mut registry = self.registry();
        match registry.get(id) {
            Some(task) if !task.is_terminal() => {}
            _ => return,
        }

        match err.log_level() {
            LogLevel::Debug => tracing::debug!(task_id = %id, error = %err, "Upload failed"),
            LogLevel::Warn => tracing::warn!(task_id = %id, error = %err, "Upload failed"),
            LogLevel::Error => tracing::error!(task_id = %id, error = %err, "Upload failed"),
        }
        self.apply_locked(&mut registry, id, Transition::Fail(TaskError::from(err)));
    }

    async fn drive(
        self: Arc<Self>,
        id: Uuid,
        file: SourceFile,
        folder: String,
        cancel: CancellationToken,
    ) {
        if self.apply(id, Transition::Grant).is_none() {
            return;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = Arc::clone(&self).run(id, file, &folder) => result,
        };

        if let Err(err) = outcome {
            self.fail(id, &err);
        }
    }

    #[tracing::instrument(skip(self, file, folder), fields(file_name = %file.name))]
    async fn run(self: Arc<Self>, id: Uuid, file: SourceFile, folder: &str) -> Result<(), UploadError> {
        let slot = Arc::clone(&self.transfer_slots)
            .acquire_owned()
            .await
            .map_err(|_| UploadError::Cancelled)?;

        let content_type = file.effective_mime_type();
        let request = GrantRequest {
            file_name: file.name.clone(),
            file_type: content_type.clone(),
            folder: folder.to_string(),
        };
        let grant = self
            .components
            .grants
            .request_grant(&request, &self.auth)
            .await?;
        if grant.is_expired_at(Utc::now()) {
            return Err(UploadError::GrantExpired {
                expires_at: grant.expires_at,
            });
        }

        self.apply(id, Transition::StartUpload);
        let weak = Arc::downgrade(&self);
        let on_progress: ProgressCallback = Arc::new(move |percent| {
            if let Some(session) = weak.upgrade() {
                session.apply(id, Transition::Progress(percent));
            }
        });

        let public_url = self
            .components
            .transfer
            .upload(file.data.clone(), &content_type, &grant, on_progress)
            .await?;
        drop(slot);

        // No await between here and the next transition: an uploaded task is
        // never observed by cancellation.
        let Some(task) = self.apply(id, Transition::FinishUpload { public_url }) else {
            return Ok(());
        };
        if !task.requires_processing {
            self.apply(id, Transition::Complete);
            tracing::info!(task_id = %id, "Upload completed");
            return Ok(());
        }

        let mut events = self.components.processing.watch(&task, &self.auth);
        self.apply(id, Transition::StartProcessing);

        while let Some(event) = events.next().await {
            match event {
                ProcessingEvent::Processing => {}
                ProcessingEvent::Completed => {
                    self.apply(id, Transition::Complete);
                    tracing::info!(task_id = %id, "Upload processed and completed");
                    return Ok(());
                }
                ProcessingEvent::Failed { error } => {
                    return Err(UploadError::ProcessingFailed(
                        error.unwrap_or_else(|| "processing reported failure".to_string()),
                    ));
                }
            }
        }

        Err(UploadError::ProcessingFailed(
            "processing status ended without a result".to_string(),
        ))
    }
}
