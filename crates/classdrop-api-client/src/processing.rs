//! Observation of downstream content processing after an upload.
//!
//! Two modes are supported. `Poll` asks the control plane for the processing
//! phase of a stored object until it reports a terminal phase or the timeout
//! elapses. `Simulated` fabricates a processing delay for deployments without a
//! status endpoint.

use classdrop_core::{
    AuthToken, ClientConfig, ProcessingEvent, ProcessingMode, ProcessingObserver, TaskStatus,
    UploadTask,
};
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

use crate::{ApiClient, ApiError};

pub const PROCESSING_STATUS_PATH: &str = "/files/processing-status";

#[derive(Clone, Debug)]
enum WatchMode {
    Simulated {
        delay: Duration,
    },
    Poll {
        api: ApiClient,
        interval: Duration,
        timeout: Duration,
    },
}

#[derive(Clone, Debug)]
pub struct ProcessingWatcher {
    mode: WatchMode,
}

struct PollState {
    api: ApiClient,
    auth: AuthToken,
    public_url: String,
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    polled: bool,
    done: bool,
}

impl ProcessingWatcher {
    pub fn simulated(delay: Duration) -> Self {
        Self {
            mode: WatchMode::Simulated { delay },
        }
    }

    pub fn polling(api: ApiClient, interval: Duration, timeout: Duration) -> Self {
        Self {
            mode: WatchMode::Poll {
                api,
                interval,
                timeout,
            },
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(match config.processing_mode {
            ProcessingMode::Simulated => Self::simulated(config.simulated_processing_delay()),
            ProcessingMode::Poll => Self::polling(
                ApiClient::from_config(config)?,
                config.processing_poll_interval(),
                config.processing_timeout(),
            ),
        })
    }

    async fn next_poll(mut state: PollState) -> Option<(ProcessingEvent, PollState)> {
        if state.done {
            return None;
        }

        loop {
            if state.polled {
                tokio::time::sleep(state.interval).await;
            }
            state.polled = true;

            if Instant::now() >= state.deadline {
                state.done = true;
                let error = format!(
                    "processing did not finish within {} seconds",
                    state.timeout.as_secs()
                );
                return Some((ProcessingEvent::Failed { error: Some(error) }, state));
            }

            let query = [("publicUrl", state.public_url.clone())];
            match state
                .api
                .get::<ProcessingEvent>(PROCESSING_STATUS_PATH, &query, &state.auth)
                .await
            {
                Ok(event) => {
                    state.done = event.is_terminal();
                    return Some((event, state));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        public_url = %state.public_url,
                        "Processing status poll failed, will retry"
                    );
                }
            }
        }
    }
}

impl ProcessingObserver for ProcessingWatcher {
    fn watch(&self, task: &UploadTask, auth: &AuthToken) -> BoxStream<'static, ProcessingEvent> {
        assert_eq!(
            task.status,
            TaskStatus::Uploaded,
            "processing watch started for task {} in state {}",
            task.id,
            task.status
        );
        assert!(
            task.requires_processing,
            "processing watch started for task {} that does not require processing",
            task.id
        );

        tracing::debug!(task_id = %task.id, "Watching processing");

        match &self.mode {
            WatchMode::Simulated { delay } => {
                let delay = *delay;
                stream::once(async { ProcessingEvent::Processing })
                    .chain(stream::once(async move {
                        tokio::time::sleep(delay).await;
                        ProcessingEvent::Completed
                    }))
                    .boxed()
            }
            WatchMode::Poll {
                api,
                interval,
                timeout,
            } => {
                let state = PollState {
                    api: api.clone(),
                    auth: auth.clone(),
                    public_url: task.public_url.clone().unwrap_or_default(),
                    interval: *interval,
                    timeout: *timeout,
                    deadline: Instant::now() + *timeout,
                    polled: false,
                    done: false,
                };
                stream::unfold(state, Self::next_poll).boxed()
            }
        }
    }
}
