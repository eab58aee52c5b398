//! Upload session orchestration.
//!
//! An [`UploadSession`] owns a bounded, ordered set of upload tasks created
//! under one role policy. Accepted files are driven concurrently through
//! grant, transfer and (when required) processing; callers observe progress
//! through [`UploadSession::subscribe`] or read [`UploadSession::snapshot`].

mod registry;
pub mod session;

use classdrop_core::ClientConfig;

pub use session::{SessionComponents, SessionEvent, SubmitReceipt, UploadSession};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Tasks beyond this bound wait in `granted` until a transfer slot frees
    pub max_concurrent_transfers: usize,
    /// Capacity of the event channel; slow subscribers lag past this
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_concurrent_transfers: config.max_concurrent_transfers.max(1),
            event_buffer: config.event_buffer.max(1),
        }
    }
}
