//! Collaborator traits the session drives.
//!
//! The HTTP implementations live in `classdrop-api-client`; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::UploadError;
use crate::models::{AuthToken, GrantRequest, ProcessingEvent, UploadGrant, UploadTask};

/// Progress sink receiving percentages in `[0, 100]`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Exchanges file details for a short-lived write grant.
///
/// Implementations must not retry internally.
#[async_trait]
pub trait GrantProvider: Send + Sync {
    async fn request_grant(
        &self,
        request: &GrantRequest,
        auth: &AuthToken,
    ) -> Result<UploadGrant, UploadError>;
}

/// Moves file bytes to the grant's write endpoint.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Upload `data` and return the public URL on success.
    ///
    /// `on_progress` receives a non-decreasing sequence whose final value before
    /// a successful return is exactly 100.
    async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        grant: &UploadGrant,
        on_progress: ProgressCallback,
    ) -> Result<String, UploadError>;
}

/// Observes downstream content processing of an uploaded file.
pub trait ProcessingObserver: Send + Sync {
    /// Stream of processing signals for `task`.
    ///
    /// Must only be called on a task in `uploaded`; anything else is a bug in
    /// the caller and panics.
    fn watch(&self, task: &UploadTask, auth: &AuthToken) -> BoxStream<'static, ProcessingEvent>;
}
