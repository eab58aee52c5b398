//! Direct-to-storage transfer of file bytes through a pre-signed write URL.
//!
//! The body is streamed in fixed-size chunks and progress is reported as each
//! chunk is handed to the transport. In-flight progress is capped below 100;
//! the final 100 is reported only once storage has answered with a 2xx, so a
//! caller never sees 100 for a write that was not acknowledged.
//!
//! Cancellation is by dropping the returned future, which aborts the request.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use classdrop_core::{ClientConfig, ProgressCallback, Transfer, UploadError, UploadGrant};
use futures::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::time::Duration;

const IN_FLIGHT_PROGRESS_CAP: f64 = 99.0;

/// Uploads bytes straight to object storage, bypassing the application server.
#[derive(Clone, Debug)]
pub struct DirectUploader {
    client: Client,
    chunk_size: usize,
}

impl DirectUploader {
    pub fn new(timeout: Duration, chunk_size: usize) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, UploadError> {
        Self::new(config.transfer_timeout(), config.upload_chunk_size_bytes)
    }
}

fn split_chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

fn progress_body(data: &Bytes, chunk_size: usize, on_progress: ProgressCallback) -> Body {
    let total = data.len();
    let mut sent = 0usize;
    let chunks = split_chunks(data, chunk_size);
    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        let percent = sent as f64 / total as f64 * 100.0;
        on_progress(percent.min(IN_FLIGHT_PROGRESS_CAP));
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    Body::wrap_stream(body)
}

#[async_trait]
impl Transfer for DirectUploader {
    #[tracing::instrument(skip(self, data, grant, on_progress), fields(size_bytes = data.len()))]
    async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        grant: &UploadGrant,
        on_progress: ProgressCallback,
    ) -> Result<String, UploadError> {
        if grant.is_expired_at(Utc::now()) {
            tracing::warn!(expires_at = %grant.expires_at, "Refusing to use expired upload grant");
            return Err(UploadError::GrantExpired {
                expires_at: grant.expires_at,
            });
        }

        on_progress(0.0);
        let size = data.len();
        let response = self
            .client
            .put(&grant.write_url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(progress_body(&data, self.chunk_size, on_progress.clone()))
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Storage rejected upload");
            return Err(UploadError::Transport(format!(
                "storage responded with status {}",
                status.as_u16()
            )));
        }

        on_progress(100.0);
        tracing::debug!(public_url = %grant.public_url, "Upload acknowledged by storage");
        Ok(grant.public_url.clone())
    }
}
