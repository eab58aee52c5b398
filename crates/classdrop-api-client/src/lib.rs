//! HTTP clients for the classdrop upload core.
//!
//! [`ApiClient`] is a minimal control-plane client with bearer auth and JSON
//! GET/POST helpers. The collaborator implementations the session drives are
//! built on top of it: [`GrantClient`] for write grants, [`DirectUploader`] for
//! the storage PUT and [`ProcessingWatcher`] for processing status.

pub mod grant;
pub mod processing;
pub mod uploader;

use classdrop_core::{AuthToken, ClientConfig};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use grant::GrantClient;
pub use processing::ProcessingWatcher;
pub use uploader::DirectUploader;

/// Errors from a control-plane request, before mapping to an `UploadError`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to parse response as JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

/// HTTP client for the control-plane API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(ApiError::Decode)
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: &AuthToken,
    ) -> Result<T, ApiError> {
        let mut request = self
            .client
            .get(self.build_url(path))
            .bearer_auth(auth.as_str());

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(ApiError::Transport)?;
        Self::read_json(response).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        auth: &AuthToken,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.build_url(path))
            .bearer_auth(auth.as_str())
            .json(body)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        Self::read_json(response).await
    }
}
