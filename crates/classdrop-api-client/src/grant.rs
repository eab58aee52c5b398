//! Upload grant requests against `POST /files/upload-url`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classdrop_core::{AuthToken, ClientConfig, GrantProvider, GrantRequest, UploadError, UploadGrant};
use serde::Deserialize;
use std::time::Duration;

use crate::{ApiClient, ApiError};

pub const UPLOAD_URL_PATH: &str = "/files/upload-url";

/// Success body of the upload-url endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    public_url: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Requests one-time write grants from the control plane.
#[derive(Clone, Debug)]
pub struct GrantClient {
    api: ApiClient,
    default_ttl: Duration,
}

impl GrantClient {
    pub fn new(api: ApiClient, default_ttl: Duration) -> Self {
        Self { api, default_ttl }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::new(
            ApiClient::from_config(config)?,
            config.default_grant_ttl(),
        ))
    }

    fn expiry(&self, expires_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        expires_at.unwrap_or_else(|| {
            Utc::now()
                + chrono::Duration::from_std(self.default_ttl)
                    .unwrap_or_else(|_| chrono::Duration::minutes(15))
        })
    }
}

impl From<ApiError> for UploadError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, body } => UploadError::GrantDenied {
                status,
                message: body,
            },
            ApiError::Transport(e) => UploadError::Network(e.to_string()),
            // A 2xx without a usable grant is as good as a refusal.
            ApiError::Decode(e) => UploadError::GrantDenied {
                status: e.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("malformed grant response: {}", e),
            },
        }
    }
}

#[async_trait]
impl GrantProvider for GrantClient {
    #[tracing::instrument(
        skip(self, request, auth),
        fields(file_name = %request.file_name, folder = %request.folder)
    )]
    async fn request_grant(
        &self,
        request: &GrantRequest,
        auth: &AuthToken,
    ) -> Result<UploadGrant, UploadError> {
        let response: UploadUrlResponse = self
            .api
            .post_json(UPLOAD_URL_PATH, request, auth)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Upload grant request failed");
                UploadError::from(e)
            })?;

        let grant = UploadGrant {
            write_url: response.upload_url,
            public_url: response.public_url,
            expires_at: self.expiry(response.expires_at),
        };

        tracing::debug!(expires_at = %grant.expires_at, "Obtained upload grant");
        Ok(grant)
    }
}
