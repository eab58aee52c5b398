use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

/// Bearer credential issued to the caller by its authentication layer.
///
/// Cloning is cheap and the value is never mutated, so a single token is shared
/// by every concurrent grant request of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Arc<str>);

impl AuthToken {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Arc::from(token.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("AuthToken(***)")
    }
}

/// Request body for `POST /files/upload-url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub file_name: String,
    /// MIME type of the file
    pub file_type: String,
    pub folder: String,
}

/// Short-lived write credential for a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadGrant {
    pub write_url: String,
    pub public_url: String,
    pub expires_at: DateTime<Utc>,
}

impl UploadGrant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_debug_is_redacted() {
        let token = AuthToken::new("secret-token");
        assert_eq!(format!("{:?}", token), "AuthToken(***)");
        assert_eq!(token.as_str(), "secret-token");
    }

    #[test]
    fn grant_request_uses_camel_case() {
        let request = GrantRequest {
            file_name: "a.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            folder: "assignments".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["fileName"], "a.pdf");
        assert_eq!(json["fileType"], "application/pdf");
        assert_eq!(json["folder"], "assignments");
    }

    #[test]
    fn grant_expiry_is_inclusive() {
        let now = Utc::now();
        let grant = UploadGrant {
            write_url: "https://storage/put".to_string(),
            public_url: "https://cdn/a.pdf".to_string(),
            expires_at: now,
        };
        assert!(grant.is_expired_at(now));
        assert!(!grant.is_expired_at(now - Duration::seconds(1)));
    }
}
