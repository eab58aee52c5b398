//! Configuration module
//!
//! Client-side settings for the control-plane connection, transfer limits and
//! the processing watcher. Loaded from the environment (and `.env`).

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

const API_URL: &str = "http://localhost:3000";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const TRANSFER_TIMEOUT_SECS: u64 = 600;
const MAX_CONCURRENT_TRANSFERS: usize = 4;
const UPLOAD_CHUNK_SIZE_KB: usize = 256;
const DEFAULT_GRANT_TTL_SECS: u64 = 15 * 60;
const PROCESSING_POLL_INTERVAL_MS: u64 = 2000;
const PROCESSING_TIMEOUT_SECS: u64 = 300;
const SIMULATED_PROCESSING_MS: u64 = 1500;
const EVENT_BUFFER: usize = 256;

/// How the processing watcher learns about downstream processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Emit `processing`, wait a fixed delay, then `completed`
    Simulated,
    /// Poll the control plane's processing-status endpoint
    Poll,
}

impl Display for ProcessingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingMode::Simulated => write!(f, "simulated"),
            ProcessingMode::Poll => write!(f, "poll"),
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" => Ok(ProcessingMode::Simulated),
            "poll" => Ok(ProcessingMode::Poll),
            _ => Err(anyhow::anyhow!("Invalid processing mode: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    pub max_concurrent_transfers: usize,
    pub upload_chunk_size_bytes: usize,
    /// Grant lifetime assumed when the control plane omits `expiresAt`
    pub default_grant_ttl_secs: u64,
    pub processing_mode: ProcessingMode,
    pub processing_poll_interval_ms: u64,
    pub processing_timeout_secs: u64,
    pub simulated_processing_ms: u64,
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            api_token: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            transfer_timeout_secs: TRANSFER_TIMEOUT_SECS,
            max_concurrent_transfers: MAX_CONCURRENT_TRANSFERS,
            upload_chunk_size_bytes: kib_to_bytes(UPLOAD_CHUNK_SIZE_KB),
            default_grant_ttl_secs: DEFAULT_GRANT_TTL_SECS,
            processing_mode: ProcessingMode::Simulated,
            processing_poll_interval_ms: PROCESSING_POLL_INTERVAL_MS,
            processing_timeout_secs: PROCESSING_TIMEOUT_SECS,
            simulated_processing_ms: SIMULATED_PROCESSING_MS,
            event_buffer: EVENT_BUFFER,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Saturates instead of overflowing on absurd values.
fn kib_to_bytes(kib: usize) -> usize {
    kib.saturating_mul(1024)
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let processing_mode = match env::var("CLASSDROP_PROCESSING_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => ProcessingMode::Simulated,
        };

        let config = ClientConfig {
            api_url: env::var("CLASSDROP_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_token: env::var("CLASSDROP_API_TOKEN")
                .or_else(|_| env::var("API_TOKEN"))
                .ok()
                .filter(|s| !s.is_empty()),
            request_timeout_secs: env_or("CLASSDROP_REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS),
            transfer_timeout_secs: env_or("CLASSDROP_TRANSFER_TIMEOUT_SECS", TRANSFER_TIMEOUT_SECS),
            max_concurrent_transfers: env_or(
                "CLASSDROP_MAX_CONCURRENT_TRANSFERS",
                MAX_CONCURRENT_TRANSFERS,
            ),
            upload_chunk_size_bytes: kib_to_bytes(env_or(
                "CLASSDROP_UPLOAD_CHUNK_SIZE_KB",
                UPLOAD_CHUNK_SIZE_KB,
            )),
            default_grant_ttl_secs: env_or("CLASSDROP_DEFAULT_GRANT_TTL_SECS", DEFAULT_GRANT_TTL_SECS),
            processing_mode,
            processing_poll_interval_ms: env_or(
                "CLASSDROP_PROCESSING_POLL_INTERVAL_MS",
                PROCESSING_POLL_INTERVAL_MS,
            ),
            processing_timeout_secs: env_or(
                "CLASSDROP_PROCESSING_TIMEOUT_SECS",
                PROCESSING_TIMEOUT_SECS,
            ),
            simulated_processing_ms: env_or(
                "CLASSDROP_SIMULATED_PROCESSING_MS",
                SIMULATED_PROCESSING_MS,
            ),
            event_buffer: env_or("CLASSDROP_EVENT_BUFFER", EVENT_BUFFER),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "CLASSDROP_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }

        if self.max_concurrent_transfers == 0 {
            return Err(anyhow::anyhow!(
                "CLASSDROP_MAX_CONCURRENT_TRANSFERS must be at least 1"
            ));
        }

        if self.upload_chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "CLASSDROP_UPLOAD_CHUNK_SIZE_KB must be at least 1"
            ));
        }

        if self.event_buffer == 0 {
            return Err(anyhow::anyhow!("CLASSDROP_EVENT_BUFFER must be at least 1"));
        }

        if self.processing_mode == ProcessingMode::Poll && self.processing_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "CLASSDROP_PROCESSING_POLL_INTERVAL_MS must be positive in poll mode"
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn default_grant_ttl(&self) -> Duration {
        Duration::from_secs(self.default_grant_ttl_secs)
    }

    pub fn processing_poll_interval(&self) -> Duration {
        Duration::from_millis(self.processing_poll_interval_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn simulated_processing_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_processing_ms)
    }
}
