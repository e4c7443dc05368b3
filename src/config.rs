use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const ENV_ORIGIN: &str = "CAMPUS_SYNC_ORIGIN";
pub const ENV_EXEMPT_PATHS: &str = "CAMPUS_SYNC_EXEMPT_PATHS";
pub const ENV_POLL_SECS: &str = "CAMPUS_SYNC_POLL_SECS";
pub const ENV_RELOAD_DELAY_MS: &str = "CAMPUS_SYNC_RELOAD_DELAY_MS";
pub const ENV_TIMEOUT_MS: &str = "CAMPUS_SYNC_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Origin of the admin panel; relative request URLs resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub reload_delay_ms: u64,
    /// None leaves the timeout to the HTTP client.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_origin() -> String {
    "http://localhost:5000".to_string()
}

fn default_exempt_paths() -> Vec<String> {
    vec!["chatbot".to_string()]
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            exempt_paths: default_exempt_paths(),
            poll_interval_secs: default_poll_interval_secs(),
            reload_delay_ms: 0,
            request_timeout_ms: None,
        }
    }
}

impl SyncConfig {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Defaults, then `.env`, then process environment.
    pub fn from_env() -> Result<Self, SyncError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("failed to load .env: {e}");
            }
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(origin) = env_value(ENV_ORIGIN) {
            self.origin = origin;
        }
        if let Some(raw) = env_value(ENV_EXEMPT_PATHS) {
            self.exempt_paths = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = env_number(ENV_POLL_SECS) {
            self.poll_interval_secs = secs;
        }
        if let Some(ms) = env_number(ENV_RELOAD_DELAY_MS) {
            self.reload_delay_ms = ms;
        }
        if let Some(ms) = env_number(ENV_TIMEOUT_MS) {
            self.request_timeout_ms = Some(ms);
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        self.origin_url()?;
        if self.poll_interval_secs == 0 {
            return Err(SyncError::Config(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(SyncError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn origin_url(&self) -> Result<Url, SyncError> {
        let url = Url::parse(self.origin.trim())
            .map_err(|e| SyncError::Config(format!("invalid origin '{}': {e}", self.origin)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "origin must be http or https: {}",
                self.origin
            )));
        }
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_number(key: &str) -> Option<u64> {
    let raw = env_value(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("ignoring {key}={raw}: {e}");
            None
        }
    }
}
