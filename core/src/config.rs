use std::time::Duration;

use crate::{GreenHealthError, Result};

/// Backend connection settings, resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub base_url: String, // e.g., http://localhost:8000
    pub pull_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Timeout for `/copilot-query`, separate from telemetry requests
    pub copilot_timeout_ms: u64,
    pub push_enabled: bool,
    /// Consecutive failed push connects tolerated before falling back to pull-only
    pub push_max_retries: u32,
    pub push_backoff_initial_ms: u64,
    pub push_backoff_max_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GREENHEALTH_API_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            pull_interval_ms: env_parse("GREENHEALTH_PULL_INTERVAL_MS").unwrap_or(5_000),
            request_timeout_ms: env_parse("GREENHEALTH_REQUEST_TIMEOUT_MS").unwrap_or(10_000),
            copilot_timeout_ms: env_parse("GREENHEALTH_COPILOT_TIMEOUT_MS").unwrap_or(30_000),
            push_enabled: env_parse("GREENHEALTH_PUSH_ENABLED").unwrap_or(true),
            push_max_retries: env_parse("GREENHEALTH_PUSH_MAX_RETRIES").unwrap_or(5),
            push_backoff_initial_ms: env_parse("GREENHEALTH_PUSH_BACKOFF_INITIAL_MS")
                .unwrap_or(1_000),
            push_backoff_max_ms: env_parse("GREENHEALTH_PUSH_BACKOFF_MAX_MS").unwrap_or(30_000),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(GreenHealthError::ConfigError(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        for (name, value) in [
            ("pull_interval_ms", self.pull_interval_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("copilot_timeout_ms", self.copilot_timeout_ms),
        ] {
            if value == 0 {
                return Err(GreenHealthError::ConfigError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.push_backoff_initial_ms > self.push_backoff_max_ms {
            return Err(GreenHealthError::ConfigError(
                "push_backoff_initial_ms exceeds push_backoff_max_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn metrics_url(&self) -> String {
        format!("{}/metrics", self.base_url)
    }

    pub fn alerts_url(&self) -> String {
        format!("{}/alerts", self.base_url)
    }

    pub fn score_url(&self) -> String {
        format!("{}/sustainability-score", self.base_url)
    }

    pub fn copilot_url(&self) -> String {
        format!("{}/copilot-query", self.base_url)
    }

    /// `http` becomes `ws`, `https` becomes `wss`
    pub fn push_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{}/ws/metrics", ws_base)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn copilot_timeout(&self) -> Duration {
        Duration::from_millis(self.copilot_timeout_ms)
    }
}
