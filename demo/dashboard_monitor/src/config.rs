use std::fs;
use std::path::Path;

use greenhealth_core::DashboardConfig;

/// Configuration for the dashboard monitor
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub api: DashboardConfig,
    /// Print each view as one JSON line instead of the text summary
    pub json_output: bool,
    /// Leaderboard rows shown in text mode
    pub leaderboard_rows: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api: DashboardConfig::from_env(),
            json_output: std::env::var("DASHBOARD_MONITOR_JSON")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
            leaderboard_rows: 6,
        }
    }
}

impl MonitorConfig {
    /// Load from TOML (path via DASHBOARD_MONITOR_CONFIG or ./dashboard_monitor.toml),
    /// overlaying values onto the env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("DASHBOARD_MONITOR_CONFIG")
            .unwrap_or_else(|_| "dashboard_monitor.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "dashboard_monitor", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<MonitorToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "dashboard_monitor", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "dashboard_monitor", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct MonitorToml {
    pub json_output: Option<bool>,
    pub leaderboard_rows: Option<usize>,
    pub api: Option<ApiToml>,
}

impl MonitorToml {
    fn overlay(self, mut base: MonitorConfig) -> MonitorConfig {
        if let Some(v) = self.json_output {
            base.json_output = v;
        }
        if let Some(v) = self.leaderboard_rows {
            base.leaderboard_rows = v;
        }
        if let Some(a) = self.api {
            a.apply(&mut base.api);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ApiToml {
    pub base_url: Option<String>,
    pub pull_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub copilot_timeout_ms: Option<u64>,
    pub push_enabled: Option<bool>,
    pub push_max_retries: Option<u32>,
    pub push_backoff_initial_ms: Option<u64>,
    pub push_backoff_max_ms: Option<u64>,
}

impl ApiToml {
    fn apply(self, c: &mut DashboardConfig) {
        if let Some(x) = self.base_url {
            c.base_url = x.trim_end_matches('/').to_string();
        }
        if let Some(x) = self.pull_interval_ms {
            c.pull_interval_ms = x;
        }
        if let Some(x) = self.request_timeout_ms {
            c.request_timeout_ms = x;
        }
        if let Some(x) = self.copilot_timeout_ms {
            c.copilot_timeout_ms = x;
        }
        if let Some(x) = self.push_enabled {
            c.push_enabled = x;
        }
        if let Some(x) = self.push_max_retries {
            c.push_max_retries = x;
        }
        if let Some(x) = self.push_backoff_initial_ms {
            c.push_backoff_initial_ms = x;
        }
        if let Some(x) = self.push_backoff_max_ms {
            c.push_backoff_max_ms = x;
        }
    }
}
