// Telemetry transport - keeps the freshest metric set from two channels
//
// Pull: full-state fetch on a fixed interval, the source of truth for alerts and score.
// Push: persistent WebSocket subscription carrying complete metric sets.
// Both write into one StateCell; consumers watch the resulting snapshot.

mod backend;
mod http;
mod pull;
mod push;
mod state;
mod wire;

pub use backend::{FrameStream, PullSnapshot, TelemetryBackend};
pub use http::HttpTelemetryBackend;
pub use push::{PushState, ReconnectPolicy};
pub use state::TelemetrySnapshot;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::readers::{AlertReader, ScoreReader};
use crate::Result;
use state::StateCell;

/// Transport timing and reconnect settings
#[derive(Clone, Debug, PartialEq)]
pub struct TransportConfig {
    pub pull_interval: Duration,
    pub push_enabled: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pull_interval: Duration::from_secs(5),
            push_enabled: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl From<&DashboardConfig> for TransportConfig {
    fn from(cfg: &DashboardConfig) -> Self {
        Self {
            pull_interval: cfg.pull_interval(),
            push_enabled: cfg.push_enabled,
            reconnect: ReconnectPolicy {
                max_retries: cfg.push_max_retries,
                initial_delay: Duration::from_millis(cfg.push_backoff_initial_ms),
                max_delay: Duration::from_millis(cfg.push_backoff_max_ms),
            },
        }
    }
}

/// Handles for one start/stop cycle
struct Channels {
    cancel: CancellationToken,
    pull: JoinHandle<()>,
    push: Option<JoinHandle<()>>,
}

impl Channels {
    fn abort(&self) {
        self.pull.abort();
        if let Some(push) = &self.push {
            push.abort();
        }
    }
}

/// Dual-channel telemetry synchronizer
///
/// Sole writer of the metric set, alert set and score. Every accepted write recomputes
/// the `DashboardView` carried in the published snapshot.
pub struct TelemetryTransport {
    backend: Arc<dyn TelemetryBackend>,
    config: TransportConfig,
    state: Arc<StateCell>,
    push_state: Arc<watch::Sender<PushState>>,
    channels: Mutex<Option<Channels>>,
}

impl TelemetryTransport {
    /// A zero `pull_interval` is replaced by the default interval.
    pub fn new(backend: Arc<dyn TelemetryBackend>, mut config: TransportConfig) -> Self {
        if config.pull_interval.is_zero() {
            config.pull_interval = TransportConfig::default().pull_interval;
            warn!(
                target: "telemetry.transport",
                pull_interval_ms = config.pull_interval.as_millis() as u64,
                "Zero pull interval; using default"
            );
        }
        let (push_state, _) = watch::channel(PushState::Idle);
        Self {
            backend,
            config,
            state: Arc::new(StateCell::new()),
            push_state: Arc::new(push_state),
            channels: Mutex::new(None),
        }
    }

    /// Transport over the REST/WebSocket backend described by `cfg`
    pub fn http(cfg: &DashboardConfig) -> Result<Self> {
        cfg.validate()?;
        let backend = HttpTelemetryBackend::new(cfg.clone())?;
        Ok(Self::new(Arc::new(backend), TransportConfig::from(cfg)))
    }

    /// Start both channels. No-op if already running.
    pub async fn start(&self) {
        let mut channels = self.channels.lock().await;
        if channels.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let pull = tokio::spawn(pull::run_pull_loop(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            self.config.pull_interval,
            cancel.clone(),
        ));

        let push = if self.config.push_enabled {
            Some(tokio::spawn(push::run_push_loop(
                Arc::clone(&self.backend),
                Arc::clone(&self.state),
                self.config.reconnect,
                Arc::clone(&self.push_state),
                cancel.clone(),
            )))
        } else {
            self.push_state.send_replace(PushState::PullOnly);
            None
        };

        info!(
            target: "telemetry.transport",
            pull_interval_ms = self.config.pull_interval.as_millis() as u64,
            push_enabled = self.config.push_enabled,
            "Telemetry transport started"
        );
        *channels = Some(Channels { cancel, pull, push });
    }

    /// Tear down both channels. Completions arriving afterwards are discarded.
    pub async fn stop(&self) {
        let Some(running) = self.channels.lock().await.take() else {
            return;
        };

        self.state.seal(&running.cancel);
        running.abort();
        let _ = running.pull.await;
        if let Some(push) = running.push {
            let _ = push.await;
        }
        self.push_state.send_replace(PushState::Stopped);
        info!(target: "telemetry.transport", "Telemetry transport stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.channels.lock().await.is_some()
    }

    /// Current snapshot (clone)
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.state.subscribe()
    }

    pub fn push_state(&self) -> watch::Receiver<PushState> {
        self.push_state.subscribe()
    }

    pub fn alert_reader(&self) -> AlertReader {
        AlertReader::new(self.subscribe())
    }

    pub fn score_reader(&self) -> ScoreReader {
        ScoreReader::new(self.subscribe())
    }
}

impl Drop for TelemetryTransport {
    fn drop(&mut self) {
        if let Some(running) = self.channels.get_mut().take() {
            self.state.seal(&running.cancel);
            running.abort();
        }
    }
}
