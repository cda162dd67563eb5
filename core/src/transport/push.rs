use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::TelemetryBackend;
use super::state::StateCell;
use super::wire::parse_push_frame;

/// Connection state of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PushState {
    /// Transport not started yet
    Idle,
    Connecting,
    Connected,
    /// Waiting `delay_ms` before reconnect attempt `attempt` (1-based)
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// Push abandoned (disabled or out of retries); pull is the only source
    PullOnly,
    Stopped,
}

/// Exponential backoff for push reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated after a drop; 0 means never reconnect
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub(crate) async fn run_push_loop(
    backend: Arc<dyn TelemetryBackend>,
    state: Arc<StateCell>,
    policy: ReconnectPolicy,
    push_state: Arc<watch::Sender<PushState>>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        if failures == 0 {
            push_state.send_replace(PushState::Connecting);
        }

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = backend.open_push() => opened,
        };

        match opened {
            Ok(mut frames) => {
                info!(target: "telemetry.push", "Push channel connected");
                push_state.send_replace(PushState::Connected);
                failures = 0;

                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = frames.next() => next,
                    };
                    match next {
                        Some(Ok(text)) => {
                            let revision = state.next_revision();
                            match parse_push_frame(&text) {
                                Ok(metrics) => {
                                    if state.apply_push(revision, metrics, &cancel) {
                                        debug!(target: "telemetry.push", revision, "Applied push frame");
                                    }
                                }
                                Err(e) => {
                                    debug!(target: "telemetry.push", error = %e, "Discarding push frame");
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!(target: "telemetry.push", error = %e, "Push channel error; closing");
                            break;
                        }
                        None => {
                            info!(target: "telemetry.push", "Push channel closed by backend");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(target: "telemetry.push", error = %e, "Push channel failed to open");
            }
        }

        if failures >= policy.max_retries {
            info!(
                target: "telemetry.push",
                failures,
                "Giving up on push channel; continuing pull-only"
            );
            push_state.send_replace(PushState::PullOnly);
            return;
        }

        let delay = policy.delay_for(failures);
        failures += 1;
        push_state.send_replace(PushState::Reconnecting {
            attempt: failures,
            delay_ms: delay.as_millis() as u64,
        });
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
