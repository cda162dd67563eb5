use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backend::TelemetryBackend;
use super::state::StateCell;

/// Poll the full backend state every `period` until cancelled.
///
/// The first fetch runs immediately. Fetches never overlap; a slow fetch delays the next
/// tick instead of queueing a burst. Failures keep the last known state.
pub(crate) async fn run_pull_loop(
    backend: Arc<dyn TelemetryBackend>,
    state: Arc<StateCell>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let revision = state.next_revision();
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = backend.fetch_state() => result,
        };

        match result {
            Ok(pulled) => {
                let metric_count = pulled.metrics.len();
                if state.apply_pull(revision, pulled, &cancel) {
                    debug!(target: "telemetry.pull", revision, metric_count, "Applied pull");
                }
            }
            Err(e) => {
                warn!(target: "telemetry.pull", error = %e, "Pull failed; keeping last known state");
            }
        }
    }
    debug!(target: "telemetry.pull", "Pull loop stopped");
}
