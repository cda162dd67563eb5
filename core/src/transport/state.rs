// Single-writer telemetry state cell
//
// Every write goes through the watch channel's lock, so the revision check, the
// teardown check and the derived-view recompute happen atomically with the write.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::backend::PullSnapshot;
use crate::analytics::DashboardView;
use crate::model::{AlertSet, MetricSample, ScoreReport};

/// Latest known backend state plus everything derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub metrics: Vec<MetricSample>,
    pub alerts: AlertSet,
    pub score: ScoreReport,
    pub view: DashboardView,
    /// Highest revision applied by any write; 0 before the first write
    pub revision: u64,
    /// Revision the current metric set was ingested at
    pub metrics_revision: u64,
    pub last_pull_at: Option<DateTime<Utc>>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            alerts: AlertSet::default(),
            score: ScoreReport::default(),
            view: DashboardView::default(),
            revision: 0,
            metrics_revision: 0,
            last_pull_at: None,
        }
    }
}

impl TelemetrySnapshot {
    fn recompute(&mut self) {
        self.view = DashboardView::derive(&self.metrics, &self.alerts, self.score.overall_score);
    }
}

pub(crate) struct StateCell {
    tx: watch::Sender<TelemetrySnapshot>,
    revisions: AtomicU64,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            tx,
            revisions: AtomicU64::new(0),
        }
    }

    /// Stamp an ingestion point. Strictly increasing across both channels.
    pub(crate) fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn current(&self) -> TelemetrySnapshot {
        self.tx.borrow().clone()
    }

    /// Replace alerts and score, and the metric set unless a fresher push already landed.
    /// Returns false if the channels were torn down.
    pub(crate) fn apply_pull(
        &self,
        revision: u64,
        pulled: PullSnapshot,
        cancel: &CancellationToken,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            if revision > state.metrics_revision {
                state.metrics = pulled.metrics;
                state.metrics_revision = revision;
            } else {
                debug!(
                    target: "telemetry.transport",
                    revision,
                    held = state.metrics_revision,
                    "Pulled metrics older than pushed set; keeping pushed metrics"
                );
            }
            state.alerts = pulled.alerts;
            state.score = pulled.score;
            state.revision = state.revision.max(revision);
            state.last_pull_at = Some(Utc::now());
            state.recompute();
            true
        })
    }

    /// Replace the metric set from a push frame. Returns false if stale or torn down.
    pub(crate) fn apply_push(
        &self,
        revision: u64,
        metrics: Vec<MetricSample>,
        cancel: &CancellationToken,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if cancel.is_cancelled() || revision <= state.metrics_revision {
                return false;
            }
            state.metrics = metrics;
            state.metrics_revision = revision;
            state.revision = state.revision.max(revision);
            state.recompute();
            true
        })
    }

    /// Cancel under the write lock: no write that observes the token can land afterwards.
    pub(crate) fn seal(&self, cancel: &CancellationToken) {
        self.tx.send_if_modified(|_| {
            cancel.cancel();
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metrics(dept: &str, energy: f64) -> Vec<MetricSample> {
        vec![MetricSample::new(dept, energy, 1.0, 1.0, Utc::now())]
    }

    fn pulled(dept: &str, score: f64) -> PullSnapshot {
        PullSnapshot {
            metrics: metrics(dept, 10.0),
            alerts: AlertSet::default(),
            score: ScoreReport::new(score),
        }
    }

    #[test]
    fn revisions_are_strictly_increasing() {
        let cell = StateCell::new();
        let a = cell.next_revision();
        let b = cell.next_revision();
        assert!(b > a);
    }

    #[test]
    fn push_received_during_pull_wins_over_pull_metrics() {
        let cell = StateCell::new();
        let cancel = CancellationToken::new();

        let pull_rev = cell.next_revision();
        let push_rev = cell.next_revision();
        assert!(cell.apply_push(push_rev, metrics("Pushed", 5.0), &cancel));
        assert!(cell.apply_pull(pull_rev, pulled("Pulled", 70.0), &cancel));

        let snap = cell.current();
        assert_eq!(snap.metrics[0].department, "Pushed");
        assert_eq!(snap.score.overall_score, 70.0);
        assert_eq!(snap.metrics_revision, push_rev);
    }

    #[test]
    fn stale_push_is_dropped() {
        let cell = StateCell::new();
        let cancel = CancellationToken::new();

        let old = cell.next_revision();
        let new = cell.next_revision();
        assert!(cell.apply_pull(new, pulled("Pulled", 1.0), &cancel));
        assert!(!cell.apply_push(old, metrics("Old", 1.0), &cancel));
        assert_eq!(cell.current().metrics[0].department, "Pulled");
    }

    #[test]
    fn sealed_cell_rejects_writes() {
        let cell = StateCell::new();
        let cancel = CancellationToken::new();
        cell.seal(&cancel);

        let rev = cell.next_revision();
        assert!(!cell.apply_pull(rev, pulled("Late", 99.0), &cancel));
        assert!(!cell.apply_push(cell.next_revision(), metrics("Late", 1.0), &cancel));
        assert_eq!(cell.current(), TelemetrySnapshot::default());
    }

    #[test]
    fn writes_recompute_the_view() {
        let cell = StateCell::new();
        let cancel = CancellationToken::new();
        cell.apply_pull(cell.next_revision(), pulled("ER", 150.0), &cancel);

        let snap = cell.current();
        assert_eq!(snap.view.normalized_score, 100.0);
        assert_eq!(snap.view.leaderboard.len(), 1);
    }
}
