//! Read-only views of the alert list and the sustainability score.
//!
//! Both are refreshed by the transport's pull channel and hold the last known value
//! between pulls and across pull failures.
use std::collections::BTreeMap;
use tokio::sync::watch;

use crate::analytics::{normalized_score, severity_counts, SeverityCounts};
use crate::model::{AlertSet, DepartmentScore};
use crate::transport::TelemetrySnapshot;

#[derive(Clone, Debug)]
pub struct AlertReader {
    rx: watch::Receiver<TelemetrySnapshot>,
}

impl AlertReader {
    pub fn new(rx: watch::Receiver<TelemetrySnapshot>) -> Self {
        Self { rx }
    }

    pub fn alerts(&self) -> AlertSet {
        self.rx.borrow().alerts.clone()
    }

    pub fn count(&self) -> usize {
        self.rx.borrow().alerts.len()
    }

    pub fn by_severity(&self) -> SeverityCounts {
        severity_counts(&self.rx.borrow().alerts)
    }

    /// Wait for the next snapshot change. Returns false once the transport is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[derive(Clone, Debug)]
pub struct ScoreReader {
    rx: watch::Receiver<TelemetrySnapshot>,
}

impl ScoreReader {
    pub fn new(rx: watch::Receiver<TelemetrySnapshot>) -> Self {
        Self { rx }
    }

    /// Raw overall score as reported
    pub fn score(&self) -> f64 {
        self.rx.borrow().score.overall_score
    }

    /// Score clamped to [0, 100] for display
    pub fn normalized(&self) -> f64 {
        normalized_score(self.score())
    }

    pub fn breakdown(&self) -> BTreeMap<String, DepartmentScore> {
        self.rx.borrow().score.breakdown.clone()
    }

    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
