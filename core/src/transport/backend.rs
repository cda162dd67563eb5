use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::model::{AlertSet, MetricSample, ScoreReport};
use crate::Result;

/// Full backend state returned by one pull
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullSnapshot {
    pub metrics: Vec<MetricSample>,
    pub alerts: AlertSet,
    pub score: ScoreReport,
}

/// Raw text frames from the push channel. An `Err` item or the end of the stream means
/// the connection is gone.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Source of telemetry for `TelemetryTransport`
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Fetch metrics, alerts and score. All three succeed or the pull fails.
    async fn fetch_state(&self) -> Result<PullSnapshot>;

    /// Open the persistent push subscription
    async fn open_push(&self) -> Result<FrameStream>;
}
