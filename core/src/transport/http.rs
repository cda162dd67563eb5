use async_trait::async_trait;
use futures_util::{future, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::backend::{FrameStream, PullSnapshot, TelemetryBackend};
use super::wire::{AlertsEnvelope, MetricsEnvelope, ScoreEnvelope};
use crate::config::DashboardConfig;
use crate::{GreenHealthError, Result};

/// REST + WebSocket backend
///
/// Pull: `GET /metrics`, `GET /alerts`, `GET /sustainability-score`, issued concurrently.
/// Push: `/ws/metrics` on the same host with the scheme switched to `ws`/`wss`.
#[derive(Clone)]
pub struct HttpTelemetryBackend {
    http: Client,
    cfg: DashboardConfig,
}

impl HttpTelemetryBackend {
    pub fn new(cfg: DashboardConfig) -> Result<Self> {
        let http = Client::builder().timeout(cfg.request_timeout()).build()?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(DashboardConfig::from_env())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(target: "telemetry.pull", url = %url, "GET");
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GreenHealthError::StatusError {
                status: status.as_u16(),
                url,
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| GreenHealthError::MalformedPayload(format!("{url}: {e}")))
    }
}

#[async_trait]
impl TelemetryBackend for HttpTelemetryBackend {
    async fn fetch_state(&self) -> Result<PullSnapshot> {
        let (metrics, alerts, score) = tokio::try_join!(
            self.get_json::<MetricsEnvelope>(self.cfg.metrics_url()),
            self.get_json::<AlertsEnvelope>(self.cfg.alerts_url()),
            self.get_json::<ScoreEnvelope>(self.cfg.score_url()),
        )?;
        Ok(PullSnapshot {
            metrics: metrics.into_metrics()?,
            alerts: alerts.into_alerts(),
            score: score.into_report(),
        })
    }

    async fn open_push(&self) -> Result<FrameStream> {
        let url = self.cfg.push_url();
        debug!(target: "telemetry.push", url = %url, "Opening WebSocket");
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        // Control frames are handled by tungstenite; binary frames are not JSON text.
        let frames = ws.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(GreenHealthError::from(e))),
            })
        });
        Ok(frames.boxed())
    }
}
