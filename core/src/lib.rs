// GreenHealth Core Library
// Live sustainability telemetry client: dual-channel sync, derived analytics, copilot queries

pub mod analytics;
pub mod config;
pub mod copilot;
pub mod logging;
pub mod model;
pub mod readers;
pub mod transport;

// Export core types
pub use analytics::{DashboardView, KpiValue, Kpis, LeaderboardRow, SeriesPoint, TimeSeries};
pub use config::DashboardConfig;
pub use copilot::{CopilotBackend, CopilotSession, HttpCopilotBackend, SendOutcome};
pub use model::{Alert, AlertSet, ChatMessage, MetricSample, Role, ScoreReport, Severity};
pub use readers::{AlertReader, ScoreReader};
pub use transport::{
    HttpTelemetryBackend, PullSnapshot, PushState, TelemetryBackend, TelemetrySnapshot,
    TelemetryTransport, TransportConfig,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GreenHealthError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend returned status {status} for {url}")]
    StatusError { status: u16, url: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, GreenHealthError>;
