use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::{GreenHealthError, Result};

/// Answer text plus the number of sources the assistant cited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotAnswer {
    pub answer: String,
    pub source_count: usize,
}

/// Opaque question/answer service
#[async_trait]
pub trait CopilotBackend: Send + Sync {
    async fn ask(&self, question: &str) -> Result<CopilotAnswer>;
}

/// `POST /copilot-query` with `{ "question": ... }` returning `{ "answer", "sources"? }`
#[derive(Clone)]
pub struct HttpCopilotBackend {
    http: Client,
    url: String,
}

impl HttpCopilotBackend {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        let http = Client::builder().timeout(cfg.copilot_timeout()).build()?;
        Ok(Self {
            http,
            url: cfg.copilot_url(),
        })
    }
}

#[async_trait]
impl CopilotBackend for HttpCopilotBackend {
    async fn ask(&self, question: &str) -> Result<CopilotAnswer> {
        debug!(target: "copilot", url = %self.url, "POST copilot query");
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "question": question }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GreenHealthError::StatusError {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = resp.bytes().await?;
        let val: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| GreenHealthError::MalformedPayload(format!("copilot response: {e}")))?;
        parse_answer(&val)
    }
}

/// `answer` must be a string; `sources` counts only when it is an array.
fn parse_answer(val: &serde_json::Value) -> Result<CopilotAnswer> {
    let answer = val
        .get("answer")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            GreenHealthError::MalformedPayload("copilot response has no answer text".into())
        })?
        .to_string();
    let source_count = val
        .get("sources")
        .and_then(|v| v.as_array())
        .map(|s| s.len())
        .unwrap_or(0);
    Ok(CopilotAnswer {
        answer,
        source_count,
    })
}
