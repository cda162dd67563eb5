//! Shared fakes for telemetry transport tests
//!
//! `FakeBackend` stands in for the REST/WebSocket backend:
//! - pulls either return a fixed snapshot (`auto`) or wait for the test to feed one
//! - push connects follow a script of streams and failures; an empty script fails

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::{stream, StreamExt};
use greenhealth_core::model::{Alert, AlertSet, MetricSample, ScoreReport, Severity};
use greenhealth_core::transport::{FrameStream, PullSnapshot, ReconnectPolicy, TelemetryBackend};
use greenhealth_core::{GreenHealthError, Result, TransportConfig};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout, Duration};

pub type PullFeed = mpsc::UnboundedSender<Result<PullSnapshot>>;
pub type FrameFeed = mpsc::UnboundedSender<Result<String>>;

enum PushScript {
    Fail,
    Stream(mpsc::UnboundedReceiver<Result<String>>),
}

pub struct FakeBackend {
    auto_pull: Option<PullSnapshot>,
    pull_rx: Mutex<mpsc::UnboundedReceiver<Result<PullSnapshot>>>,
    push_script: std::sync::Mutex<VecDeque<PushScript>>,
    pulls: AtomicUsize,
    opens: AtomicUsize,
}

impl FakeBackend {
    /// Pulls block until the test sends a result on the returned feed
    pub fn scripted() -> (Arc<Self>, PullFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::with_rx(None, rx)), tx)
    }

    /// Every pull immediately returns `snapshot`
    pub fn auto(snapshot: PullSnapshot) -> Arc<Self> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self::with_rx(Some(snapshot), rx))
    }

    fn with_rx(
        auto_pull: Option<PullSnapshot>,
        rx: mpsc::UnboundedReceiver<Result<PullSnapshot>>,
    ) -> Self {
        Self {
            auto_pull,
            pull_rx: Mutex::new(rx),
            push_script: std::sync::Mutex::new(VecDeque::new()),
            pulls: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }

    /// Queue a successful push connect; frames sent on the feed are delivered in order.
    /// Dropping the feed closes the connection.
    pub fn push_stream(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_script
            .lock()
            .unwrap()
            .push_back(PushScript::Stream(rx));
        tx
    }

    pub fn push_fail(&self) {
        self.push_script.lock().unwrap().push_back(PushScript::Fail);
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryBackend for FakeBackend {
    async fn fetch_state(&self) -> Result<PullSnapshot> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(snapshot) = &self.auto_pull {
            return Ok(snapshot.clone());
        }
        let mut rx = self.pull_rx.lock().await;
        match rx.recv().await {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn open_push(&self) -> Result<FrameStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.push_script.lock().unwrap().pop_front();
        match next {
            Some(PushScript::Stream(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(PushScript::Fail) | None => Err(GreenHealthError::MalformedPayload(
                "push endpoint unavailable".into(),
            )),
        }
    }
}

pub fn pull_only_config() -> TransportConfig {
    TransportConfig {
        pull_interval: Duration::from_secs(5),
        push_enabled: false,
        reconnect: ReconnectPolicy::default(),
    }
}

pub fn push_config(max_retries: u32) -> TransportConfig {
    TransportConfig {
        pull_interval: Duration::from_secs(5),
        push_enabled: true,
        reconnect: ReconnectPolicy {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        },
    }
}

pub fn sample(dept: &str, energy: f64, waste: f64, paper: f64) -> MetricSample {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    MetricSample::new(dept, energy, waste, paper, ts)
}

pub fn alert(id: &str, severity: Severity) -> Alert {
    Alert {
        id: id.to_string(),
        kind: "energy_anomaly".to_string(),
        department: "ICU".to_string(),
        severity,
        message: format!("alert {id}"),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    }
}

pub fn pulled(metrics: Vec<MetricSample>, alerts: Vec<Alert>, score: f64) -> PullSnapshot {
    PullSnapshot {
        metrics,
        alerts: AlertSet::from(alerts),
        score: ScoreReport::new(score),
    }
}

pub fn frame(metrics: &[MetricSample]) -> String {
    json!({ "metrics": metrics }).to_string()
}

pub fn backend_down() -> GreenHealthError {
    GreenHealthError::StatusError {
        status: 503,
        url: "http://localhost:8000/metrics".into(),
    }
}

/// Poll `cond` on the (paused) test clock; panics after a minute of virtual time
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(60), async {
        while !cond() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}
