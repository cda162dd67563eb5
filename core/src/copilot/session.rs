use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::{CopilotBackend, HttpCopilotBackend};
use crate::config::DashboardConfig;
use crate::model::ChatMessage;
use crate::Result;

pub const FALLBACK_MESSAGE: &str =
    "I wasn't able to reach the GreenHealth AI backend. Please check the API service.";

/// Canned prompts offered next to the input box
pub const SUGGESTIONS: [&str; 3] = [
    "Identify energy waste in ICU",
    "Show carbon offset progress",
    "Draft sustainability report",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Input was empty or whitespace
    Empty,
    /// A previous send has not resolved yet
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Answered { source_count: usize },
    /// Backend unreachable or answer malformed; the fallback message was recorded
    Degraded,
    /// Nothing was recorded or sent
    Rejected(RejectReason),
}

/// Clears the in-flight flag once the exchange task is done with the history
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Conversation with the copilot, alive for the lifetime of the dashboard
///
/// History is append-only and never truncated. At most one request is in flight.
/// The request runs in its own task: dropping a `send` future does not cancel it, and
/// the answer (or fallback) is still recorded before the slot frees up.
pub struct CopilotSession {
    backend: Arc<dyn CopilotBackend>,
    history: Arc<watch::Sender<Vec<ChatMessage>>>,
    sending: Arc<AtomicBool>,
}

impl CopilotSession {
    pub fn new(backend: Arc<dyn CopilotBackend>) -> Self {
        let (history, _) = watch::channel(Vec::new());
        Self {
            backend,
            history: Arc::new(history),
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn http(cfg: &DashboardConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpCopilotBackend::new(cfg)?)))
    }

    /// Ask a question.
    ///
    /// The trimmed question is recorded before the request goes out. Backend failures
    /// never surface as errors: they append `FALLBACK_MESSAGE` and return `Degraded`.
    pub async fn send(&self, input: &str) -> SendOutcome {
        let question = input.trim();
        if question.is_empty() {
            return SendOutcome::Rejected(RejectReason::Empty);
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return SendOutcome::Rejected(RejectReason::InFlight);
        }
        let guard = InFlight(Arc::clone(&self.sending));

        append(&self.history, ChatMessage::user(question));

        let task = tokio::spawn(exchange(
            Arc::clone(&self.backend),
            Arc::clone(&self.history),
            question.to_string(),
            guard,
        ));
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    target: "copilot",
                    error = %e,
                    "Copilot exchange panicked; recording fallback"
                );
                append(&self.history, ChatMessage::assistant(FALLBACK_MESSAGE, 0));
                SendOutcome::Degraded
            }
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.history.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.history.subscribe()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        if self.is_sending() {
            SessionState::Sending
        } else {
            SessionState::Idle
        }
    }
}

/// One request/response turn. Owns the in-flight slot until its reply is appended.
async fn exchange(
    backend: Arc<dyn CopilotBackend>,
    history: Arc<watch::Sender<Vec<ChatMessage>>>,
    question: String,
    _slot: InFlight,
) -> SendOutcome {
    match backend.ask(&question).await {
        Ok(reply) => {
            info!(target: "copilot", sources = reply.source_count, "Copilot answered");
            let source_count = reply.source_count;
            append(&history, ChatMessage::assistant(reply.answer, source_count));
            SendOutcome::Answered { source_count }
        }
        Err(e) => {
            warn!(target: "copilot", error = %e, "Copilot query failed; recording fallback");
            append(&history, ChatMessage::assistant(FALLBACK_MESSAGE, 0));
            SendOutcome::Degraded
        }
    }
}

fn append(history: &watch::Sender<Vec<ChatMessage>>, message: ChatMessage) {
    history.send_modify(|history| history.push(message));
}
