// Copilot query client
//
// One conversational session per dashboard: single-slot request/response against the
// assistant backend, with failures turned into a visible fallback message.

mod client;
mod session;

pub use client::{CopilotAnswer, CopilotBackend, HttpCopilotBackend};
pub use session::{
    CopilotSession, RejectReason, SendOutcome, SessionState, FALLBACK_MESSAGE, SUGGESTIONS,
};
