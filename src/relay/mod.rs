//! Streaming relay: agent events in, ordered SSE envelopes out.

pub mod envelope;
pub mod orchestrator;
pub mod sse;
pub mod translator;

pub use envelope::Envelope;
pub use orchestrator::{FailureKind, RelayConfig, TurnFailure, TurnOrchestrator, TurnPhase};
pub use sse::{SseError, SseWriter};
pub use translator::{translate, translate_stream};
