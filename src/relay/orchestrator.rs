use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use futures::{FutureExt, StreamExt};
use uuid::Uuid;

use crate::agents::{AgentClient, AgentMessage};
use crate::error::{log_error, AppError, ErrorResponse};
use crate::models::{CallerIdentity, ChatTurnRequest, Role};
use crate::relay::envelope::Envelope;
use crate::relay::sse::SseWriter;
use crate::relay::translator::translate_stream;
use crate::storage::MessageStore;

pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing your message";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frames buffered between the turn task and the response body.
    pub sse_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { sse_buffer: 64 }
    }
}

// ============================================================================
// Turn state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Init,
    Authenticating,
    Streaming,
    Draining,
    Terminating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The agent could not be invoked or its stream failed.
    Agent,
    /// The client went away; nothing more can be written.
    Transport,
    /// The turn task panicked.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TurnFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    fn agent(err: impl fmt::Display) -> Self {
        Self::new(FailureKind::Agent, err.to_string())
    }

    fn transport() -> Self {
        Self::new(FailureKind::Transport, "client disconnected")
    }

    fn internal() -> Self {
        Self::new(FailureKind::Internal, GENERIC_FAILURE_MESSAGE)
    }
}

struct Turn {
    id: Uuid,
    caller: CallerIdentity,
    request: ChatTurnRequest,
    phase: TurnPhase,
}

impl Turn {
    fn enter(&mut self, phase: TurnPhase) {
        log::debug!("turn {} [{}]: {:?} -> {:?}", self.id, self.request.chat_id, self.phase, phase);
        self.phase = phase;
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one chat turn from request to closed stream.
#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Arc<dyn MessageStore>,
    agent: Arc<dyn AgentClient>,
    config: RelayConfig,
}

impl TurnOrchestrator {
    pub fn new(store: Arc<dyn MessageStore>, agent: Arc<dyn AgentClient>, config: RelayConfig) -> Self {
        Self {
            store,
            agent,
            config,
        }
    }

    /// Authenticates and validates synchronously, then opens the stream and
    /// hands the rest of the turn to a background task. Failures before the
    /// stream opens are plain JSON error responses.
    pub fn handle(&self, caller: Option<CallerIdentity>, body: &[u8]) -> Response {
        let turn_id = Uuid::now_v7();
        log::debug!("turn {}: {:?} -> {:?}", turn_id, TurnPhase::Init, TurnPhase::Authenticating);

        let Some(caller) = caller else {
            return reject(turn_id, AppError::unauthorized("Authentication required"));
        };

        let request = match ChatTurnRequest::parse(body) {
            Ok(request) => request,
            Err(err) => return reject(turn_id, err),
        };

        let mut turn = Turn {
            id: turn_id,
            caller,
            request,
            phase: TurnPhase::Authenticating,
        };
        turn.enter(TurnPhase::Streaming);

        let (writer, response) = SseWriter::open(self.config.sse_buffer);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(writer, turn).await;
        });

        response
    }

    async fn run(self, mut writer: SseWriter, mut turn: Turn) {
        log::info!(
            "turn {} started for chat {} (user {})",
            turn.id,
            turn.request.chat_id,
            turn.caller
        );

        let driven = AssertUnwindSafe(self.drive(&mut writer, &mut turn))
            .catch_unwind()
            .await;
        let outcome = match driven {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("turn {} panicked", turn.id);
                Err(TurnFailure::internal())
            }
        };

        turn.enter(TurnPhase::Terminating);
        match outcome {
            Ok(()) => {
                if let Err(e) = writer.write(&Envelope::Done).await {
                    log::debug!("turn {}: done not delivered: {}", turn.id, e);
                }
                log::info!("turn {} completed", turn.id);
            }
            Err(failure) if failure.kind == FailureKind::Transport => {
                log::info!("turn {}: client disconnected, stopping", turn.id);
            }
            Err(failure) => {
                log::error!("turn {} failed: {}", turn.id, failure.message);
                if let Err(e) = writer.write(&Envelope::error(failure.message.clone())).await {
                    log::debug!("turn {}: error not delivered: {}", turn.id, e);
                }
                self.persist(&turn, Role::Assistant, &failure.message).await;
            }
        }

        writer.close();
    }

    /// Everything between stream-open and the terminal envelope.
    async fn drive(&self, writer: &mut SseWriter, turn: &mut Turn) -> Result<(), TurnFailure> {
        writer
            .write(&Envelope::Connected)
            .await
            .map_err(|_| TurnFailure::transport())?;

        self.persist(turn, Role::User, &turn.request.new_message).await;

        let messages: Vec<AgentMessage> = turn
            .request
            .conversation()
            .into_iter()
            .map(AgentMessage::from)
            .collect();

        let events = tokio::select! {
            invoked = self.agent.invoke(messages, &turn.request.chat_id) => {
                invoked.map_err(TurnFailure::agent)?
            }
            _ = writer.closed() => return Err(TurnFailure::transport()),
        };

        turn.enter(TurnPhase::Draining);
        let mut envelopes = pin!(translate_stream(events));
        loop {
            // A silent agent must not keep the turn alive after the client left.
            let next = tokio::select! {
                next = envelopes.next() => next,
                _ = writer.closed() => return Err(TurnFailure::transport()),
            };
            let Some(item) = next else {
                break;
            };

            let envelope = item.map_err(TurnFailure::agent)?;
            writer
                .write(&envelope)
                .await
                .map_err(|_| TurnFailure::transport())?;
        }

        Ok(())
    }

    /// Best-effort append; failures are logged and the turn carries on.
    async fn persist(&self, turn: &Turn, role: Role, content: &str) {
        let appended = self
            .store
            .append(turn.caller.user_id, &turn.request.chat_id, role, content)
            .await;
        if let Err(e) = appended {
            log::warn!(
                "turn {}: failed to persist {} message for chat {}: {}",
                turn.id,
                role,
                turn.request.chat_id,
                e
            );
        }
    }
}

fn reject(turn_id: Uuid, error: AppError) -> Response {
    log_error(&error);
    ErrorResponse::new(error)
        .with_request_id(turn_id.to_string())
        .into_response()
}
