use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::AppState;
use crate::error::*;
use crate::models::*;

// ============================================================================
// Authentication
// ============================================================================

pub const USER_ID_HEADER: &str = "x-user-id";

/// Answers "is this request authenticated, and who is calling".
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<CallerIdentity>;
}

/// Trusts the `X-User-ID` header set by the fronting auth proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentity;

impl IdentityResolver for HeaderIdentity {
    fn resolve(&self, headers: &HeaderMap) -> Option<CallerIdentity> {
        headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|user_id| CallerIdentity { user_id })
    }
}

fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<CallerIdentity> {
    state
        .identity
        .resolve(headers)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/chat",
            post(chat_turn_handler).fallback(method_not_allowed),
        )
        .route("/api/chats/{chat_id}/messages", get(chat_history_handler))
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Runs one chat turn and streams its envelopes back.
///
/// POST /api/chat
/// Body: ChatTurnRequest JSON
///
/// Returns: `text/event-stream` of `data: <envelope>` frames, or a JSON error
/// if the caller is unauthenticated or the body is malformed.
pub async fn chat_turn_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = state.identity.resolve(&headers);
    state.orchestrator.handle(caller, &body)
}

/// Lists the caller's own messages in one chat. Another user's chat with the
/// same id is invisible and reads as empty.
///
/// GET /api/chats/{chat_id}/messages
pub async fn chat_history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<ChatMessageRecord>>> {
    let caller = require_identity(&state, &headers).inspect_err(log_error)?;

    if !is_valid_chat_id(&chat_id) {
        return Err(AppError::bad_request(format!("Invalid chat id '{}'", chat_id)));
    }

    log::debug!("user {} loading history of chat {}", caller, chat_id);
    let messages = state.store.list(caller.user_id, &chat_id).await.inspect_err(|e| {
        log::warn!("Failed to load history of chat {}: {}", chat_id, e);
    })?;

    Ok(Json(messages))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(state.services.clone()))
}

async fn method_not_allowed() -> AppError {
    AppError::new(ErrorCode::MethodNotAllowed, "Only POST is supported on this endpoint")
}
