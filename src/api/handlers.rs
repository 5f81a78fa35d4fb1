//! HTTP request handlers

use super::sse::{sse_stream, TurnEvent};
use super::types::{ChatRequest, CreateSessionResponse, ErrorResponse, SuccessResponse};
use super::AppState;
use crate::runtime::{DisplayError, Renderer, SharedRuntime};
use crate::session::{DisplayTurn, Session, SessionSnapshot};
use crate::state_machine::Notice;
use crate::warehouse::QueryResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::OwnedMutexGuard;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Questions
        .route("/api/sessions/:id/chat", post(send_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session_id = state.sessions.create().await;
    Json(CreateSessionResponse { session_id })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    let session = handle
        .try_lock()
        .map_err(|_| AppError::Conflict("Session is answering a question".to_string()))?;
    Ok(Json(session.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    let _busy = handle
        .try_lock()
        .map_err(|_| AppError::Conflict("Session is answering a question".to_string()))?;
    state.sessions.remove(&id).await;
    Ok(Json(SuccessResponse { success: true }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
    let mut session = handle
        .try_lock()
        .map_err(|_| AppError::Conflict("Session is answering a question".to_string()))?;
    session.reset();
    tracing::info!(session_id = %id, "Session reset");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Question text is empty".to_string()));
    }

    let handle = state.sessions.get_or_create(&id).await;
    let session = handle
        .try_lock_owned()
        .map_err(|_| AppError::Conflict("Session is answering a question".to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_turn(state.runtime.clone(), session, id, req.text, tx));

    Ok(sse_stream(rx))
}

/// Run one turn while holding the session lock, forwarding everything to the
/// client channel.
async fn run_turn(
    runtime: Arc<SharedRuntime>,
    mut session: OwnedMutexGuard<Session>,
    session_id: String,
    query: String,
    tx: UnboundedSender<TurnEvent>,
) {
    let start = std::time::Instant::now();
    tracing::info!(session_id = %session_id, "Turn started");

    session.append_display(DisplayTurn::user(query.clone()));

    let renderer = ChannelRenderer { tx: tx.clone() };
    let mut chunks = runtime.handle_turn(&mut session, &query, &renderer).await;

    let mut answer = String::new();
    while let Some(chunk) = chunks.next().await {
        answer.push_str(&chunk);
        if tx.send(TurnEvent::Chunk { text: chunk }).is_err() {
            tracing::info!(session_id = %session_id, "Client disconnected mid-answer");
            return;
        }
    }

    session.append_display(DisplayTurn::assistant(answer.clone()));
    drop(session);

    tracing::info!(
        session_id = %session_id,
        duration_ms = %start.elapsed().as_millis(),
        answer_len = answer.len(),
        "Turn finished"
    );
    let _ = tx.send(TurnEvent::Done { answer });
}

/// Renderer that forwards notices and tables to the SSE channel
struct ChannelRenderer {
    tx: UnboundedSender<TurnEvent>,
}

impl Renderer for ChannelRenderer {
    fn notice(&self, notice: &Notice) {
        let _ = self.tx.send(TurnEvent::Notice {
            notice: notice.clone(),
        });
    }

    fn show_table(&self, result: &QueryResult) -> Result<(), DisplayError> {
        self.tx
            .send(TurnEvent::Table {
                result: result.clone(),
            })
            .map_err(|_| DisplayError("client disconnected".to_string()))
    }
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("analyst-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
