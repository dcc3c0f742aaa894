//! Route handler functions.
//!
//! Each handler extracts parameters via axum extractors, invokes the
//! assistant's event-handler surface, and returns JSON - or, for message
//! replies, a server-sent-event stream of `token` / `notice` / `error` /
//! `done` events in arrival order.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use docent_core::types::ChatSettings;
use docent_chat::RouterReply;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub greeting: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Display name of the uploaded document.
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document: String,
    pub chunks: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.assistant.active_sessions(),
    })
}

/// POST /sessions - start a session and return its id and greeting.
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Json<CreateSessionResponse> {
    let name = body.and_then(|Json(req)| req.name);
    let session_id = Uuid::new_v4().to_string();
    let greeting = state.assistant.on_session_start(&session_id, name);

    Json(CreateSessionResponse {
        session_id,
        greeting,
    })
}

/// PUT /sessions/{id}/settings - validate and apply chat settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(settings): Json<ChatSettings>,
) -> Result<Json<SettingsResponse>, ApiError> {
    state.assistant.on_settings(&session_id, settings)?;
    Ok(Json(SettingsResponse {
        message: "Settings updated! You can now chat".to_string(),
    }))
}

/// POST /sessions/{id}/document - ingest an uploaded PDF.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }

    let name = params.name.unwrap_or_else(|| "document.pdf".to_string());
    tracing::info!(session_id = %session_id, document = %name, bytes = body.len(), "Processing upload");
    let report = state.assistant.on_upload(&session_id, &name, &body).await?;

    Ok(Json(UploadResponse {
        message: format!("You can now ask questions about {}.", report.document),
        document: report.document,
        chunks: report.chunks,
    }))
}

/// POST /sessions/{id}/message - route a message and stream the reply.
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>>, ApiError> {
    let reply = state.assistant.on_message(&session_id, &request.text).await?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    tokio::spawn(async move {
        match reply {
            RouterReply::Notice(text) => {
                let _ = tx.send(Ok(Event::default().event("notice").data(text))).await;
                let _ = tx.send(Ok(Event::default().event("done").data(""))).await;
            }
            RouterReply::Tokens(mut stream) => {
                while let Some(item) = stream.recv().await {
                    match item {
                        Ok(fragment) => {
                            let event = Event::default().event("token").data(fragment);
                            if tx.send(Ok(event)).await.is_err() {
                                // Client went away; dropping the stream
                                // cancels the producer upstream.
                                return;
                            }
                        }
                        Err(e) => {
                            let event = Event::default().event("error").data(e.to_string());
                            let _ = tx.send(Ok(event)).await;
                            return;
                        }
                    }
                }
                let _ = tx.send(Ok(Event::default().event("done").data(""))).await;
            }
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// POST /sessions/{id}/actions/thanks - acknowledge the thanks action.
pub async fn thanks_action(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let message = state.assistant.on_action(&session_id, "thanks")?;
    Ok(Json(ActionResponse { message }))
}

/// DELETE /sessions/{id} - end a session.
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    state.assistant.on_session_end(&session_id);
    StatusCode::NO_CONTENT
}
