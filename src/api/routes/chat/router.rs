//! Router for the chat API

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use axum_extra::extract::Query;
use tokio_stream::StreamExt as _;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::SharedState;
use crate::chat::{ChatResponse, ReplyStream, StreamEvent};

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

// SSE field values cannot hold a carriage return, so line breaks are
// normalized to `\n` and each line becomes its own `data:` field
fn sse_data(data: &str) -> String {
    data.replace("\r\n", "\n").replace('\r', "\n")
}

fn sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Fragment(fragment) => Event::default().data(sse_data(&fragment)),
        StreamEvent::Done => Event::default().data("[DONE]"),
        StreamEvent::Error(message) => Event::default().event("error").data(sse_data(&message)),
    }
}

fn sse_response(stream: ReplyStream) -> Response {
    let events = stream.map(|event| Ok::<Event, Infallible>(sse_event(event)));
    Sse::new(events)
        .keep_alive(KeepAlive::default().text("keep-alive"))
        .into_response()
}

async fn respond(
    state: SharedState,
    payload: public::ChatRequest,
    stream: bool,
) -> Result<Response, ApiError> {
    let resp = state
        .relay
        .handle(
            payload.session_id.as_deref(),
            payload.message.as_deref(),
            stream,
        )
        .await?;

    let resp = match resp {
        ChatResponse::Reply(reply) => Json(public::ChatReply { reply }).into_response(),
        ChatResponse::Stream(stream) => sse_response(stream),
    };
    Ok(resp)
}

/// Add a message to a chat session and reply with the model's
/// response, streamed when the body asks for it
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<public::ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let stream = payload.stream;
    respond(state, payload, stream).await
}

/// Add a message to a chat session and stream the response
async fn chat_stream_handler(
    State(state): State<SharedState>,
    payload: Result<Json<public::ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    respond(state, payload, true).await
}

/// Get a list of all chat sessions held in memory
async fn chat_list(
    State(state): State<SharedState>,
    Query(params): Query<public::ChatSessionsQuery>,
) -> Result<Json<public::ChatSessionsResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let offset = (page - 1).saturating_mul(limit);

    let sessions = state.relay.store().list();
    let total_sessions = sessions.len();
    let total_pages = total_sessions.div_ceil(limit);
    let sessions = sessions.into_iter().skip(offset).take(limit).collect();

    Ok(Json(public::ChatSessionsResponse {
        sessions,
        page,
        limit,
        total_sessions,
        total_pages,
    }))
}

/// Get a single chat session's transcript by ID
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::ChatTranscriptResponse>, ApiError> {
    let store = state.relay.store();
    if !store.contains(&id) {
        return Err(ApiError::not_found(&format!("Chat session {} not found", id)));
    }

    let transcript = store.get(&id);
    Ok(Json(public::ChatTranscriptResponse {
        session_id: id,
        transcript,
    }))
}

/// Forget a chat session's history
async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.relay.store().remove(&id) {
        return Err(ApiError::not_found(&format!("Chat session {} not found", id)));
    }
    tracing::info!("Removed chat session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Create the chat router. `/sessions` is matched before `/{id}`, so a
/// session named `sessions` is only reachable through the chat
/// endpoints and the listing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/stream", post(chat_stream_handler))
        .route("/sessions", get(chat_list))
        .route("/{id}", get(chat_session).delete(delete_session))
}
