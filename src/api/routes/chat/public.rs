//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::chat::SessionSummary;
use crate::openai::Message;

/// Body of a chat request. Presence of the fields is checked by the
/// relay so a missing field is a 400 rather than a rejection.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Deserialize)]
pub struct ChatSessionsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ChatSessionsResponse {
    pub sessions: Vec<SessionSummary>,
    pub page: usize,
    pub limit: usize,
    pub total_sessions: usize,
    pub total_pages: usize,
}

#[derive(Serialize)]
pub struct ChatTranscriptResponse {
    pub session_id: String,
    pub transcript: Vec<Message>,
}
