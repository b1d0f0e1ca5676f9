use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Error;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::store::SessionStore;
use crate::openai::sse::{Event, EventStreamParser};
use crate::openai::{
    CompletionClient, Message, Role, SharedCompletionClient, delta_content, message_content,
};

/// Public message for any failed upstream call. Details are only
/// logged.
pub const UPSTREAM_ERROR_MESSAGE: &str = "Chatbot failed to respond.";

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Chatbot failed to respond.")]
    Upstream(#[source] Error),
}

/// What the relay forwards to the caller of a streaming chat.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
    Error(String),
}

pub type ReplyStream = UnboundedReceiverStream<StreamEvent>;

pub enum ChatResponse {
    Reply(String),
    Stream(ReplyStream),
}

enum StreamOutcome {
    Completed(String),
    Disconnected,
}

#[derive(Clone)]
pub struct ChatRelay {
    store: SessionStore,
    client: SharedCompletionClient,
    system_message: Arc<str>,
    stream_error_frame: bool,
}

impl ChatRelay {
    pub fn new(client: SharedCompletionClient, store: SessionStore, system_message: &str) -> Self {
        Self {
            store,
            client,
            system_message: Arc::from(system_message),
            stream_error_frame: true,
        }
    }

    /// Whether a stream that fails upstream ends with an error event
    /// or just closes.
    pub fn with_stream_error_frame(mut self, enabled: bool) -> Self {
        self.stream_error_frame = enabled;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Add `message` to the session and get the model's next reply,
    /// either whole or as a stream of fragments.
    pub async fn handle(
        &self,
        session_id: Option<&str>,
        message: Option<&str>,
        stream: bool,
    ) -> Result<ChatResponse, ChatError> {
        if stream {
            self.reply_stream(session_id, message)
                .await
                .map(ChatResponse::Stream)
        } else {
            self.reply(session_id, message)
                .await
                .map(ChatResponse::Reply)
        }
    }

    pub async fn reply(
        &self,
        session_id: Option<&str>,
        message: Option<&str>,
    ) -> Result<String, ChatError> {
        let (session_id, message) = validate(session_id, message)?;

        let session = self.store.lock(session_id).await;
        session.append(Message::new(Role::User, message));
        let transcript = self.transcript(&session.history());

        let resp = self.client.completion(&transcript).await.map_err(|e| {
            tracing::error!(
                "Completion failed for session {}: {}. Root cause: {}",
                session_id,
                e,
                e.root_cause()
            );
            ChatError::Upstream(e)
        })?;

        let reply = message_content(&resp);
        session.append(Message::new(Role::Assistant, &reply));

        Ok(reply)
    }

    /// Start relaying a streamed reply. The session stays locked until
    /// the upstream stream ends or the receiver is dropped, and the
    /// assembled reply is recorded only when the stream completes.
    pub async fn reply_stream(
        &self,
        session_id: Option<&str>,
        message: Option<&str>,
    ) -> Result<ReplyStream, ChatError> {
        let (session_id, message) = validate(session_id, message)?;

        let session = self.store.lock(session_id).await;
        session.append(Message::new(Role::User, message));
        let transcript = self.transcript(&session.history());

        let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
        let client = Arc::clone(&self.client);
        let stream_error_frame = self.stream_error_frame;
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            match relay_stream(client.as_ref(), &transcript, &tx).await {
                Ok(StreamOutcome::Completed(reply)) => {
                    session.append(Message::new(Role::Assistant, &reply));
                }
                Ok(StreamOutcome::Disconnected) => {
                    tracing::info!("Client disconnected from chat stream {}", session_id);
                }
                Err(e) => {
                    tracing::error!(
                        "Chat stream failed for session {}: {}. Root cause: {}",
                        session_id,
                        e,
                        e.root_cause()
                    );
                    if stream_error_frame {
                        let _ = tx.send(StreamEvent::Error(UPSTREAM_ERROR_MESSAGE.to_string()));
                    }
                }
            }
        });

        Ok(UnboundedReceiverStream::new(rx))
    }

    fn transcript(&self, history: &[Message]) -> Vec<Message> {
        let mut transcript = Vec::with_capacity(history.len() + 1);
        transcript.push(Message::new(Role::System, &self.system_message));
        transcript.extend_from_slice(history);
        transcript
    }
}

fn validate<'a>(
    session_id: Option<&'a str>,
    message: Option<&'a str>,
) -> Result<(&'a str, &'a str), ChatError> {
    let session_id = session_id
        .filter(|s| !s.is_empty())
        .ok_or(ChatError::Validation("sessionId is required"))?;
    let message = message
        .filter(|m| !m.is_empty())
        .ok_or(ChatError::Validation("message is required"))?;
    Ok((session_id, message))
}

async fn relay_stream(
    client: &dyn CompletionClient,
    transcript: &[Message],
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<StreamOutcome, Error> {
    let mut upstream = client.completion_stream(transcript).await?;
    let mut parser = EventStreamParser::new();
    let mut reply = String::new();

    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => return Ok(StreamOutcome::Disconnected),
            chunk = upstream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };

        for event in parser.push(&chunk?) {
            if let ControlFlow::Break(outcome) = forward(event, &mut reply, tx) {
                return Ok(outcome);
            }
        }
    }

    // Upstream ended without the sentinel
    if let Some(event) = parser.finish() {
        if let ControlFlow::Break(outcome) = forward(event, &mut reply, tx) {
            return Ok(outcome);
        }
    }

    Ok(StreamOutcome::Completed(reply))
}

fn forward(
    event: Event,
    reply: &mut String,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> ControlFlow<StreamOutcome> {
    if event.data.trim() == DONE_SENTINEL {
        let _ = tx.send(StreamEvent::Done);
        return ControlFlow::Break(StreamOutcome::Completed(std::mem::take(reply)));
    }

    match delta_content(&event.data) {
        Ok(Some(fragment)) => {
            reply.push_str(&fragment);
            if tx.send(StreamEvent::Fragment(fragment)).is_err() {
                return ControlFlow::Break(StreamOutcome::Disconnected);
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Skipping invalid completion chunk {}: {}", event.data, e);
        }
    }
    ControlFlow::Continue(())
}
