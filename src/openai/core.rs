use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::AppConfig;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A single turn in a conversation.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Raw response body chunks of a streaming completion.
pub type ChunkStream = BoxStream<'static, Result<Bytes, Error>>;

/// Seam between the chat relay and the upstream completion API.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request a single completion and return the decoded response
    /// body.
    async fn completion(&self, messages: &[Message]) -> Result<Value, Error>;

    /// Request a streaming completion and return the raw event-stream
    /// body as it arrives.
    async fn completion_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error>;
}

pub type SharedCompletionClient = Arc<dyn CompletionClient>;

/// Client for OpenAI compatible chat completion APIs.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.openai_api_hostname,
            &config.openai_api_key,
            &config.openai_model,
            config.openai_timeout,
        )
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        )
    }

    async fn send(&self, payload: &Value) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .context("Completion request failed")?
            .error_for_status()
            .context("Completion API returned an error status")?;
        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn completion(&self, messages: &[Message]) -> Result<Value, Error> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
        });
        let response = self
            .send(&payload)
            .await?
            .json()
            .await
            .context("Invalid completion response body")?;

        Ok(response)
    }

    async fn completion_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        let response = self.send(&payload).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(stream)
    }
}

/// Content of the first choice of a non-streaming completion. Missing
/// content is treated as an empty reply.
pub fn message_content(resp: &Value) -> String {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Extract `choices[0].delta.content` from one streamed completion
/// chunk. Returns `None` when the chunk carries no text.
pub fn delta_content(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk = serde_json::from_str::<CompletionChunk>(data)?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty());
    Ok(content)
}
