//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use axum::{Router, body::Body};
use axum::body::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};

use casecrux::api::{AppState, app};
use casecrux::core::AppConfig;
use casecrux::openai::{ChunkStream, CompletionClient, Message};

/// Stands in for the upstream completion API and records every
/// transcript it receives.
#[derive(Default)]
pub struct FakeClient {
    reply: Option<String>,
    chunks: Vec<Result<String, String>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl FakeClient {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Default::default()
        }
    }

    /// Non-streaming calls fail, streams are empty.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Ok(c.to_string())).collect(),
            ..Default::default()
        }
    }

    pub fn streaming_then_error(chunks: &[&str], error: &str) -> Self {
        let mut client = Self::streaming(chunks);
        client.chunks.push(Err(error.to_string()));
        client
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn completion(&self, messages: &[Message]) -> Result<Value, Error> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Some(reply) => Ok(json!({
                "id": "chatcmpl-123",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}}]
            })),
            None => Err(anyhow!("upstream unavailable")),
        }
    }

    async fn completion_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let chunks: Vec<Result<Bytes, Error>> = self
            .chunks
            .iter()
            .cloned()
            .map(|c| c.map(Bytes::from).map_err(|e| anyhow!(e)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::with_api_key("test-api-key");
    config.system_message = String::from("You are a helpful assistant.");
    config.max_sessions = 100;
    config
}

/// Creates a test application router backed by `client`.
pub fn test_app(client: Arc<FakeClient>) -> Router {
    test_app_with_config(client, test_config())
}

pub fn test_app_with_config(client: Arc<FakeClient>, config: AppConfig) -> Router {
    let app_state = AppState::new(client, config);
    app(Arc::new(app_state))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub fn chat_request(uri: &str, body: Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
