use std::sync::Arc;

use crate::chat::{ChatRelay, SessionStore};
use crate::core::AppConfig;
use crate::openai::{OpenAiClient, SharedCompletionClient};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub relay: ChatRelay,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(client: SharedCompletionClient, config: AppConfig) -> Self {
        let store = SessionStore::new(config.max_sessions);
        let relay = ChatRelay::new(client, store, &config.system_message)
            .with_stream_error_frame(config.stream_error_frame);
        Self { relay, config }
    }

    /// State backed by the real upstream completion API.
    pub fn from_config(config: AppConfig) -> Self {
        let client = Arc::new(OpenAiClient::from_config(&config));
        Self::new(client, config)
    }
}
