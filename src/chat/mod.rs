//! Session scoped chat over the upstream completion API

mod relay;
mod store;

pub use relay::{
    ChatError, ChatRelay, ChatResponse, ReplyStream, StreamEvent, UPSTREAM_ERROR_MESSAGE,
};
pub use store::{SessionGuard, SessionStore, SessionSummary};
