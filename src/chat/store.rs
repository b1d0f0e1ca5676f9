//! In-memory conversation history keyed by session id.
//!
//! At most `capacity` sessions are kept, the least recently used idle
//! one is evicted first. A session with a request in flight is never
//! evicted, so the store may briefly hold more than `capacity`
//! sessions. The system turn is never stored.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::openai::Message;

#[derive(Debug)]
struct Session {
    turns: RwLock<Vec<Message>>,
    updated_at: RwLock<DateTime<Utc>>,
    // Held for the duration of a chat request
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    fn new() -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            updated_at: RwLock::new(Utc::now()),
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn turns(&self) -> Vec<Message> {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, turn: Message) {
        self.turns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(turn);
        *self
            .updated_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    fn summary(&self, id: &str) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            turns: self
                .turns
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            updated_at: *self
                .updated_at
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub turns: usize,
    pub updated_at: DateTime<Utc>,
}

/// Exclusive access to one session's history. Other requests for the
/// same session wait in `SessionStore::lock` until this is dropped.
pub struct SessionGuard {
    session: Arc<Session>,
    _in_flight: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn history(&self) -> Vec<Message> {
        self.session.turns()
    }

    pub fn append(&self, turn: Message) {
        self.session.push(turn);
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<LruCache<String, Arc<Session>>>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(LruCache::unbounded())),
            capacity: capacity.max(1),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, session_id: &str) -> Arc<Session> {
        let mut cache = self.cache();
        if let Some(session) = cache.get(session_id) {
            return Arc::clone(session);
        }
        let session = Arc::new(Session::new());
        cache.put(session_id.to_string(), Arc::clone(&session));
        self.evict_idle(&mut cache);
        session
    }

    // Any reference outside the cache belongs to a request holding or
    // waiting for the session lock
    fn evict_idle(&self, cache: &mut LruCache<String, Arc<Session>>) {
        while cache.len() > self.capacity {
            let idle = cache
                .iter()
                .rev()
                .find(|(_, session)| Arc::strong_count(session) == 1)
                .map(|(id, _)| id.clone());
            let Some(id) = idle else {
                tracing::warn!("Chat sessions over capacity while in use: {}", cache.len());
                break;
            };
            cache.pop(&id);
            tracing::debug!("Evicted chat session {}", id);
        }
    }

    /// Turns recorded for `session_id`, oldest first. Unknown sessions
    /// have an empty history.
    pub fn get(&self, session_id: &str) -> Vec<Message> {
        self.cache()
            .get(session_id)
            .map(|session| session.turns())
            .unwrap_or_default()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.cache().contains(session_id)
    }

    /// Append a turn, creating the session if needed.
    pub fn append(&self, session_id: &str, turn: Message) {
        self.entry(session_id).push(turn);
    }

    /// Wait for exclusive access to a session, creating it if needed.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let session = self.entry(session_id);
        let in_flight = Arc::clone(&session.in_flight).lock_owned().await;
        SessionGuard {
            session,
            _in_flight: in_flight,
        }
    }

    /// Summaries of all sessions, most recently used first.
    pub fn list(&self) -> Vec<SessionSummary> {
        self.cache()
            .iter()
            .map(|(id, session)| session.summary(id))
            .collect()
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.cache().pop(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }
}
