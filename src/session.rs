//! Session storage
//!
//! A session is everything that survives between two user turns of one
//! conversation: the booking context, the message history and the name of
//! the active handler. Callers own the store and pass it in explicitly;
//! sessions are created on demand, looked up by id, and purged once idle
//! for longer than the configured TTL.
//!
//! Each session sits behind its own async mutex. Holding the lock for the
//! whole turn keeps turns within one conversation strictly sequential while
//! different conversations proceed concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::context::SessionContext;
use crate::error::Result;
use crate::items::Message;

/// Conversation state carried across turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub context: SessionContext,
    pub history: Vec<Message>,
    pub active_handler: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session: new account number, empty history, `entry_handler` active.
    pub fn new(entry_handler: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            context: SessionContext::create_initial(),
            history: Vec::new(),
            active_handler: entry_handler.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the session has been idle for longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        (now - self.updated_at)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Defines the interface for session storage implementations.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Creates and stores a fresh session starting on `entry_handler`.
    async fn create(&self, entry_handler: &str) -> Result<SessionHandle>;

    async fn get(&self, id: &str) -> Result<Option<SessionHandle>>;

    /// Removes a session. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Drops every idle session older than `ttl`. Sessions with a turn in
    /// flight are kept. Returns how many were removed.
    async fn purge_expired(&self, ttl: Duration) -> Result<usize>;

    async fn len(&self) -> usize;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, entry_handler: &str) -> Result<SessionHandle> {
        let session = Session::new(entry_handler);
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.clone(), handle.clone());
        debug!(session_id = %id, "session created");
        Ok(handle)
    }

    async fn get(&self, id: &str) -> Result<Option<SessionHandle>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn purge_expired(&self, ttl: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_expired(ttl, now),
            Err(_) => true,
        });
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
        Ok(purged)
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
