//! Session state store
//!
//! In-process map from session id to conversation history plus
//! verification status. Each session sits behind its own async mutex so
//! concurrent turns on one session serialize their read-modify-write
//! sequences; different sessions run fully in parallel.
//!
//! Lives for the process lifetime only. No eviction, no persistence.

use crate::models::{Message, VerificationStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct Session {
    pub session_id: Uuid,
    messages: Vec<Message>,
    pub verification: VerificationStatus,
}

impl Session {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            verification: VerificationStatus::Unverified,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append-only; messages are immutable once added.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the session handle, creating it on first sight of the id.
    /// Callers lock the returned handle for the whole read-modify-write
    /// sequence of a turn.
    pub async fn get_or_create(&self, session_id: Uuid) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&session_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| {
                debug!(%session_id, "Session created");
                Arc::new(Mutex::new(Session::new(session_id)))
            })
            .clone()
    }

    pub async fn append(&self, session_id: Uuid, message: Message) {
        let session = self.get_or_create(session_id).await;
        let mut session = session.lock().await;
        session.append(message);
    }

    /// Snapshot of a session's history; empty for unknown ids.
    pub async fn get_history(&self, session_id: Uuid) -> Vec<Message> {
        let maybe = {
            let sessions = self.sessions.read().await;
            sessions.get(&session_id).cloned()
        };

        match maybe {
            Some(session) => session.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        let first = store.get_or_create(id).await;
        let second = store.get_or_create(id).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_history_round_trip() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        assert!(store.get_history(id).await.is_empty());

        store.append(id, Message::user("hello")).await;
        store.append(id, Message::assistant("hi there")).await;

        let history = store.get_history(id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(SessionStore::new());
        let id = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(id, Message::user(format!("turn {}", i))).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_history(id).await.len(), 16);
    }

    #[tokio::test]
    async fn test_verification_status_sticks_to_session() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        {
            let session = store.get_or_create(id).await;
            let mut session = session.lock().await;
            session.verification = VerificationStatus::Verified {
                customer_id: "C-1".to_string(),
                customer_name: "Jon Doe".to_string(),
            };
        }

        let session = store.get_or_create(id).await;
        let session = session.lock().await;
        assert!(session.verification.is_verified());
    }
}
