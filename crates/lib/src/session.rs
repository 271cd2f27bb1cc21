//! Conversation sessions: durable, append-only message history per channel user.
//!
//! Sessions are keyed by id and owned for writes by their channel adapter.
//! The store broadcasts change events so widget instances can mirror state
//! without polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// Transport a session belongs to. Each channel has its own identity scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Whatsapp,
    Telegram,
    Slack,
}

/// A single message in a session. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            role: role.to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// History entry handed to the reply backend: role and content only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// A session record: identity, ordered message history, and the handoff flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: String,
    pub channel: Channel,
    pub user_identifier: String,
    pub messages: Vec<SessionMessage>,
    pub is_paused: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

/// Change event mirrored to subscribers (widget instances, test windows).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended {
        session_id: SessionId,
        message: SessionMessage,
    },
    PauseChanged {
        session_id: SessionId,
        paused: bool,
    },
}

/// Abstract session document store. Writes go through the owning channel
/// adapter; reads may come from anywhere on the widget path.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create the session if it does not exist. Idempotent: re-arriving
    /// deliveries with the same id converge on one record.
    async fn create_if_absent(
        &self,
        id: &str,
        tenant_id: &str,
        channel: Channel,
        user_identifier: &str,
    );

    /// Return a clone of the session.
    async fn get(&self, id: &str) -> Result<Session, SessionError>;

    /// Append a message. Atomic with respect to concurrent appends on the
    /// same id (no read-modify-write race).
    async fn append_message(&self, id: &str, message: SessionMessage) -> Result<(), SessionError>;

    /// Last `n` messages mapped to role + content. A missing session reads
    /// as `NotFound`; adapters treat that as empty history, never as fatal.
    async fn recent_history(&self, id: &str, n: usize) -> Result<Vec<HistoryEntry>, SessionError>;

    async fn set_paused(&self, id: &str, paused: bool) -> Result<(), SessionError>;

    async fn is_paused(&self, id: &str) -> bool;

    /// Subscribe to change events for live mirroring.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// In-memory store. Sessions are never deleted here; "clear chat" abandons
/// the old id and the record stays behind.
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<SessionId, Session>>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_if_absent(
        &self,
        id: &str,
        tenant_id: &str,
        channel: Channel,
        user_identifier: &str,
    ) {
        let mut g = self.inner.write().await;
        if g.contains_key(id) {
            return;
        }
        g.insert(
            id.to_string(),
            Session {
                id: id.to_string(),
                tenant_id: tenant_id.to_string(),
                channel,
                user_identifier: user_identifier.to_string(),
                messages: Vec::new(),
                is_paused: false,
                created_at: Utc::now(),
            },
        );
    }

    async fn get(&self, id: &str) -> Result<Session, SessionError> {
        self.inner
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn append_message(&self, id: &str, message: SessionMessage) -> Result<(), SessionError> {
        {
            let mut g = self.inner.write().await;
            let session = g
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            session.messages.push(message.clone());
        }
        let _ = self.event_tx.send(SessionEvent::MessageAppended {
            session_id: id.to_string(),
            message,
        });
        Ok(())
    }

    async fn recent_history(&self, id: &str, n: usize) -> Result<Vec<HistoryEntry>, SessionError> {
        let g = self.inner.read().await;
        let session = g
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let start = session.messages.len().saturating_sub(n);
        Ok(session.messages[start..]
            .iter()
            .map(|m| HistoryEntry {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> Result<(), SessionError> {
        {
            let mut g = self.inner.write().await;
            let session = g
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            session.is_paused = paused;
        }
        let _ = self.event_tx.send(SessionEvent::PauseChanged {
            session_id: id.to_string(),
            paused,
        });
        Ok(())
    }

    async fn is_paused(&self, id: &str) -> bool {
        self.inner
            .read()
            .await
            .get(id)
            .map(|s| s.is_paused)
            .unwrap_or(false)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = MemorySessionStore::new();
        store.create_if_absent("s1", "t1", Channel::Whatsapp, "+490001").await;
        store
            .append_message("s1", SessionMessage::user("hello"))
            .await
            .expect("append");
        store.create_if_absent("s1", "t1", Channel::Whatsapp, "+490001").await;
        let session = store.get("s1").await.expect("get");
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn history_is_append_only_and_ordered() {
        let store = MemorySessionStore::new();
        store.create_if_absent("s1", "t1", Channel::Web, "visitor").await;
        for i in 0..5 {
            store
                .append_message("s1", SessionMessage::user(format!("m{}", i)))
                .await
                .expect("append");
        }
        let history = store.recent_history("s1", 10).await.expect("history");
        let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn recent_history_truncates_to_last_n() {
        let store = MemorySessionStore::new();
        store.create_if_absent("s1", "t1", Channel::Web, "visitor").await;
        for i in 0..8 {
            store
                .append_message("s1", SessionMessage::user(format!("m{}", i)))
                .await
                .expect("append");
        }
        let history = store.recent_history("s1", 6).await.expect("history");
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].content, "m2");
        assert_eq!(history[5].content, "m7");
    }

    #[tokio::test]
    async fn missing_session_reads_as_not_found() {
        let store = MemorySessionStore::new();
        assert!(matches!(
            store.recent_history("nope", 6).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(!store.is_paused("nope").await);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let store = Arc::new(MemorySessionStore::new());
        store.create_if_absent("s1", "t1", Channel::Whatsapp, "+490001").await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_message("s1", SessionMessage::user(format!("m{}", i)))
                    .await
            }));
        }
        for h in handles {
            h.await.expect("join").expect("append");
        }
        let session = store.get("s1").await.expect("get");
        assert_eq!(session.messages.len(), 20);
    }

    #[tokio::test]
    async fn subscribers_see_appends() {
        let store = MemorySessionStore::new();
        store.create_if_absent("s1", "t1", Channel::Web, "visitor").await;
        let mut rx = store.subscribe();
        store
            .append_message("s1", SessionMessage::assistant("hi"))
            .await
            .expect("append");
        match rx.recv().await.expect("event") {
            SessionEvent::MessageAppended { session_id, message } => {
                assert_eq!(session_id, "s1");
                assert_eq!(message.content, "hi");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
