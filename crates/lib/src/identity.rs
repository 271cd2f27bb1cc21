//! Session identity per channel.
//!
//! The widget gets a random id persisted across reloads; push channels get a
//! deterministic hash of (tenant, sender) so duplicate deliveries converge on
//! one session.

use crate::session::SessionId;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Mutex;

/// Pluggable persistence for the widget session id (the client-local storage
/// equivalent). File-backed by default; in-memory for tests.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Option<SessionId>;
    /// Best effort; a failed save means a fresh id on the next visit.
    fn save(&self, id: &str);
}

/// Stores the session id in a small file (default `~/.parley/widget-session`).
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".parley").join("widget-session"))
            .unwrap_or_else(|| PathBuf::from("widget-session"))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Option<SessionId> {
        let s = std::fs::read_to_string(&self.path).ok()?;
        let id = s.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    fn save(&self, id: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("identity: creating {} failed: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, id) {
            log::warn!("identity: saving session id failed: {}", e);
        }
    }
}

/// In-memory identity store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Option<SessionId>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Option<SessionId> {
        self.inner.lock().ok().and_then(|g| g.clone())
    }

    fn save(&self, id: &str) {
        if let Ok(mut g) = self.inner.lock() {
            *g = Some(id.to_string());
        }
    }
}

/// Widget-side identity: loads the persisted id or generates a fresh one.
pub struct WidgetIdentity {
    store: Box<dyn IdentityStore>,
}

impl WidgetIdentity {
    pub fn new(store: Box<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// The current session id, generating and persisting one on first visit.
    pub fn current(&self) -> SessionId {
        if let Some(id) = self.store.load() {
            return id;
        }
        let id = fresh_widget_id();
        self.store.save(&id);
        id
    }

    /// "Clear chat": issue a new id. The old session record is abandoned,
    /// not deleted.
    pub fn rotate(&self) -> SessionId {
        let id = fresh_widget_id();
        self.store.save(&id);
        id
    }
}

fn fresh_widget_id() -> SessionId {
    format!("web-{}", uuid::Uuid::new_v4())
}

/// Deterministic session id for push channels: two deliveries with the same
/// (tenant, sender) always map to the same session.
pub fn push_session_id(tenant_id: &str, user_identifier: &str) -> SessionId {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(b":");
    hasher.update(user_identifier.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_session_id_is_deterministic() {
        let a = push_session_id("tenant-1", "+15551234567");
        let b = push_session_id("tenant-1", "+15551234567");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn push_session_id_differs_per_tenant_and_sender() {
        let a = push_session_id("tenant-1", "+15551234567");
        let b = push_session_id("tenant-2", "+15551234567");
        let c = push_session_id("tenant-1", "+15559999999");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn widget_identity_persists_and_rotates() {
        let identity = WidgetIdentity::new(Box::new(MemoryIdentityStore::new()));
        let first = identity.current();
        assert_eq!(identity.current(), first);
        let rotated = identity.rotate();
        assert_ne!(rotated, first);
        assert_eq!(identity.current(), rotated);
    }

    #[test]
    fn file_store_round_trips() {
        let path = std::env::temp_dir().join(format!("parley-id-{}", uuid::Uuid::new_v4()));
        let store = FileIdentityStore::new(path.clone());
        assert!(store.load().is_none());
        store.save("web-abc");
        assert_eq!(store.load().as_deref(), Some("web-abc"));
        let _ = std::fs::remove_file(path);
    }
}
