//! Channel registry: register and look up channel handles by id.
//!
//! Keys are `channel:tenant` (e.g. "whatsapp:tenant-1") so each tenant's
//! credentials stay scoped to its own handle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle to a configured channel (outbound delivery).
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Registry key, `channel:tenant`.
    fn id(&self) -> &str;
    /// Send a text message to a channel-native recipient. Default returns error.
    async fn send_message(&self, _recipient: &str, _text: &str) -> Result<(), String> {
        Err("send not implemented".to_string())
    }
}

/// Registry of channel ids to handles. Shared across the gateway.
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn ChannelHandle>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: String, handle: Arc<dyn ChannelHandle>) {
        self.inner.write().await.insert(id, handle);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn ChannelHandle>> {
        let g = self.inner.read().await;
        g.get(id).cloned()
    }

    pub async fn ids(&self) -> Vec<String> {
        let g = self.inner.read().await;
        g.keys().cloned().collect()
    }
}
