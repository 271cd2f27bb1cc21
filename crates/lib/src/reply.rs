//! Streaming reply consumer for the text-generation boundary.
//!
//! One request per user turn. The response body is an unframed text stream
//! consumed incrementally; a hard 30 s timeout aborts the request. On abort
//! or transport error the partial text already shown is left as-is and
//! nothing is appended; on success the full text is appended exactly once.
//! No retry anywhere.

use crate::engagement::PageContext;
use crate::session::{HistoryEntry, SessionMessage, SessionStore};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use std::time::Duration;

/// Hard cap on one generation request.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Request shape for the text-generation boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub history: Vec<HistoryEntry>,
    pub tenant_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_context: Option<PageContext>,
    pub language: String,
    pub concise: bool,
    pub stream: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation transport error: {0}")]
    Transport(String),
}

/// Opaque text-generation capability.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    /// Stream one reply, invoking `on_chunk` for each text delta; returns the
    /// accumulated full text.
    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, ReplyError>;
}

/// HTTP implementation: POSTs the request and reads the body as one growing
/// string (no structured framing).
pub struct HttpReplyBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReplyBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReplyBackend for HttpReplyBackend {
    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, ReplyError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ReplyError::Transport(format!("{} {}", status, body)));
        }
        let mut stream = res.bytes_stream();
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ReplyError::Transport(e.to_string()))?;
            let text = String::from_utf8_lossy(&chunk);
            if !text.is_empty() {
                on_chunk(&text);
                content.push_str(&text);
            }
        }
        Ok(content)
    }
}

/// Run one generation under the hard timeout and, on success, append the
/// full assistant text to the store exactly once. On timeout or transport
/// error nothing is appended; the caller keeps whatever partial text its
/// `on_chunk` already saw.
pub async fn generate(
    backend: &dyn ReplyBackend,
    store: &dyn SessionStore,
    request: &ReplyRequest,
    on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
) -> Result<String, ReplyError> {
    let result = tokio::time::timeout(GENERATION_TIMEOUT, backend.stream_reply(request, on_chunk))
        .await
        .map_err(|_| ReplyError::Timeout(GENERATION_TIMEOUT))??;
    if let Err(e) = store
        .append_message(&request.session_id, SessionMessage::assistant(&result))
        .await
    {
        return Err(ReplyError::Transport(format!(
            "appending assistant message: {}",
            e
        )));
    }
    Ok(result)
}
