//! WhatsApp Cloud API channel: webhook payload types, verification, and
//! outbound sendMessage with tenant-scoped credentials.

use crate::channels::registry::ChannelHandle;
use crate::channels::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// Resolve the Cloud API base URL (override via env for tests).
pub fn graph_api_base() -> String {
    std::env::var("WHATSAPP_API_BASE").unwrap_or_else(|_| GRAPH_API_BASE.to_string())
}

/// Tenant WhatsApp credentials. All three fields are required before the
/// channel counts as configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    pub phone_number_id: Option<String>,
    pub access_token: Option<String>,
    pub verify_token: Option<String>,
}

impl WhatsAppConfig {
    pub fn validate(&self) -> Result<(), ChannelError> {
        for (field, value) in [
            ("phoneNumberId", &self.phone_number_id),
            ("accessToken", &self.access_token),
            ("verifyToken", &self.verify_token),
        ] {
            if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ChannelError::ConfigMissing(field.to_string()));
            }
        }
        Ok(())
    }

    /// Verification handshake check: the caller-supplied token must equal the
    /// configured secret.
    pub fn verify(&self, token: &str) -> Result<(), ChannelError> {
        let expected = self
            .verify_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::ConfigMissing("verifyToken".to_string()))?;
        if token == expected {
            Ok(())
        } else {
            Err(ChannelError::Verification)
        }
    }
}

/// Webhook delivery payload (Cloud API shape: entry → changes → value).
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WhatsAppInboundMessage>,
    /// Delivery-status callbacks; accepted and ignored.
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WhatsAppInboundMessage {
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// First inbound text message in a delivery, if any. Status-only payloads and
/// non-text message types (images, reactions, ...) yield `None` and are
/// acknowledged without touching any session.
pub fn first_text_message(payload: &WebhookPayload) -> Option<(String, String)> {
    for entry in &payload.entry {
        for change in &entry.changes {
            for msg in &change.value.messages {
                if msg.kind != "text" {
                    continue;
                }
                if let Some(ref text) = msg.text {
                    return Some((msg.from.clone(), text.body.clone()));
                }
            }
        }
    }
    None
}

/// Per-tenant WhatsApp channel handle: sends replies via the Cloud API.
pub struct WhatsAppChannel {
    id: String,
    config: WhatsAppConfig,
    base_url: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(tenant_id: &str, config: WhatsAppConfig) -> Self {
        Self {
            id: format!("whatsapp:{}", tenant_id),
            config,
            base_url: graph_api_base(),
            client: reqwest::Client::new(),
        }
    }

    /// Send a text message to a phone number via the Cloud API.
    pub async fn send_message(&self, recipient: &str, text: &str) -> Result<(), String> {
        let phone_number_id = self
            .config
            .phone_number_id
            .as_deref()
            .ok_or("whatsapp phoneNumberId not configured")?;
        let access_token = self
            .config
            .access_token
            .as_deref()
            .ok_or("whatsapp accessToken not configured")?;
        let url = format!("{}/{}/messages", self.base_url, phone_number_id);
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": recipient,
            "type": "text",
            "text": { "body": text }
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), String> {
        WhatsAppChannel::send_message(self, recipient, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> WhatsAppConfig {
        WhatsAppConfig {
            phone_number_id: Some("10001".to_string()),
            access_token: Some("token".to_string()),
            verify_token: Some("secret".to_string()),
        }
    }

    #[test]
    fn validate_requires_all_fields() {
        assert!(full_config().validate().is_ok());
        let mut c = full_config();
        c.access_token = Some("  ".to_string());
        assert!(matches!(
            c.validate(),
            Err(ChannelError::ConfigMissing(f)) if f == "accessToken"
        ));
        let mut c = full_config();
        c.verify_token = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn verify_matches_exact_token_only() {
        let c = full_config();
        assert!(c.verify("secret").is_ok());
        assert!(matches!(c.verify("wrong"), Err(ChannelError::Verification)));
    }

    #[test]
    fn extracts_first_text_message() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            { "from": "15551234567", "type": "text", "text": { "body": "hello" } }
                        ]
                    }
                }]
            }]
        }))
        .expect("parse");
        let (from, body) = first_text_message(&payload).expect("text message");
        assert_eq!(from, "15551234567");
        assert_eq!(body, "hello");
    }

    #[test]
    fn status_only_payload_yields_none() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "statuses": [{ "id": "wamid.x", "status": "delivered" }]
                    }
                }]
            }]
        }))
        .expect("parse");
        assert!(first_text_message(&payload).is_none());
    }

    #[test]
    fn non_text_message_yields_none() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            { "from": "15551234567", "type": "image" }
                        ]
                    }
                }]
            }]
        }))
        .expect("parse");
        assert!(first_text_message(&payload).is_none());
    }
}
