//! Messaging channels (e.g. WhatsApp).
//!
//! Channel trait and registry so the gateway can look up per-tenant channel
//! handles and deliver outbound replies. Inbound traffic arrives through the
//! gateway's webhook endpoints and is normalized to `InboundMessage`.

mod inbound;
mod registry;
mod whatsapp;

pub use inbound::InboundMessage;
pub use registry::{ChannelHandle, ChannelRegistry};
pub use whatsapp::{first_text_message, WebhookPayload, WhatsAppChannel, WhatsAppConfig};

/// Channel-boundary failures. These are the only errors that surface as HTTP
/// status codes; everything else reduces to a log line.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel configuration missing: {0}")]
    ConfigMissing(String),
    #[error("webhook verification failed")]
    Verification,
}
