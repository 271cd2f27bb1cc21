//! Inbound message from a channel, normalized for the session pipeline.

/// A text message from a channel user, ready to be routed to a session.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub tenant_id: String,
    /// Channel-native sender identity (e.g. a WhatsApp phone number).
    pub user_identifier: String,
    pub text: String,
}
