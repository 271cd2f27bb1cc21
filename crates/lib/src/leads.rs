//! Lead capture: ask for contact details after a quiet period, then extract
//! email/phone from the visitor's reply.
//!
//! Widget-path only. Arms once at least two user messages exist and nothing
//! is being generated; a 30 s inactivity window, reset on every message-list
//! change, decides when to ask. Exactly one contact request and at most one
//! lead submission per session.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Inactivity window before the contact request is sent.
pub const INACTIVITY_DWELL: Duration = Duration::from_secs(30);

/// Source tag attached to leads captured from conversation text.
pub const IN_CHAT_SOURCE: &str = "In-Chat Conversation";

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";
// country code grouped with its separator so a bare local number does not
// pull the preceding whitespace into the match
const PHONE_PATTERN: &str =
    r"\+?(?:[0-9]{1,4}[-\s\.]?)?\(?[0-9]{3}\)?[-\s\.]?[0-9]{3}[-\s\.]?[0-9]{4,6}";
const TURKISH_DIACRITICS: &str = "[çğıöşüÇĞİÖŞÜ]";

/// Languages with a contact-request template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Tr,
    En,
    De,
    Es,
    Fr,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Tr => "tr",
            Language::En => "en",
            Language::De => "de",
            Language::Es => "es",
            Language::Fr => "fr",
        }
    }
}

/// Fixed contact-request template per language.
pub fn contact_request_message(lang: Language) -> &'static str {
    match lang {
        Language::Tr => "Müşteri temsilcilerimizin sizinle iletişime geçebilmesi için Ad, Soyad, Firma ve İletişim bilgilerinizi paylaşabilir misiniz?",
        Language::En => "Could you please share your Name, Surname, Company, and Contact Information so our customer representatives can contact you?",
        Language::De => "Könnten Sie bitte Ihren Namen, Nachnamen, Ihre Firma und Ihre Kontaktinformationen mitteilen, damit unsere Kundenbetreuer Sie kontaktieren können?",
        Language::Es => "¿Podría compartir su Nombre, Apellido, Empresa e Información de contacto para que nuestros representantes de atención al cliente puedan contactarlo?",
        Language::Fr => "Pourriez-vous partager votre Nom, Prénom, Entreprise et Coordonnées afin que nos représentants du service client puissent vous contacter ?",
    }
}

/// True when `text` is one of the contact-request templates, any language.
/// Used to recognize an already-sent request in a persisted transcript.
pub fn is_contact_request(text: &str) -> bool {
    [
        Language::Tr,
        Language::En,
        Language::De,
        Language::Es,
        Language::Fr,
    ]
    .iter()
    .any(|&lang| text == contact_request_message(lang))
}

/// Detects the template language from message text: Turkish diacritics win,
/// then the client locale, then English.
pub struct LanguageDetector {
    turkish: Option<Regex>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector {
    pub fn new() -> Self {
        Self {
            turkish: Regex::new(TURKISH_DIACRITICS).ok(),
        }
    }

    pub fn detect(&self, text: &str, client_locale: Option<&str>) -> Language {
        if self
            .turkish
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
        {
            return Language::Tr;
        }
        let locale = client_locale
            .and_then(|l| l.split('-').next())
            .unwrap_or("");
        match locale {
            "tr" => Language::Tr,
            "de" => Language::De,
            "es" => Language::Es,
            "fr" => Language::Fr,
            _ => Language::En,
        }
    }
}

/// Fields pulled out of a free-form contact reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Pattern-matching extractor for email, phone, and a display-name fallback.
pub struct ContactExtractor {
    email: Option<Regex>,
    phone: Option<Regex>,
}

impl Default for ContactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactExtractor {
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).ok(),
            phone: Regex::new(PHONE_PATTERN).ok(),
        }
    }

    /// Extract email and phone; a short reply (under 50 chars) doubles as the
    /// display name once contact substrings are stripped out.
    pub fn extract(&self, text: &str) -> ContactDetails {
        let email = self
            .email
            .as_ref()
            .and_then(|re| re.find(text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let phone = self
            .phone
            .as_ref()
            .and_then(|re| re.find(text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let name = if text.chars().count() < 50 {
            let mut rest = text.to_string();
            if !email.is_empty() {
                rest = rest.replace(&email, "");
            }
            if !phone.is_empty() {
                rest = rest.replace(&phone, "");
            }
            rest.trim_matches(|c: char| c.is_whitespace() || ",.;:-".contains(c))
                .to_string()
        } else {
            "In-Chat User".to_string()
        };
        ContactDetails { name, email, phone }
    }
}

/// A captured lead, submitted once to the ingestion boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
}

impl Lead {
    pub fn from_details(tenant_id: &str, details: ContactDetails) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            name: details.name,
            email: details.email,
            phone: details.phone,
            source: IN_CHAT_SOURCE.to_string(),
        }
    }

    /// A lead with no contact field at all is rejected before submission.
    pub fn has_contact_field(&self) -> bool {
        !(self.name.is_empty() && self.email.is_empty() && self.phone.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("lead has no contact fields")]
    Empty,
    #[error("lead submission failed: {0}")]
    Submit(String),
}

/// Lead-ingestion boundary.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(&self, lead: &Lead) -> Result<(), LeadError>;
}

/// POSTs leads to the configured ingestion endpoint.
pub struct HttpLeadSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpLeadSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LeadSink for HttpLeadSink {
    async fn submit(&self, lead: &Lead) -> Result<(), LeadError> {
        if !lead.has_contact_field() {
            return Err(LeadError::Empty);
        }
        let res = self
            .client
            .post(&self.endpoint)
            .json(lead)
            .send()
            .await
            .map_err(|e| LeadError::Submit(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LeadError::Submit(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

/// Sink used when no lead endpoint is configured: captured leads only reach
/// the log.
pub struct LogLeadSink;

#[async_trait]
impl LeadSink for LogLeadSink {
    async fn submit(&self, lead: &Lead) -> Result<(), LeadError> {
        if !lead.has_contact_field() {
            return Err(LeadError::Empty);
        }
        log::info!(
            "lead captured (no endpoint configured): tenant={} email={} phone={}",
            lead.tenant_id,
            lead.email,
            lead.phone
        );
        Ok(())
    }
}

/// Capture phase. `Requested` means the contact question was asked;
/// `Captured` means the follow-up reply was consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadPhase {
    Idle,
    Armed { deadline: Instant },
    Requested,
    Captured,
}

/// Preconditions snapshot for the capture machine.
#[derive(Debug, Clone, Copy)]
pub struct LeadInputs<'a> {
    pub enabled: bool,
    pub user_message_count: usize,
    pub generation_in_flight: bool,
    pub last_user_message: Option<&'a str>,
    pub client_locale: Option<&'a str>,
}

impl LeadInputs<'_> {
    fn hold(&self) -> bool {
        self.enabled && self.user_message_count >= 2 && !self.generation_in_flight
    }
}

/// Per-session lead capture state machine.
pub struct LeadCapture {
    phase: LeadPhase,
    detector: LanguageDetector,
}

impl Default for LeadCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl LeadCapture {
    pub fn new() -> Self {
        Self {
            phase: LeadPhase::Idle,
            detector: LanguageDetector::new(),
        }
    }

    pub fn phase(&self) -> LeadPhase {
        self.phase
    }

    pub fn request_sent(&self) -> bool {
        matches!(self.phase, LeadPhase::Requested | LeadPhase::Captured)
    }

    /// Called on every dependency change. While the preconditions hold this
    /// re-arms the inactivity window, so the request only fires after 30 s
    /// with no new session activity.
    pub fn reevaluate(&mut self, now: Instant, inputs: &LeadInputs) -> Option<Instant> {
        match self.phase {
            LeadPhase::Requested | LeadPhase::Captured => None,
            LeadPhase::Idle | LeadPhase::Armed { .. } => {
                if inputs.hold() {
                    let deadline = now + INACTIVITY_DWELL;
                    self.phase = LeadPhase::Armed { deadline };
                    Some(deadline)
                } else {
                    self.phase = LeadPhase::Idle;
                    None
                }
            }
        }
    }

    /// When the inactivity window has elapsed, pick the template for the last
    /// user message's language and move to `Requested`. At most once per
    /// session.
    pub fn fire_if_due(&mut self, now: Instant, inputs: &LeadInputs) -> Option<&'static str> {
        let LeadPhase::Armed { deadline } = self.phase else {
            return None;
        };
        if now < deadline {
            return None;
        }
        if !inputs.hold() {
            self.phase = LeadPhase::Idle;
            return None;
        }
        let lang = self
            .detector
            .detect(inputs.last_user_message.unwrap_or(""), inputs.client_locale);
        self.phase = LeadPhase::Requested;
        Some(contact_request_message(lang))
    }

    /// The very next user message after the contact request: extract fields
    /// and move to `Captured`. Returns `None` for any later message.
    pub fn take_reply(
        &mut self,
        text: &str,
        extractor: &ContactExtractor,
    ) -> Option<ContactDetails> {
        if self.phase != LeadPhase::Requested {
            return None;
        }
        self.phase = LeadPhase::Captured;
        Some(extractor.extract(text))
    }

    /// Restore phase from a persisted transcript, so a restarted controller
    /// on the same durable session never asks twice. `request_seen` means the
    /// history contains a contact-request message; `reply_seen` means a user
    /// message follows it. Never demotes live state.
    pub fn rehydrate(&mut self, request_seen: bool, reply_seen: bool) {
        if matches!(self.phase, LeadPhase::Requested | LeadPhase::Captured) {
            return;
        }
        if reply_seen {
            self.phase = LeadPhase::Captured;
        } else if request_seen {
            self.phase = LeadPhase::Requested;
        }
    }

    /// Back to idle for a brand-new session (clear chat).
    pub fn reset(&mut self) {
        self.phase = LeadPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(user_count: usize, last: Option<&'a str>) -> LeadInputs<'a> {
        LeadInputs {
            enabled: true,
            user_message_count: user_count,
            generation_in_flight: false,
            last_user_message: last,
            client_locale: None,
        }
    }

    #[test]
    fn extracts_email_and_international_phone() {
        let extractor = ContactExtractor::new();
        let details = extractor.extract("jane@ex.com, +1 555 123 4567");
        assert_eq!(details.email, "jane@ex.com");
        assert_eq!(details.phone, "+1 555 123 4567");
    }

    #[test]
    fn extracts_parenthesized_phone() {
        let extractor = ContactExtractor::new();
        let details = extractor.extract("call me at (212) 555-1234");
        assert_eq!(details.phone, "(212) 555-1234");
    }

    #[test]
    fn local_phone_match_has_no_leading_space() {
        let extractor = ContactExtractor::new();
        let details = extractor.extract("reach me on 555 123 4567 today");
        assert_eq!(details.phone, "555 123 4567");
    }

    #[test]
    fn short_reply_becomes_display_name() {
        let extractor = ContactExtractor::new();
        let details = extractor.extract("Jane Doe, jane@ex.com");
        assert_eq!(details.name, "Jane Doe");
        assert_eq!(details.email, "jane@ex.com");
    }

    #[test]
    fn long_reply_gets_placeholder_name() {
        let extractor = ContactExtractor::new();
        let long = "a".repeat(60) + " jane@ex.com";
        let details = extractor.extract(&long);
        assert_eq!(details.name, "In-Chat User");
        assert_eq!(details.email, "jane@ex.com");
    }

    #[test]
    fn turkish_diacritics_select_turkish_template() {
        let detector = LanguageDetector::new();
        assert_eq!(detector.detect("ürün fiyatı nedir", None), Language::Tr);
        assert_eq!(detector.detect("hello there", Some("de-DE")), Language::De);
        assert_eq!(detector.detect("hello there", Some("pt-BR")), Language::En);
        assert_eq!(detector.detect("hello there", None), Language::En);
    }

    #[test]
    fn arming_requires_two_user_messages() {
        let mut capture = LeadCapture::new();
        let now = Instant::now();
        assert!(capture.reevaluate(now, &inputs(1, Some("hi"))).is_none());
        assert!(capture.reevaluate(now, &inputs(2, Some("hi"))).is_some());
    }

    #[test]
    fn activity_resets_the_inactivity_window() {
        let mut capture = LeadCapture::new();
        let start = Instant::now();
        let first = capture
            .reevaluate(start, &inputs(2, Some("hi")))
            .expect("armed");
        // a new message 20s in pushes the deadline out
        let later = start + Duration::from_secs(20);
        let second = capture
            .reevaluate(later, &inputs(3, Some("more")))
            .expect("re-armed");
        assert!(second > first);
        // the original deadline passing must not fire
        assert!(capture.fire_if_due(first, &inputs(3, Some("more"))).is_none());
        assert!(capture.fire_if_due(second, &inputs(3, Some("more"))).is_some());
    }

    #[test]
    fn fires_at_most_once() {
        let mut capture = LeadCapture::new();
        let now = Instant::now();
        capture.reevaluate(now, &inputs(2, Some("merhaba, ürün var mı")));
        let msg = capture
            .fire_if_due(now + INACTIVITY_DWELL, &inputs(2, Some("merhaba, ürün var mı")))
            .expect("fires");
        assert_eq!(msg, contact_request_message(Language::Tr));
        assert!(capture
            .fire_if_due(now + INACTIVITY_DWELL * 2, &inputs(2, Some("x")))
            .is_none());
        assert!(capture.reevaluate(now, &inputs(5, Some("x"))).is_none());
    }

    #[test]
    fn generation_in_flight_blocks_arming() {
        let mut capture = LeadCapture::new();
        let now = Instant::now();
        let busy = LeadInputs {
            generation_in_flight: true,
            ..inputs(2, Some("hi"))
        };
        assert!(capture.reevaluate(now, &busy).is_none());
        assert_eq!(capture.phase(), LeadPhase::Idle);
    }

    #[test]
    fn only_the_next_reply_is_parsed() {
        let mut capture = LeadCapture::new();
        let extractor = ContactExtractor::new();
        let now = Instant::now();
        capture.reevaluate(now, &inputs(2, Some("hi")));
        capture.fire_if_due(now + INACTIVITY_DWELL, &inputs(2, Some("hi")));
        let details = capture
            .take_reply("jane@ex.com", &extractor)
            .expect("first reply parsed");
        assert_eq!(details.email, "jane@ex.com");
        assert!(capture.take_reply("second@ex.com", &extractor).is_none());
        assert_eq!(capture.phase(), LeadPhase::Captured);
    }

    #[test]
    fn recognizes_all_contact_request_templates() {
        for lang in [
            Language::Tr,
            Language::En,
            Language::De,
            Language::Es,
            Language::Fr,
        ] {
            assert!(is_contact_request(contact_request_message(lang)));
        }
        assert!(!is_contact_request("could you share your name?"));
    }

    #[test]
    fn rehydrate_restores_request_and_capture_state() {
        // request in the history, no reply yet: the next message is still parsed
        let mut capture = LeadCapture::new();
        capture.rehydrate(true, false);
        assert_eq!(capture.phase(), LeadPhase::Requested);
        let details = capture
            .take_reply("jane@ex.com", &ContactExtractor::new())
            .expect("reply parsed after restart");
        assert_eq!(details.email, "jane@ex.com");

        // request and reply both in the history: capture is done, never re-arms
        let mut capture = LeadCapture::new();
        capture.rehydrate(true, true);
        assert_eq!(capture.phase(), LeadPhase::Captured);
        assert!(capture
            .reevaluate(Instant::now(), &inputs(5, Some("x")))
            .is_none());

        // a live Requested phase is never demoted
        let mut capture = LeadCapture::new();
        let now = Instant::now();
        capture.reevaluate(now, &inputs(2, Some("hi")));
        capture.fire_if_due(now + INACTIVITY_DWELL, &inputs(2, Some("hi")));
        capture.rehydrate(true, true);
        assert_eq!(capture.phase(), LeadPhase::Requested);
    }

    #[test]
    fn empty_lead_is_rejected() {
        let lead = Lead::from_details("t1", ContactDetails::default());
        assert!(!lead.has_contact_field());
    }
}
