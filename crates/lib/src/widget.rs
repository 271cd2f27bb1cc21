//! Widget session controller.
//!
//! Client-resident, single-threaded driver for one widget session: identity
//! persistence, transcript mirroring, one in-flight generation at a time, and
//! both proactive engines. Every dependency change (message list, page
//! context, settings, loading flag) funnels through one `reevaluate` step
//! that cancels and re-arms the pending deadlines, so re-entrant updates
//! cannot double-fire a timer.

use crate::config::TenantConfig;
use crate::engagement::{EngagementConfig, EngagementEngine, EngagementInputs, EngagementPhase, PageContext};
use crate::identity::WidgetIdentity;
use crate::industry::{GreetingLang, Industry};
use crate::leads::{
    is_contact_request, ContactExtractor, LanguageDetector, Lead, LeadCapture, LeadInputs,
    LeadPhase, LeadSink,
};
use crate::reply::{self, ReplyBackend, ReplyRequest};
use crate::session::{Channel, SessionEvent, SessionId, SessionMessage, SessionStore};
use std::sync::Arc;
use std::time::Instant;

/// Tenant settings the widget needs.
#[derive(Debug, Clone, Default)]
pub struct WidgetSettings {
    pub industry: Industry,
    pub engagement: EngagementConfig,
    pub collect_leads: bool,
    pub locale: Option<String>,
}

impl WidgetSettings {
    pub fn from_tenant(tenant: &TenantConfig) -> Self {
        Self {
            industry: tenant.industry,
            engagement: tenant.engagement.clone(),
            collect_leads: tenant.collect_leads,
            locale: tenant.locale.clone(),
        }
    }
}

fn greeting_lang(locale: Option<&str>) -> GreetingLang {
    match locale.and_then(|l| l.split('-').next()) {
        Some("tr") => GreetingLang::Tr,
        _ => GreetingLang::En,
    }
}

/// One widget session: owns the timers and the transcript mirror.
pub struct WidgetController {
    tenant_id: String,
    session_id: SessionId,
    identity: WidgetIdentity,
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn ReplyBackend>,
    lead_sink: Arc<dyn LeadSink>,
    settings: WidgetSettings,
    detector: LanguageDetector,
    extractor: ContactExtractor,
    engagement: EngagementEngine,
    leads: LeadCapture,
    context: Option<PageContext>,
    messages: Vec<SessionMessage>,
    loading: bool,
    settings_ready: bool,
}

impl WidgetController {
    pub async fn new(
        tenant_id: impl Into<String>,
        identity: WidgetIdentity,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn ReplyBackend>,
        lead_sink: Arc<dyn LeadSink>,
        settings: WidgetSettings,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let session_id = identity.current();
        store
            .create_if_absent(&session_id, &tenant_id, Channel::Web, "widget-visitor")
            .await;
        let messages = match store.get(&session_id).await {
            Ok(session) => session.messages,
            Err(_) => Vec::new(),
        };
        let mut controller = Self {
            tenant_id,
            session_id,
            identity,
            store,
            backend,
            lead_sink,
            settings,
            detector: LanguageDetector::new(),
            extractor: ContactExtractor::new(),
            engagement: EngagementEngine::new(),
            leads: LeadCapture::new(),
            context: None,
            messages,
            loading: false,
            settings_ready: false,
        };
        controller.rehydrate_leads();
        controller
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transcript(&self) -> &[SessionMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Settings have finished loading; the engagement engine may now arm.
    pub fn mark_settings_ready(&mut self, now: Instant) -> Option<Instant> {
        self.settings_ready = true;
        self.reevaluate(now)
    }

    /// The hosting page navigated or updated its metadata.
    pub fn set_page_context(&mut self, context: Option<PageContext>, now: Instant) -> Option<Instant> {
        self.context = context;
        self.reevaluate(now)
    }

    /// Re-check both proactive engines against current state. Returns the
    /// earliest pending deadline so the host can schedule a wakeup.
    pub fn reevaluate(&mut self, now: Instant) -> Option<Instant> {
        let engagement_deadline = {
            let inputs = EngagementInputs {
                message_count: self.messages.len(),
                context: self.context.as_ref(),
                settings_ready: self.settings_ready,
            };
            self.engagement.reevaluate(now, &inputs)
        };
        let lead_deadline = {
            let last_user = self
                .messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .map(|m| m.content.as_str());
            let inputs = LeadInputs {
                enabled: self.settings.collect_leads,
                user_message_count: self.user_message_count(),
                generation_in_flight: self.loading,
                last_user_message: last_user,
                client_locale: self.settings.locale.as_deref(),
            };
            self.leads.reevaluate(now, &inputs)
        };
        earliest(engagement_deadline, lead_deadline)
    }

    /// The earliest pending deadline without re-arming anything.
    pub fn next_deadline(&self) -> Option<Instant> {
        let engagement = match self.engagement.phase() {
            EngagementPhase::Armed { deadline } => Some(deadline),
            _ => None,
        };
        let lead = match self.leads.phase() {
            LeadPhase::Armed { deadline } => Some(deadline),
            _ => None,
        };
        earliest(engagement, lead)
    }

    /// Drive due timers: inject the proactive greeting or the contact-request
    /// message when its dwell has elapsed. Returns the next pending deadline.
    pub async fn tick(&mut self, now: Instant) -> Option<Instant> {
        let lang = greeting_lang(self.settings.locale.as_deref());
        let greeting = {
            let inputs = EngagementInputs {
                message_count: self.messages.len(),
                context: self.context.as_ref(),
                settings_ready: self.settings_ready,
            };
            self.engagement
                .fire_if_due(now, &inputs, &self.settings.engagement, self.settings.industry, lang)
        };
        if let Some(text) = greeting {
            self.append_assistant(&text).await;
            self.reevaluate(now);
        }

        let request = {
            let last_user = self
                .messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .map(|m| m.content.as_str());
            let inputs = LeadInputs {
                enabled: self.settings.collect_leads,
                user_message_count: self.user_message_count(),
                generation_in_flight: self.loading,
                last_user_message: last_user,
                client_locale: self.settings.locale.as_deref(),
            };
            self.leads.fire_if_due(now, &inputs)
        };
        if let Some(text) = request {
            self.append_assistant(text).await;
        }
        self.next_deadline()
    }

    /// One user turn: persist the message, honor the paused flag, then run a
    /// single generation. Failures degrade to a log line; the user message
    /// stays visible either way.
    pub async fn send(&mut self, text: &str, on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send)) {
        if self.loading {
            log::debug!("widget: generation already in flight, dropping send");
            return;
        }
        if let Err(e) = self
            .store
            .append_message(&self.session_id, SessionMessage::user(text))
            .await
        {
            log::warn!("widget: appending user message failed: {}", e);
            return;
        }
        self.refresh_mirror().await;

        // the very next user reply after a contact request carries the lead
        if let Some(details) = self.leads.take_reply(text, &self.extractor) {
            let lead = Lead::from_details(&self.tenant_id, details);
            if lead.has_contact_field() {
                if let Err(e) = self.lead_sink.submit(&lead).await {
                    log::warn!("widget: lead submission failed: {}", e);
                }
            } else {
                log::debug!("widget: contact reply had no extractable fields, lead skipped");
            }
        }
        self.reevaluate(Instant::now());

        if self.store.is_paused(&self.session_id).await {
            log::info!("widget: session {} paused, skipping generation", self.session_id);
            return;
        }

        self.loading = true;
        self.reevaluate(Instant::now());
        let language = self
            .detector
            .detect(text, self.settings.locale.as_deref())
            .code()
            .to_string();
        let request = ReplyRequest {
            history: self
                .messages
                .iter()
                .map(|m| crate::session::HistoryEntry {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            tenant_id: self.tenant_id.clone(),
            session_id: self.session_id.clone(),
            page_context: self.context.clone(),
            language,
            concise: true,
            stream: true,
        };
        match reply::generate(self.backend.as_ref(), self.store.as_ref(), &request, on_chunk).await
        {
            Ok(_) => self.refresh_mirror().await,
            Err(e) => log::warn!("widget: generation failed: {}", e),
        }
        self.loading = false;
        self.reevaluate(Instant::now());
    }

    /// "Clear chat": rotate to a fresh session id and reset both engines.
    /// The old record is abandoned, not deleted.
    pub async fn clear(&mut self, now: Instant) -> Option<Instant> {
        self.session_id = self.identity.rotate();
        self.store
            .create_if_absent(&self.session_id, &self.tenant_id, Channel::Web, "widget-visitor")
            .await;
        self.messages.clear();
        self.engagement.reset();
        self.leads.reset();
        self.loading = false;
        self.reevaluate(now)
    }

    /// Merge a store change event from another widget instance (popout test
    /// windows, other tabs). Merge is by message id, so duplicate delivery is
    /// harmless.
    pub async fn apply_event(&mut self, event: &SessionEvent, now: Instant) -> Option<Instant> {
        match event {
            SessionEvent::MessageAppended { session_id, message } if *session_id == self.session_id => {
                if !self.messages.iter().any(|m| m.id == message.id) {
                    self.messages.push(message.clone());
                }
                self.rehydrate_leads();
                self.reevaluate(now)
            }
            _ => self.next_deadline(),
        }
    }

    async fn append_assistant(&mut self, text: &str) {
        if let Err(e) = self
            .store
            .append_message(&self.session_id, SessionMessage::assistant(text))
            .await
        {
            log::warn!("widget: appending assistant message failed: {}", e);
            return;
        }
        self.refresh_mirror().await;
    }

    async fn refresh_mirror(&mut self) {
        if let Ok(session) = self.store.get(&self.session_id).await {
            self.messages = session.messages;
        }
        self.rehydrate_leads();
    }

    /// The session outlives the controller, so the capture phase must be
    /// recoverable from the transcript: a contact request already present
    /// means at least `Requested`, a user reply after it means `Captured`.
    fn rehydrate_leads(&mut self) {
        let mut request_seen = false;
        let mut reply_seen = false;
        for message in &self.messages {
            if !request_seen {
                if message.role == "assistant" && is_contact_request(&message.content) {
                    request_seen = true;
                }
            } else if message.role == "user" {
                reply_seen = true;
                break;
            }
        }
        self.leads.rehydrate(request_seen, reply_seen);
    }

    fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == "user").count()
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
