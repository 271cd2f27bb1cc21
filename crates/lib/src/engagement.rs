//! Proactive engagement: decide when the assistant speaks first.
//!
//! A per-session one-shot state machine: idle → armed (12 s dwell) → fired.
//! Arming requires an empty session, a known page context, and loaded
//! settings; any precondition breaking before the dwell elapses cancels back
//! to idle. Once fired, the engine never fires again for the session,
//! however many times the preconditions are re-checked.

use crate::industry::{
    static_greeting, titled_product_greeting, GreetingLang, Industry, PageKind,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Time the visitor must dwell on the page before the greeting fires.
pub const ENGAGEMENT_DWELL: Duration = Duration::from_secs(12);

/// Page metadata supplied by the hosting page. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A tenant-configured canned proactive greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleMessage {
    pub text: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Tenant engagement settings, read-only input to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bubble_messages: Vec<BubbleMessage>,
}

/// Engine phase. `Fired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementPhase {
    Idle,
    Armed { deadline: Instant },
    Fired,
}

/// Preconditions snapshot, rebuilt by the controller on every change.
#[derive(Debug, Clone, Copy)]
pub struct EngagementInputs<'a> {
    pub message_count: usize,
    pub context: Option<&'a PageContext>,
    pub settings_ready: bool,
}

impl EngagementInputs<'_> {
    fn hold(&self) -> bool {
        self.message_count == 0 && self.context.is_some() && self.settings_ready
    }
}

/// One-shot proactive trigger per session.
pub struct EngagementEngine {
    phase: EngagementPhase,
}

impl Default for EngagementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngagementEngine {
    pub fn new() -> Self {
        Self {
            phase: EngagementPhase::Idle,
        }
    }

    pub fn phase(&self) -> EngagementPhase {
        self.phase
    }

    /// Re-check preconditions: arm when they hold, cancel back to idle when
    /// they break. Returns the pending deadline while armed so the caller can
    /// schedule a wakeup. No-op after the engine has fired.
    pub fn reevaluate(&mut self, now: Instant, inputs: &EngagementInputs) -> Option<Instant> {
        match self.phase {
            EngagementPhase::Fired => None,
            EngagementPhase::Idle => {
                if inputs.hold() {
                    let deadline = now + ENGAGEMENT_DWELL;
                    self.phase = EngagementPhase::Armed { deadline };
                    Some(deadline)
                } else {
                    None
                }
            }
            EngagementPhase::Armed { deadline } => {
                if inputs.hold() {
                    Some(deadline)
                } else {
                    self.phase = EngagementPhase::Idle;
                    None
                }
            }
        }
    }

    /// Fire when armed, due, and the preconditions still hold. Returns the
    /// selected greeting exactly once per session.
    pub fn fire_if_due(
        &mut self,
        now: Instant,
        inputs: &EngagementInputs,
        config: &EngagementConfig,
        industry: Industry,
        lang: GreetingLang,
    ) -> Option<String> {
        let EngagementPhase::Armed { deadline } = self.phase else {
            return None;
        };
        if now < deadline {
            return None;
        }
        if !inputs.hold() {
            self.phase = EngagementPhase::Idle;
            return None;
        }
        self.phase = EngagementPhase::Fired;
        Some(select_greeting(config, industry, inputs.context, lang))
    }

    /// Back to idle for a brand-new session (clear chat). Forgetting this
    /// would carry a fired or armed state into the new session.
    pub fn reset(&mut self) {
        self.phase = EngagementPhase::Idle;
    }
}

/// Classify a page URL into product / cart / general by path segment.
/// Turkish segments are included alongside the English ones.
pub fn classify_url(url: &str) -> PageKind {
    let path = url.to_lowercase();
    const CART: &[&str] = &[
        "/cart",
        "/sepet",
        "/basket",
        "/checkout",
        "/odeme",
        "/payment",
        "/booking",
        "/rezervasyon",
    ];
    const PRODUCT: &[&str] = &[
        "/product",
        "/urun",
        "/item",
        "/listing",
        "/room",
        "/property",
    ];
    if CART.iter().any(|seg| path.contains(seg)) {
        return PageKind::Cart;
    }
    if PRODUCT.iter().any(|seg| path.contains(seg)) {
        return PageKind::Product;
    }
    PageKind::General
}

/// Greeting-selection policy, first non-empty source wins:
/// 1. configured bubble message (first active, else first);
/// 2. title-specific product line for product pages when the industry has one;
/// 3. static per-industry greeting for the classified page context.
/// The tenant's plain welcome message is never used here.
pub fn select_greeting(
    config: &EngagementConfig,
    industry: Industry,
    context: Option<&PageContext>,
    lang: GreetingLang,
) -> String {
    if config.enabled && !config.bubble_messages.is_empty() {
        let bubble = config
            .bubble_messages
            .iter()
            .find(|b| b.is_active)
            .or_else(|| config.bubble_messages.first());
        if let Some(b) = bubble {
            if !b.text.trim().is_empty() {
                return b.text.clone();
            }
        }
    }
    let kind = context
        .map(|c| classify_url(&c.url))
        .unwrap_or(PageKind::General);
    if kind == PageKind::Product {
        if let Some(title) = context.and_then(|c| c.title.as_deref()).filter(|t| !t.is_empty()) {
            if let Some(line) = titled_product_greeting(industry, title, lang) {
                return line;
            }
        }
    }
    static_greeting(industry, kind, lang).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(url: &str, title: Option<&str>) -> PageContext {
        PageContext {
            url: url.to_string(),
            title: title.map(String::from),
            description: None,
        }
    }

    fn inputs<'a>(message_count: usize, context: Option<&'a PageContext>) -> EngagementInputs<'a> {
        EngagementInputs {
            message_count,
            context,
            settings_ready: true,
        }
    }

    #[test]
    fn arms_only_when_preconditions_hold() {
        let mut engine = EngagementEngine::new();
        let now = Instant::now();
        assert!(engine.reevaluate(now, &inputs(0, None)).is_none());
        let c = ctx("https://shop.example/", None);
        assert!(engine.reevaluate(now, &inputs(1, Some(&c))).is_none());
        let deadline = engine.reevaluate(now, &inputs(0, Some(&c))).expect("armed");
        assert_eq!(deadline, now + ENGAGEMENT_DWELL);
    }

    #[test]
    fn user_message_before_dwell_cancels() {
        let mut engine = EngagementEngine::new();
        let now = Instant::now();
        let c = ctx("https://shop.example/", None);
        engine.reevaluate(now, &inputs(0, Some(&c)));
        assert!(engine.reevaluate(now, &inputs(1, Some(&c))).is_none());
        assert_eq!(engine.phase(), EngagementPhase::Idle);
        // even if the dwell later elapses, nothing fires
        let fired = engine.fire_if_due(
            now + ENGAGEMENT_DWELL,
            &inputs(1, Some(&c)),
            &EngagementConfig::default(),
            Industry::Ecommerce,
            GreetingLang::En,
        );
        assert!(fired.is_none());
    }

    #[test]
    fn fires_at_most_once_across_many_reevaluations() {
        let mut engine = EngagementEngine::new();
        let now = Instant::now();
        let c = ctx("https://shop.example/", None);
        let config = EngagementConfig::default();
        engine.reevaluate(now, &inputs(0, Some(&c)));
        let first = engine.fire_if_due(
            now + ENGAGEMENT_DWELL,
            &inputs(0, Some(&c)),
            &config,
            Industry::Ecommerce,
            GreetingLang::En,
        );
        assert!(first.is_some());
        // context churn after firing must not re-arm
        for i in 0..10 {
            let c2 = ctx(&format!("https://shop.example/page/{}", i), None);
            assert!(engine.reevaluate(now, &inputs(0, Some(&c2))).is_none());
            assert!(engine
                .fire_if_due(
                    now + ENGAGEMENT_DWELL * 4,
                    &inputs(0, Some(&c2)),
                    &config,
                    Industry::Ecommerce,
                    GreetingLang::En,
                )
                .is_none());
        }
        assert_eq!(engine.phase(), EngagementPhase::Fired);
    }

    #[test]
    fn bubble_message_wins_over_industry_greeting() {
        // Scenario: one active bubble configured, empty session, context present
        let config = EngagementConfig {
            enabled: true,
            bubble_messages: vec![
                BubbleMessage {
                    text: "ignored inactive".to_string(),
                    is_active: false,
                },
                BubbleMessage {
                    text: "Need help? 👋".to_string(),
                    is_active: true,
                },
            ],
        };
        let c = ctx("https://shop.example/product/42", Some("Blue Sneakers"));
        let greeting = select_greeting(&config, Industry::Ecommerce, Some(&c), GreetingLang::En);
        assert_eq!(greeting, "Need help? 👋");
    }

    #[test]
    fn first_bubble_used_when_none_active() {
        let config = EngagementConfig {
            enabled: true,
            bubble_messages: vec![
                BubbleMessage {
                    text: "first".to_string(),
                    is_active: false,
                },
                BubbleMessage {
                    text: "second".to_string(),
                    is_active: false,
                },
            ],
        };
        let greeting = select_greeting(&config, Industry::Other, None, GreetingLang::En);
        assert_eq!(greeting, "first");
    }

    #[test]
    fn product_page_with_title_gets_title_specific_line() {
        // Scenario: no bubbles, ecommerce, /product/42, title "Blue Sneakers"
        let config = EngagementConfig {
            enabled: true,
            bubble_messages: Vec::new(),
        };
        let c = ctx("https://shop.example/product/42", Some("Blue Sneakers"));
        let greeting = select_greeting(&config, Industry::Ecommerce, Some(&c), GreetingLang::En);
        assert!(greeting.contains("Blue Sneakers"), "got: {}", greeting);
    }

    #[test]
    fn cart_and_general_use_static_greetings() {
        let config = EngagementConfig::default();
        let cart = ctx("https://shop.example/sepet", Some("Cart"));
        let greeting = select_greeting(&config, Industry::Ecommerce, Some(&cart), GreetingLang::Tr);
        assert_eq!(
            greeting,
            "👋 Sepetinizdeki ürünleri tamamlamanıza yardımcı olayım mı?"
        );
        let home = ctx("https://shop.example/", None);
        let greeting = select_greeting(&config, Industry::Saas, Some(&home), GreetingLang::En);
        assert_eq!(
            greeting,
            "👋 Hello! How can I help you regarding our software solutions?"
        );
    }

    #[test]
    fn classify_recognizes_turkish_segments() {
        assert_eq!(classify_url("https://x.example/urun/5"), PageKind::Product);
        assert_eq!(classify_url("https://x.example/odeme"), PageKind::Cart);
        assert_eq!(classify_url("https://x.example/rezervasyon/1"), PageKind::Cart);
        assert_eq!(classify_url("https://x.example/hakkimizda"), PageKind::General);
    }

    #[test]
    fn reset_returns_a_fired_engine_to_idle() {
        let mut engine = EngagementEngine::new();
        let now = Instant::now();
        let c = ctx("https://x.example/", None);
        engine.reevaluate(now, &inputs(0, Some(&c)));
        engine.fire_if_due(
            now + ENGAGEMENT_DWELL,
            &inputs(0, Some(&c)),
            &EngagementConfig::default(),
            Industry::Other,
            GreetingLang::En,
        );
        assert_eq!(engine.phase(), EngagementPhase::Fired);
        engine.reset();
        assert_eq!(engine.phase(), EngagementPhase::Idle);
    }
}
