//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.parley/config.json`) and
//! environment. Tenants carry their industry tag, engagement settings, lead
//! collection toggle, and per-channel credentials.

use crate::channels::WhatsAppConfig;
use crate::engagement::EngagementConfig;
use crate::industry::Industry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Text-generation boundary.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Lead-ingestion boundary.
    #[serde(default)]
    pub leads: LeadsConfig,

    /// Tenant map keyed by tenant id.
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP and WebSocket (default 16161).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    16161
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Reply endpoint URL. Overridden by PARLEY_ASSISTANT_URL env when set.
    pub url: Option<String>,
}

/// Lead-ingestion endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadsConfig {
    /// Lead endpoint URL. Overridden by PARLEY_LEADS_URL env when set.
    pub url: Option<String>,
}

/// Per-tenant settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    #[serde(default)]
    pub industry: Industry,

    /// Shown when the chat is opened by the user; never used as a proactive
    /// greeting.
    pub welcome_message: Option<String>,

    #[serde(default)]
    pub engagement: EngagementConfig,

    #[serde(default)]
    pub collect_leads: bool,

    /// Default client locale for template selection (e.g. "de-DE").
    pub locale: Option<String>,

    pub whatsapp: Option<WhatsAppConfig>,
}

const DEFAULT_ASSISTANT_URL: &str = "http://127.0.0.1:8788/chat";

/// Resolve the reply endpoint: env PARLEY_ASSISTANT_URL overrides config.
pub fn resolve_assistant_url(config: &Config) -> String {
    non_empty_env("PARLEY_ASSISTANT_URL")
        .or_else(|| {
            config
                .assistant
                .url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_ASSISTANT_URL.to_string())
}

/// Resolve the lead endpoint: env PARLEY_LEADS_URL overrides config. When
/// unset, captured leads only reach the log.
pub fn resolve_leads_url(config: &Config) -> Option<String> {
    non_empty_env("PARLEY_LEADS_URL").or_else(|| {
        config
            .leads
            .url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".parley").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or PARLEY_CONFIG_PATH). Missing file
/// => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 16161);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn tenant_config_parses_camel_case() {
        let json = r#"{
            "industry": "real_estate",
            "welcomeMessage": "Hi!",
            "collectLeads": true,
            "engagement": {
                "enabled": true,
                "bubbleMessages": [{ "text": "Need help? 👋", "isActive": true }]
            },
            "whatsapp": {
                "phoneNumberId": "10001",
                "accessToken": "tok",
                "verifyToken": "secret"
            }
        }"#;
        let tenant: TenantConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(tenant.industry, Industry::RealEstate);
        assert!(tenant.collect_leads);
        assert!(tenant.engagement.enabled);
        assert_eq!(tenant.engagement.bubble_messages[0].text, "Need help? 👋");
        let whatsapp = tenant.whatsapp.expect("whatsapp config");
        assert!(whatsapp.validate().is_ok());
    }

    #[test]
    fn assistant_url_falls_back_to_default() {
        let config = Config::default();
        // env override is exercised end to end; here only the config path
        if std::env::var("PARLEY_ASSISTANT_URL").is_err() {
            assert_eq!(resolve_assistant_url(&config), DEFAULT_ASSISTANT_URL);
        }
        let mut config = Config::default();
        config.leads.url = Some("  ".to_string());
        if std::env::var("PARLEY_LEADS_URL").is_err() {
            assert!(resolve_leads_url(&config).is_none());
        }
    }
}
