//! HTTP/WebSocket gateway.
//!
//! Routes:
//!   GET  /                          health probe
//!   GET  /ws                        live session event stream
//!   GET  /channels/whatsapp/webhook verification handshake
//!   POST /channels/whatsapp/webhook message deliveries
//!
//! The webhook path owns session writes for its channel; the widget path
//! never touches these handlers.

use crate::channels::{
    first_text_message, ChannelError, ChannelHandle, ChannelRegistry, InboundMessage,
    WebhookPayload, WhatsAppChannel,
};
use crate::config::{resolve_assistant_url, Config};
use crate::identity::push_session_id;
use crate::leads::LanguageDetector;
use crate::reply::{self, HttpReplyBackend, ReplyBackend, ReplyRequest};
use crate::session::{Channel, MemorySessionStore, SessionEvent, SessionMessage, SessionStore};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Messages of history sent to the reply backend per webhook turn.
const HISTORY_WINDOW: usize = 6;

/// Shared state behind every route.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub registry: Arc<ChannelRegistry>,
    pub backend: Arc<dyn ReplyBackend>,
}

/// Build gateway state: register a channel handle per tenant with valid
/// WhatsApp credentials.
pub async fn build_state(
    config: Arc<Config>,
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn ReplyBackend>,
) -> GatewayState {
    let registry = Arc::new(ChannelRegistry::new());
    for (tenant_id, tenant) in &config.tenants {
        let Some(whatsapp) = tenant.whatsapp.clone() else {
            continue;
        };
        if let Err(e) = whatsapp.validate() {
            log::warn!("tenant {}: whatsapp channel not registered: {}", tenant_id, e);
            continue;
        }
        let handle = Arc::new(WhatsAppChannel::new(tenant_id, whatsapp));
        registry.register(handle.id().to_string(), handle.clone()).await;
        log::info!("registered channel {}", handle.id());
    }

    GatewayState {
        config,
        store,
        registry,
        backend,
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/ws", get(ws_handler))
        .route(
            "/channels/whatsapp/webhook",
            get(whatsapp_verify).post(whatsapp_deliver),
        )
        .with_state(state)
}

/// Run the gateway until ctrl-c or SIGTERM.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let backend: Arc<dyn ReplyBackend> =
        Arc::new(HttpReplyBackend::new(resolve_assistant_url(&config)));
    let state = build_state(Arc::new(config), store, backend).await;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    log::info!("gateway listening on {}:{}", bind, port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("installing ctrl-c handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("installing SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health_http(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// One subscription per session: the client says which session it mirrors
/// and only that session's events cross the socket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(session_id) = params.get("sessionId").cloned() else {
        return (StatusCode::BAD_REQUEST, "missing sessionId").into_response();
    };
    let rx = state.store.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, session_id))
        .into_response()
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<SessionEvent>,
    session_id: String,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let Some(frame) = event_frame(&event, &session_id) else {
                            continue;
                        };
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("ws subscriber lagged, dropped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

/// Serialize a store event for the subscribed session; events for other
/// sessions yield `None` and never reach the socket.
fn event_frame(event: &SessionEvent, session_id: &str) -> Option<String> {
    match event {
        SessionEvent::MessageAppended { session_id: sid, message } if sid == session_id => {
            Some(
                serde_json::json!({
                    "type": "messageAppended",
                    "sessionId": sid,
                    "message": message,
                })
                .to_string(),
            )
        }
        SessionEvent::PauseChanged { session_id: sid, paused } if sid == session_id => Some(
            serde_json::json!({
                "type": "pauseChanged",
                "sessionId": sid,
                "paused": paused,
            })
            .to_string(),
        ),
        _ => None,
    }
}

/// WhatsApp verification handshake: echo the challenge when the mode is
/// `subscribe` and the token matches the tenant's secret.
async fn whatsapp_verify(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let Some(tenant_id) = params.get("tenantId") else {
        return (StatusCode::BAD_REQUEST, "missing tenantId".to_string());
    };
    let Some(tenant) = state.config.tenants.get(tenant_id) else {
        return (StatusCode::BAD_REQUEST, "unknown tenant".to_string());
    };
    let Some(whatsapp) = tenant.whatsapp.as_ref() else {
        return (StatusCode::BAD_REQUEST, "whatsapp not configured".to_string());
    };
    let mode = params.get("hub.mode").map(String::as_str).unwrap_or("");
    let token = params.get("hub.verify_token").map(String::as_str).unwrap_or("");
    let Some(challenge) = params.get("hub.challenge") else {
        return (StatusCode::BAD_REQUEST, "missing hub.challenge".to_string());
    };
    if mode != "subscribe" {
        return (StatusCode::BAD_REQUEST, "unsupported hub.mode".to_string());
    }
    match whatsapp.verify(token) {
        Ok(()) => (StatusCode::OK, challenge.clone()),
        Err(ChannelError::Verification) => {
            log::warn!("tenant {}: webhook verification token mismatch", tenant_id);
            (StatusCode::FORBIDDEN, "verification failed".to_string())
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// WhatsApp message delivery. Status-only and non-text payloads are
/// acknowledged without touching any session. The inbound message is
/// persisted before generation, so a failed reply still leaves the user's
/// message in the transcript.
async fn whatsapp_deliver(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> StatusCode {
    let Some(tenant_id) = params.get("tenantId") else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(tenant) = state.config.tenants.get(tenant_id) else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(whatsapp) = tenant.whatsapp.as_ref() else {
        log::warn!("tenant {}: delivery rejected, whatsapp not configured", tenant_id);
        return StatusCode::BAD_REQUEST;
    };
    if let Err(e) = whatsapp.validate() {
        log::warn!("tenant {}: delivery rejected: {}", tenant_id, e);
        return StatusCode::BAD_REQUEST;
    }
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("tenant {}: unparseable webhook payload: {}", tenant_id, e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let Some((from, text)) = first_text_message(&payload) else {
        return StatusCode::OK;
    };

    let inbound = InboundMessage {
        channel_id: format!("whatsapp:{}", tenant_id),
        tenant_id: tenant_id.clone(),
        user_identifier: from,
        text,
    };
    process_inbound(&state, inbound, tenant.locale.as_deref()).await
}

/// Inbound pipeline: converge on the deterministic session, persist the user
/// message, honor the pause gate, generate, then hand the reply back to the
/// originating channel.
async fn process_inbound(
    state: &GatewayState,
    inbound: InboundMessage,
    locale: Option<&str>,
) -> StatusCode {
    // deterministic id: duplicate deliveries converge on one session
    let session_id = push_session_id(&inbound.tenant_id, &inbound.user_identifier);
    state
        .store
        .create_if_absent(
            &session_id,
            &inbound.tenant_id,
            Channel::Whatsapp,
            &inbound.user_identifier,
        )
        .await;
    if let Err(e) = state
        .store
        .append_message(&session_id, SessionMessage::user(&inbound.text))
        .await
    {
        log::error!("session {}: appending inbound message failed: {}", session_id, e);
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if state.store.is_paused(&session_id).await {
        log::info!("session {} paused, inbound stored without reply", session_id);
        return StatusCode::OK;
    }

    let history = match state.store.recent_history(&session_id, HISTORY_WINDOW).await {
        Ok(h) => h,
        Err(e) => {
            log::error!("session {}: reading history failed: {}", session_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    let language = LanguageDetector::new()
        .detect(&inbound.text, locale)
        .code()
        .to_string();
    let request = ReplyRequest {
        history,
        tenant_id: inbound.tenant_id.clone(),
        session_id: session_id.clone(),
        page_context: None,
        language,
        concise: true,
        stream: true,
    };
    let full = match reply::generate(
        state.backend.as_ref(),
        state.store.as_ref(),
        &request,
        &mut |_: &str| {},
    )
    .await
    {
        Ok(full) => full,
        Err(e) => {
            log::error!("session {}: generation failed: {}", session_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match state.registry.get(&inbound.channel_id).await {
        Some(handle) => {
            if let Err(e) = handle.send_message(&inbound.user_identifier, &full).await {
                log::error!("channel {}: outbound send failed: {}", inbound.channel_id, e);
            }
        }
        None => log::warn!(
            "channel {} not registered, reply not delivered",
            inbound.channel_id
        ),
    }
    StatusCode::OK
}
