//! HTTP gateway client.
//!
//! The gateway owns the WhatsApp socket. Outbound calls go over its REST
//! API; lifecycle events come back through our `/handler` webhook and are
//! queued here until the supervisor asks for them.

use anyhow::{anyhow, Result};
use ask_core::messaging::{
    ConnectionUpdate, DisconnectReason, LifecycleEvent, MessagingClient, OutboundImage,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::config::GatewayConfig;

const EVENT_QUEUE: usize = 64;

pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
    events: Mutex<mpsc::Receiver<LifecycleEvent>>,
}

impl GatewayClient {
    /// Returns the client and the sender the webhook feeds.
    pub fn new(config: GatewayConfig) -> Result<(Self, mpsc::Sender<LifecycleEvent>)> {
        let http = reqwest::Client::builder()
            .user_agent("ask-service/0.1")
            .build()
            .map_err(|e| anyhow!("gateway client: {e}"))?;
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        Ok((
            Self {
                http,
                config,
                events: Mutex::new(rx),
            },
            tx,
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.config.base_url, path, self.config.instance)
    }

    async fn post(&self, path: &str, body: Value) -> Result<()> {
        let res = self
            .http
            .post(self.url(path))
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        if res.status().is_success() {
            return Ok(());
        }
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        let excerpt: String = text.chars().take(200).collect();
        Err(anyhow!("gateway {path} failed with status {status}: {excerpt}"))
    }
}

#[async_trait::async_trait]
impl MessagingClient for GatewayClient {
    async fn connect(&self, creds: Option<Value>) -> Result<()> {
        let needs_qr = creds.is_none();
        info!(
            instance = %self.config.instance,
            with_creds = !needs_qr,
            "connecting gateway instance"
        );
        self.post(
            "instance/connect",
            json!({ "creds": creds, "printQRInTerminal": needs_qr }),
        )
        .await
    }

    async fn next_event(&self) -> Option<LifecycleEvent> {
        self.events.lock().await.recv().await
    }

    async fn send_image(&self, message: &OutboundImage) -> Result<()> {
        self.post(
            "message/sendMedia",
            json!({
                "number": message.to,
                "mediatype": "image",
                "media": message.image_url,
                "caption": message.caption,
            }),
        )
        .await
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        debug!(to, "sending text");
        self.post("message/sendText", json!({ "number": to, "text": text }))
            .await
    }
}

// ── Webhook payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Lifecycle(LifecycleEvent),
    Messages(Value),
    Ignored(String),
}

/// Classify a `{ "event": ..., "data": ... }` webhook body.
pub fn parse_webhook(payload: &Value) -> WebhookEvent {
    let event = payload["event"].as_str().unwrap_or_default();
    let data = &payload["data"];
    match event.to_ascii_lowercase().replace('_', ".").as_str() {
        "connection.update" => match parse_connection_update(data) {
            Some(update) => WebhookEvent::Lifecycle(LifecycleEvent::Connection(update)),
            None => WebhookEvent::Ignored(event.to_string()),
        },
        "creds.update" => WebhookEvent::Lifecycle(LifecycleEvent::CredsUpdate(data.clone())),
        "messages.upsert" => WebhookEvent::Messages(data.clone()),
        _ => WebhookEvent::Ignored(event.to_string()),
    }
}

fn parse_connection_update(data: &Value) -> Option<ConnectionUpdate> {
    let state = data["connection"]
        .as_str()
        .or_else(|| data["state"].as_str())?;
    match state {
        "open" | "connected" => {
            let user_id = data["user"]["id"]
                .as_str()
                .or_else(|| data["wuid"].as_str())
                .unwrap_or_default()
                .to_string();
            Some(ConnectionUpdate::Open { user_id })
        }
        "connecting" => Some(ConnectionUpdate::Connecting),
        "close" | "closed" => {
            let code = data["lastDisconnect"]["error"]["output"]["statusCode"]
                .as_u64()
                .or_else(|| data["statusCode"].as_u64())
                .and_then(|c| u16::try_from(c).ok());
            let reason = code
                .map(DisconnectReason::from_status)
                .unwrap_or(DisconnectReason::ConnectionClosed);
            Some(ConnectionUpdate::Close { reason })
        }
        _ => None,
    }
}
