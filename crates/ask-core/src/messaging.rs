//! Seam between the service and whatever speaks the WhatsApp protocol.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    LoggedOut,
    BadSession,
    RestartRequired,
    Other(u16),
}

impl DisconnectReason {
    pub fn from_status(code: u16) -> Self {
        match code {
            428 => Self::ConnectionClosed,
            408 => Self::ConnectionLost,
            440 => Self::ConnectionReplaced,
            401 => Self::LoggedOut,
            500 => Self::BadSession,
            515 => Self::RestartRequired,
            other => Self::Other(other),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    Connecting,
    Open { user_id: String },
    Close { reason: DisconnectReason },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connection(ConnectionUpdate),
    CredsUpdate(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundImage {
    pub to: String,
    pub image_url: String,
    pub caption: String,
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Open (or reopen) the socket using whatever credentials are on disk.
    async fn connect(&self, creds: Option<Value>) -> Result<()>;

    /// Next lifecycle event; `None` once the event source is gone.
    async fn next_event(&self) -> Option<LifecycleEvent>;

    async fn send_image(&self, message: &OutboundImage) -> Result<()>;

    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}
