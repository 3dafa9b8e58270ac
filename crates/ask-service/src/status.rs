use ask_core::settings::BotMode;
use ask_core::BootstrapOutcome;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Mutable runtime facts shared by the supervisor and the HTTP surface.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub session: BootstrapOutcome,
    pub connected: bool,
    pub user_id: Option<String>,
    pub last_open: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub messages_handled: u64,
}

impl ServiceStatus {
    pub fn new(session: BootstrapOutcome) -> Self {
        Self {
            session,
            connected: false,
            user_id: None,
            last_open: None,
            reconnect_attempts: 0,
            messages_handled: 0,
        }
    }

    pub fn mark_open(&mut self, user_id: &str) {
        self.connected = true;
        self.user_id = Some(user_id.to_string());
        self.last_open = Some(Utc::now());
        self.reconnect_attempts = 0;
    }

    pub fn mark_closed(&mut self) {
        self.connected = false;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub connected: bool,
    pub session: BootstrapOutcome,
    pub mode: BotMode,
    pub prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_open: Option<String>,
    pub reconnect_attempts: u32,
    pub messages_handled: u64,
}

impl StatusSnapshot {
    pub fn capture(status: &ServiceStatus, mode: BotMode, prefix: &str) -> Self {
        Self {
            connected: status.connected,
            session: status.session,
            mode,
            prefix: prefix.to_string(),
            user_id: status.user_id.clone(),
            last_open: status
                .last_open
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            reconnect_attempts: status.reconnect_attempts,
            messages_handled: status.messages_handled,
        }
    }
}
