//! Inbound message dispatch for `messages.upsert` webhooks.

use ask_core::settings::BotMode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::AppContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat: String,
    pub from_me: bool,
    pub text: String,
}

/// Pull text messages out of a `messages.upsert` payload. The payload is
/// either a single message, an array, or `{ "messages": [...] }`.
pub fn extract_messages(data: &Value) -> Vec<InboundMessage> {
    let items: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        other => match other["messages"].as_array() {
            Some(items) => items.iter().collect(),
            None => vec![other],
        },
    };
    items
        .into_iter()
        .filter_map(|msg| {
            let key = &msg["key"];
            let chat = key["remoteJid"].as_str()?.to_string();
            let text = msg["message"]["conversation"]
                .as_str()
                .or_else(|| msg["message"]["extendedTextMessage"]["text"].as_str())?
                .to_string();
            Some(InboundMessage {
                chat,
                from_me: key["fromMe"].as_bool().unwrap_or(false),
                text,
            })
        })
        .collect()
}

/// Public bots answer everyone, private bots only their own account.
pub fn accepts(mode: BotMode, msg: &InboundMessage) -> bool {
    match mode {
        BotMode::Public => true,
        BotMode::Private => msg.from_me,
    }
}

/// Reply text for a command message, if it is one we know.
pub fn reply_for(ctx: &AppContext, msg: &InboundMessage) -> Option<String> {
    let (command, _args) = ctx.settings.parse_command(&msg.text)?;
    match command.as_str() {
        "ping" => Some("pong".to_string()),
        "alive" => {
            let snapshot = ctx.snapshot();
            Some(format!(
                "*ASK XMD is alive*\n> mode: {}\n> prefix: {}\n> connected: {}",
                snapshot.mode, snapshot.prefix, snapshot.connected
            ))
        }
        "mode" => Some(format!("Bot mode: {}", ctx.settings.mode)),
        _ => None,
    }
}

/// Handle one webhook batch; returns how many replies were sent.
pub async fn handle_messages(ctx: &AppContext, data: &Value) -> usize {
    let mut replied = 0;
    for msg in extract_messages(data) {
        if !accepts(ctx.settings.mode, &msg) {
            debug!(chat = %msg.chat, "ignored by mode gate");
            continue;
        }
        ctx.status.lock().messages_handled += 1;
        let Some(reply) = reply_for(ctx, &msg) else {
            continue;
        };
        match ctx.client.send_text(&msg.chat, &reply).await {
            Ok(()) => replied += 1,
            Err(err) => warn!(error = %err, chat = %msg.chat, "reply failed"),
        }
    }
    replied
}
