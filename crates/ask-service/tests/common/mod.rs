use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use ask_core::messaging::{LifecycleEvent, MessagingClient, OutboundImage};
use ask_core::settings::BotSettings;
use ask_core::{BootstrapOutcome, CredentialStore};
use ask_service::context::AppContext;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// Scripted messaging client: each `connect` pops the next session script;
/// `None` makes that connect attempt fail.
#[derive(Default)]
pub struct ScriptedClient {
    sessions: Mutex<VecDeque<Option<Vec<LifecycleEvent>>>>,
    current: Mutex<VecDeque<LifecycleEvent>>,
    pub connects: Mutex<Vec<Option<Value>>>,
    pub images: Mutex<Vec<OutboundImage>>,
    pub texts: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    pub fn new(sessions: Vec<Option<Vec<LifecycleEvent>>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            ..Self::default()
        })
    }
}

#[async_trait::async_trait]
impl MessagingClient for ScriptedClient {
    async fn connect(&self, creds: Option<Value>) -> Result<()> {
        self.connects.lock().push(creds);
        match self.sessions.lock().pop_front() {
            Some(Some(events)) => {
                *self.current.lock() = events.into();
                Ok(())
            }
            Some(None) => Err(anyhow!("gateway refused")),
            None => Err(anyhow!("script exhausted")),
        }
    }

    async fn next_event(&self) -> Option<LifecycleEvent> {
        self.current.lock().pop_front()
    }

    async fn send_image(&self, message: &OutboundImage) -> Result<()> {
        self.images.lock().push(message.clone());
        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        self.texts.lock().push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn context(
    client: Arc<ScriptedClient>,
    store: CredentialStore,
    settings: BotSettings,
) -> (Arc<AppContext>, mpsc::Receiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::channel(8);
    let ctx = AppContext::new(settings, store, client, tx, BootstrapOutcome::Downloaded);
    (ctx, rx)
}
