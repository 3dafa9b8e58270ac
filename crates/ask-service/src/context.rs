use std::sync::Arc;

use ask_core::messaging::{LifecycleEvent, MessagingClient};
use ask_core::settings::BotSettings;
use ask_core::{BootstrapOutcome, CredentialStore};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::status::{ServiceStatus, StatusSnapshot};

/// Everything the supervisor and the HTTP handlers share. Built once in
/// `main` and handed around behind an `Arc`.
pub struct AppContext {
    pub settings: BotSettings,
    pub store: CredentialStore,
    pub client: Arc<dyn MessagingClient>,
    pub events: mpsc::Sender<LifecycleEvent>,
    pub status: Mutex<ServiceStatus>,
}

impl AppContext {
    pub fn new(
        settings: BotSettings,
        store: CredentialStore,
        client: Arc<dyn MessagingClient>,
        events: mpsc::Sender<LifecycleEvent>,
        session: BootstrapOutcome,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            store,
            client,
            events,
            status: Mutex::new(ServiceStatus::new(session)),
        })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let status = self.status.lock();
        StatusSnapshot::capture(&status, self.settings.mode, &self.settings.prefix)
    }
}
