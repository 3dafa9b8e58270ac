use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::BootstrapError;
use crate::mega::{RemoteObject, RemoteStore, MEGA_HOST};
use crate::store::CredentialStore;
use crate::token::SessionToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// `creds.json` was already on disk; nothing fetched.
    ExistingSession,
    Downloaded,
    /// No usable credentials; the gateway will ask for a QR login.
    Unauthenticated,
}

impl BootstrapOutcome {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }
}

pub struct SessionBootstrapper {
    store: CredentialStore,
    remote: Arc<dyn RemoteStore>,
    session_id: Option<String>,
    storage_host: String,
}

impl SessionBootstrapper {
    pub fn new(
        store: CredentialStore,
        remote: Arc<dyn RemoteStore>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            store,
            remote,
            session_id,
            storage_host: MEGA_HOST.to_string(),
        }
    }

    pub fn with_storage_host(mut self, host: impl Into<String>) -> Self {
        self.storage_host = host.into();
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Resolve the configured session id into the remote object it names.
    pub fn remote_object(&self) -> Result<RemoteObject, BootstrapError> {
        let token = SessionToken::parse(self.session_id.as_deref())?;
        Ok(RemoteObject::from_token(&token, &self.storage_host))
    }

    /// Fetch the credential blob. Token problems fail before any network
    /// traffic.
    pub async fn acquire_credentials(&self) -> Result<Vec<u8>, BootstrapError> {
        let object = self.remote_object()?;
        info!(file_id = %object.file_id, "downloading session");
        let bytes = self.remote.download(&object).await?;
        Ok(bytes)
    }

    /// Fetch and write `creds.json`.
    pub async fn fetch_and_persist(&self) -> Result<usize, BootstrapError> {
        let bytes = self.acquire_credentials().await?;
        let path = self.store.write_creds(&bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "session loaded");
        Ok(bytes.len())
    }

    /// Decide how the messaging client should start. Never fails: every
    /// error is logged and folded into `Unauthenticated`.
    pub async fn initialize(&self) -> BootstrapOutcome {
        if self.store.exists() {
            info!(
                path = %self.store.creds_path().display(),
                "session file found, proceeding without QR code"
            );
            return BootstrapOutcome::ExistingSession;
        }
        match self.fetch_and_persist().await {
            Ok(_) => {
                info!("session downloaded, starting bot");
                BootstrapOutcome::Downloaded
            }
            Err(err) => {
                match &err {
                    BootstrapError::Configuration => {
                        warn!(error = %err, "please add your session to SESSION_ID")
                    }
                    BootstrapError::Format => {
                        warn!(error = %err, "SESSION_ID must contain both file id and decryption key")
                    }
                    BootstrapError::RemoteFetch(_) => {
                        error!(error = %err, "failed to download session data")
                    }
                    BootstrapError::Filesystem(_) => {
                        error!(error = %err, "failed to persist session data")
                    }
                }
                info!("no session found or downloaded, QR code will be printed for authentication");
                BootstrapOutcome::Unauthenticated
            }
        }
    }
}
