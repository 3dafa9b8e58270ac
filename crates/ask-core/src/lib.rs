pub mod bootstrap;
pub mod error;
pub mod mega;
pub mod messaging;
pub mod reconnect;
pub mod settings;
pub mod store;
pub mod token;

pub use bootstrap::{BootstrapOutcome, SessionBootstrapper};
pub use error::{BootstrapError, FetchError, StoreError};
pub use mega::{MegaClient, RemoteObject, RemoteStore};
pub use store::CredentialStore;
pub use token::SessionToken;
