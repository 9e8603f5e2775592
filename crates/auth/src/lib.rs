//! Google OAuth for gembridge: the PKCE login ceremony with its loopback
//! redirect listener, on-disk credential storage, token refresh, and the
//! [`gembridge_types::AuthClient`] implementation consumed by the
//! streaming client.

pub mod flow;
pub mod google;
pub mod store;

pub use flow::{CALLBACK_PORT, login};
pub use google::{GoogleAuth, OAuthClientCredentials};
pub use store::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
