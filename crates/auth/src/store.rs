//! Credential storage: a JSON file on disk for the single Google
//! credential, plus an in-memory store for tests.

use async_trait::async_trait;
use gembridge_types::{BridgeError, OAuthToken, traits::Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistent storage for the Google OAuth credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored token, if one exists.
    async fn load(&self) -> Result<Option<OAuthToken>>;
    /// Persist a token, replacing any existing one.
    async fn save(&self, token: &OAuthToken) -> Result<()>;
    /// Remove the stored token.
    async fn remove(&self) -> Result<()>;
}

/// File-backed store at `~/.gembridge/credentials.json` (or a custom path).
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The default credential location under the user's home directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".gembridge").join("credentials.json")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<OAuthToken>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = serde_json::from_str(&contents)?;
                Ok(Some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Auth(format!(
                "cannot read credentials at {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BridgeError::Auth(format!("cannot create credential dir: {e}")))?;
        }
        let contents = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| BridgeError::Auth(format!("cannot write credentials: {e}")))
    }

    async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Auth(format!("cannot remove credentials: {e}"))),
        }
    }
}

/// An in-memory [`CredentialStore`] for tests and ephemeral use.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<OAuthToken>> {
        Ok(self.token.lock().expect("store lock").clone())
    }

    async fn save(&self, token: &OAuthToken) -> Result<()> {
        *self.token.lock().expect("store lock") = Some(token.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.token.lock().expect("store lock") = None;
        Ok(())
    }
}
