use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    8317
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_cooldown_secs() -> u64 {
    600
}

/// OAuth client configuration for the Google login flow.
///
/// Values may also be supplied via `GEMBRIDGE_OAUTH_CLIENT_ID` /
/// `GEMBRIDGE_OAUTH_CLIENT_SECRET`, which take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl OAuthConfig {
    /// The effective client id, environment first.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        std::env::var("GEMBRIDGE_OAUTH_CLIENT_ID")
            .ok()
            .or_else(|| self.client_id.clone())
    }

    /// The effective client secret, environment first.
    #[must_use]
    pub fn client_secret(&self) -> Option<String> {
        std::env::var("GEMBRIDGE_OAUTH_CLIENT_SECRET")
            .ok()
            .or_else(|| self.client_secret.clone())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 8317).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Enable automatic model switching on rate limits (defaults to off;
    /// the static fallback table is consulted only when this is set).
    #[serde(default)]
    pub auto_switch: bool,
    /// Per-model cooldown window in seconds after a rate limit (600).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Override the Code Assist base URL (tests, sandbox endpoints).
    #[serde(default)]
    pub upstream_base_url: Option<String>,
    /// Explicit Google Cloud project id; `GOOGLE_CLOUD_PROJECT` /
    /// `GOOGLE_CLOUD_PROJECT_ID` are honored when unset.
    #[serde(default)]
    pub project: Option<String>,
    /// Path to the stored credential file
    /// (defaults to `~/.gembridge/credentials.json`).
    #[serde(default)]
    pub credentials_path: Option<std::path::PathBuf>,
    /// OAuth client configuration for `gembridge login`.
    #[serde(default)]
    pub oauth: OAuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            auto_switch: false,
            cooldown_secs: default_cooldown_secs(),
            upstream_base_url: None,
            project: None,
            credentials_path: None,
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction
    /// fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// The file format is determined by the file extension:
    /// `.json` uses JSON, everything else uses YAML.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &std::path::Path) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Json, Serialized, Yaml},
        };
        let base = Figment::from(Serialized::defaults(Config::default()));
        let figment = if path.extension().is_some_and(|e| e == "json") {
            base.merge(Json::file(path))
        } else {
            base.merge(Yaml::file(path))
        };
        figment.extract()
    }
}
