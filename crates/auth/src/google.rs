//! Google OAuth endpoints and the [`AuthClient`] implementation backed by
//! the credential store.

use async_trait::async_trait;
use gembridge_types::{AuthClient, BridgeError, OAuthToken, TokenState, traits::Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::store::CredentialStore;

/// Google OAuth 2.0 authorization endpoint.
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth 2.0 token endpoint.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth scopes required by the Code Assist API.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Prevent refresh stampedes after a failed renewal.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Credentials for the registered OAuth client.
#[derive(Debug, Clone)]
pub struct OAuthClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// [`AuthClient`] backed by a [`CredentialStore`], with token refresh and
/// an explicit invalidation hook for 401 recovery.
pub struct GoogleAuth {
    http: rquest::Client,
    store: std::sync::Arc<dyn CredentialStore>,
    credentials: Option<OAuthClientCredentials>,
    project: Option<String>,
    force_refresh: AtomicBool,
    last_refresh_attempt: Mutex<Option<Instant>>,
}

impl GoogleAuth {
    pub fn new(
        http: rquest::Client,
        store: std::sync::Arc<dyn CredentialStore>,
        credentials: Option<OAuthClientCredentials>,
        project: Option<String>,
    ) -> Self {
        Self {
            http,
            store,
            credentials,
            project,
            force_refresh: AtomicBool::new(false),
            last_refresh_attempt: Mutex::new(None),
        }
    }

    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
        {
            let last = self.last_refresh_attempt.lock().expect("refresh lock");
            if let Some(at) = *last
                && at.elapsed() < REFRESH_COOLDOWN
            {
                return Err(BridgeError::Auth("token refresh cooldown active".into()));
            }
        }
        *self.last_refresh_attempt.lock().expect("refresh lock") = Some(Instant::now());

        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| BridgeError::Auth("stored credential has no refresh token".into()))?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            BridgeError::Auth("no OAuth client configured; set oauth.client_id".into())
        })?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("client_id", credentials.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = &credentials.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .http
            .post(TOKEN_URL)
            .header("accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BridgeError::Auth(format!("failed to parse refresh response: {e}")))?;

        if !status.is_success() {
            let description = json
                .get("error_description")
                .or_else(|| json.get("error"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            return Err(BridgeError::Auth(format!(
                "refresh failed ({status}): {description}"
            )));
        }

        // Google does not return a new refresh_token on renewal; keep the
        // old one.
        let mut new_token = parse_token_response(&json)?;
        if new_token.refresh_token.is_none() {
            new_token.refresh_token = token.refresh_token.clone();
        }

        self.store.save(&new_token).await?;
        tracing::info!("access token refreshed");
        Ok(new_token)
    }
}

#[async_trait]
impl AuthClient for GoogleAuth {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .store
            .load()
            .await?
            .ok_or_else(|| BridgeError::Auth("not logged in; run `gembridge login`".into()))?;

        let forced = self.force_refresh.swap(false, Ordering::SeqCst);
        match token.state() {
            TokenState::Valid if !forced => Ok(token.access_token),
            TokenState::Valid | TokenState::Expired => {
                if token.refresh_token.is_some() {
                    Ok(self.refresh(&token).await?.access_token)
                } else if forced {
                    // Nothing to refresh with; hand back the stored token
                    // and let the upstream reject it definitively.
                    Ok(token.access_token)
                } else {
                    Err(BridgeError::Auth(
                        "stored credential expired; run `gembridge login`".into(),
                    ))
                }
            }
            TokenState::Invalid => Err(BridgeError::Auth(
                "stored credential expired; run `gembridge login`".into(),
            )),
        }
    }

    fn invalidate_token(&self) {
        self.force_refresh.store(true, Ordering::SeqCst);
    }

    fn project_hint(&self) -> Option<String> {
        self.project
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT_ID").ok())
            .filter(|p| !p.is_empty())
    }
}

/// Build the authorization URL with PKCE S256 parameters.
#[must_use]
pub fn build_auth_url(client_id: &str, redirect_uri: &str, code_challenge: &str, state: &str) -> String {
    let scope = SCOPES.join(" ");
    let query = serde_urlencoded::to_string([
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", scope.as_str()),
        ("state", state),
        ("code_challenge", code_challenge),
        ("code_challenge_method", "S256"),
        ("access_type", "offline"),
        ("prompt", "consent"),
    ])
    .unwrap_or_default();
    format!("{AUTH_URL}?{query}")
}

/// Build the form parameters for the authorization-code exchange.
#[must_use]
pub fn token_form_params<'a>(
    credentials: &'a OAuthClientCredentials,
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("client_id", credentials.client_id.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", code_verifier),
    ];
    if let Some(secret) = &credentials.client_secret {
        params.push(("client_secret", secret.as_str()));
    }
    params
}

/// Parse a token endpoint JSON response into an [`OAuthToken`].
///
/// # Errors
///
/// Returns an error if the response is missing the `access_token` field.
pub fn parse_token_response(json: &serde_json::Value) -> Result<OAuthToken> {
    let access_token = json
        .get("access_token")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| BridgeError::Auth("missing access_token".into()))?
        .to_string();

    let mut token = OAuthToken::new(access_token);
    if let Some(r) = json
        .get("refresh_token")
        .and_then(serde_json::Value::as_str)
    {
        token = token.with_refresh(r);
    }
    if let Some(exp) = json.get("expires_in").and_then(serde_json::Value::as_u64) {
        token = token.with_expiry(exp);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;
    use serde_json::json;
    use std::sync::Arc;

    fn make_auth(store: Arc<InMemoryCredentialStore>) -> GoogleAuth {
        GoogleAuth::new(rquest::Client::new(), store, None, Some("proj-1".into()))
    }

    #[tokio::test]
    async fn test_access_token_not_logged_in() {
        let auth = make_auth(Arc::new(InMemoryCredentialStore::new()));
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, BridgeError::Auth(_)));
    }

    #[tokio::test]
    async fn test_access_token_valid() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .save(&OAuthToken::new("tok").with_expiry(3600))
            .await
            .unwrap();
        let auth = make_auth(store);
        assert_eq!(auth.access_token().await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_invalidate_without_refresh_token_returns_stored() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store.save(&OAuthToken::new("tok")).await.unwrap();
        let auth = make_auth(store);
        auth.invalidate_token();
        // No refresh token: the stored token is handed back once.
        assert_eq!(auth.access_token().await.unwrap(), "tok");
    }

    #[test]
    fn test_project_hint_explicit() {
        let auth = make_auth(Arc::new(InMemoryCredentialStore::new()));
        assert_eq!(auth.project_hint().as_deref(), Some("proj-1"));
    }

    #[test]
    fn test_auth_url_contains_required_params() {
        let url = build_auth_url(
            "id.apps.googleusercontent.com",
            "http://localhost:8087/callback",
            "challenge123",
            "state456",
        );
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("id.apps.googleusercontent.com"));
        assert!(url.contains("challenge123"));
        assert!(url.contains("state456"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("cloud-platform"));
    }

    #[test]
    fn test_token_form_params() {
        let credentials = OAuthClientCredentials {
            client_id: "cid".into(),
            client_secret: Some("secret".into()),
        };
        let params = token_form_params(&credentials, "code1", "http://localhost:8087/callback", "ver");
        let map: std::collections::HashMap<&str, &str> = params.into_iter().collect();
        assert_eq!(map["grant_type"], "authorization_code");
        assert_eq!(map["client_id"], "cid");
        assert_eq!(map["client_secret"], "secret");
        assert_eq!(map["code"], "code1");
        assert_eq!(map["code_verifier"], "ver");
    }

    #[test]
    fn test_parse_token_response() {
        let resp = json!({"access_token": "a", "refresh_token": "r", "expires_in": 3600});
        let token = parse_token_response(&resp).unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
        assert!(token.expires_at.is_some());

        assert!(parse_token_response(&json!({"error": "denied"})).is_err());
    }
}
