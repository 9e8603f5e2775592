//! Interactive Google login ceremony.
//!
//! gembridge holds exactly one Google credential, so the whole ceremony
//! lives here: mint PKCE S256 material, print the authorization URL, catch
//! the browser redirect on a one-shot loopback listener, exchange the code
//! for tokens, and persist the credential for the proxy to pick up.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use gembridge_types::{BridgeError, traits::Result};
use rand::RngCore as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::google::{self, OAuthClientCredentials};
use crate::store::CredentialStore;

/// Loopback port Google redirects the browser back to.
pub const CALLBACK_PORT: u16 = 8087;

/// How long to wait for the user to finish the browser flow.
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(120);

const REDIRECT_DONE_PAGE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>gembridge is signed in.</h1>\
    <p>You can close this tab and return to the terminal.</p></body></html>";

fn redirect_uri() -> String {
    format!("http://localhost:{CALLBACK_PORT}/callback")
}

/// PKCE verifier/challenge pair plus the `state` nonce for one login
/// attempt.
struct Pkce {
    verifier: String,
    challenge: String,
    state: String,
}

impl Pkce {
    /// Fresh S256 material: a 32-byte verifier seed and a 16-byte state
    /// nonce, both base64url without padding.
    fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let verifier = URL_SAFE_NO_PAD.encode(seed);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            verifier,
            challenge,
            state: URL_SAFE_NO_PAD.encode(nonce),
        }
    }
}

/// What Google sends back through the browser redirect.
#[derive(Debug, Default, Deserialize)]
struct AuthorizationReply {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// One-shot loopback listener for the authorization redirect.
struct RedirectListener {
    listener: TcpListener,
}

impl RedirectListener {
    /// Bind the loopback port before the browser opens, so the redirect
    /// cannot race the listener.
    async fn bind() -> Result<Self> {
        let addr = format!("127.0.0.1:{CALLBACK_PORT}");
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                BridgeError::Auth(format!(
                    "port {CALLBACK_PORT} is busy; is another `gembridge login` still running?"
                ))
            } else {
                BridgeError::Auth(format!("cannot listen on {addr}: {e}"))
            }
        })?;
        Ok(Self { listener })
    }

    /// Accept a single redirect, answer the browser with the done page,
    /// and return the parsed authorization reply. Gives up after
    /// [`REDIRECT_TIMEOUT`].
    async fn recv(self) -> Result<AuthorizationReply> {
        let accept = async {
            let (mut conn, _) = self
                .listener
                .accept()
                .await
                .map_err(|e| BridgeError::Auth(format!("redirect accept failed: {e}")))?;

            let mut buf = vec![0u8; 4096];
            let n = conn
                .read(&mut buf)
                .await
                .map_err(|e| BridgeError::Auth(format!("redirect read failed: {e}")))?;
            let reply = parse_redirect(&String::from_utf8_lossy(&buf[..n]))?;

            conn.write_all(REDIRECT_DONE_PAGE)
                .await
                .map_err(|e| BridgeError::Auth(format!("redirect reply failed: {e}")))?;
            let _ = conn.shutdown().await;

            Ok::<AuthorizationReply, BridgeError>(reply)
        };

        tokio::time::timeout(REDIRECT_TIMEOUT, accept)
            .await
            .map_err(|_| {
                BridgeError::Auth(
                    "browser sign-in timed out; run `gembridge login` again".into(),
                )
            })?
    }
}

/// Pull `code` / `state` / `error` out of the redirect's request line
/// (`GET /callback?code=...&state=... HTTP/1.1`).
fn parse_redirect(request: &str) -> Result<AuthorizationReply> {
    let target = request
        .lines()
        .next()
        .unwrap_or("")
        .split_ascii_whitespace()
        .nth(1)
        .unwrap_or("/");
    let query = target.split_once('?').map_or("", |(_, q)| q);
    serde_urlencoded::from_str(query)
        .map_err(|e| BridgeError::Auth(format!("malformed redirect from browser: {e}")))
}

/// Run the full login flow and persist the resulting credential.
///
/// # Errors
///
/// Returns an error if the loopback port cannot be bound, the user denies
/// the request, the state nonce does not match, or the token exchange
/// fails.
pub async fn login(
    http: &rquest::Client,
    credentials: &OAuthClientCredentials,
    store: &Arc<dyn CredentialStore>,
) -> Result<()> {
    let pkce = Pkce::generate();
    let redirect = redirect_uri();

    let listener = RedirectListener::bind().await?;

    let url = google::build_auth_url(
        &credentials.client_id,
        &redirect,
        &pkce.challenge,
        &pkce.state,
    );
    eprintln!("Open this URL in your browser to sign in:\n\n  {url}\n");

    let reply = listener.recv().await?;

    if let Some(error) = reply.error {
        return Err(BridgeError::Auth(format!(
            "Google denied the authorization: {error}"
        )));
    }
    if reply.state.as_deref() != Some(pkce.state.as_str()) {
        return Err(BridgeError::Auth(
            "redirect state mismatch; aborting sign-in".into(),
        ));
    }
    let code = reply
        .code
        .ok_or_else(|| BridgeError::Auth("redirect carried no authorization code".into()))?;

    let form = google::token_form_params(credentials, &code, &redirect, &pkce.verifier);
    let resp = http
        .post(google::TOKEN_URL)
        .header("accept", "application/json")
        .form(&form)
        .send()
        .await?;

    let status = resp.status();
    let json: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| BridgeError::Auth(format!("failed to parse token response: {e}")))?;
    if !status.is_success() {
        let description = json
            .get("error_description")
            .or_else(|| json.get("error"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error");
        return Err(BridgeError::Auth(format!(
            "token exchange failed ({status}): {description}"
        )));
    }

    let token = google::parse_token_response(&json)?;
    store.save(&token).await?;
    tracing::info!("login complete, credential saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_base64url(s: &str) -> bool {
        !s.is_empty()
            && !s.contains('=')
            && s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_pkce_material_is_base64url() {
        let pkce = Pkce::generate();
        assert!(is_base64url(&pkce.verifier));
        assert!(is_base64url(&pkce.challenge));
        assert!(is_base64url(&pkce.state));
    }

    #[test]
    fn test_challenge_differs_from_verifier() {
        let pkce = Pkce::generate();
        assert_ne!(pkce.verifier, pkce.challenge);
    }

    #[test]
    fn test_two_attempts_share_nothing() {
        let a = Pkce::generate();
        let b = Pkce::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn test_challenge_is_s256_of_verifier() {
        let pkce = Pkce::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
    }

    #[test]
    fn test_parse_redirect_success() {
        let req = "GET /callback?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let reply = parse_redirect(req).unwrap();
        assert_eq!(reply.code.as_deref(), Some("abc123"));
        assert_eq!(reply.state.as_deref(), Some("xyz"));
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_parse_redirect_denied() {
        let req = "GET /callback?error=access_denied&state=xyz HTTP/1.1\r\n\r\n";
        let reply = parse_redirect(req).unwrap();
        assert!(reply.code.is_none());
        assert_eq!(reply.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn test_parse_redirect_no_query() {
        let reply = parse_redirect("GET /callback HTTP/1.1\r\n\r\n").unwrap();
        assert!(reply.code.is_none());
        assert!(reply.state.is_none());
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_parse_redirect_url_encoded() {
        let req = "GET /callback?code=a%2Fb&state=st HTTP/1.1\r\n\r\n";
        let reply = parse_redirect(req).unwrap();
        assert_eq!(reply.code.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_redirect_uri_uses_callback_port() {
        let uri = redirect_uri();
        assert_eq!(uri, format!("http://localhost:{CALLBACK_PORT}/callback"));
    }
}
