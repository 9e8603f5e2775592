//! Gemini Code Assist streaming client.
//!
//! Issues authenticated `streamGenerateContent?alt=sse` calls against the
//! Code Assist upstream, parses the incremental SSE reply, and emits the
//! normalized chunk stream consumed by the SSE re-emitters. Also owns lazy
//! project discovery (`loadCodeAssist`, then `onboardUser` polling) and the
//! upstream error policy: one 401 invalidate-and-restart per call, bounded
//! retry on 429/5xx, and typed surfacing of rate limits with a reset hint.

use async_stream::try_stream;
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt as _;
use gembridge_types::{
    AuthClient, BridgeError, ChunkDelta, ChunkStream, FinishReason, StreamChunk, TokenUsage,
    ToolCallDelta, traits::Result,
};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use uuid::Uuid;

use crate::registry::ModelFamily;
use crate::signatures::SignatureStore;
use crate::sse::SseDecoder;

/// Production Code Assist endpoint.
pub const CODE_ASSIST_BASE: &str = "https://cloudcode-pa.googleapis.com";

const API_VERSION: &str = "v1internal";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upstream retry policy: 3 attempts with a 1 s base exponential delay,
/// applied before any downstream bytes have been written.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Onboarding long-running operation: poll up to 30 times at 1 s intervals.
const ONBOARD_POLL_ATTEMPTS: u32 = 30;
const ONBOARD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Signatures below this length are ignored when forwarded on chunks.
const MIN_SIGNATURE_LEN: usize = 100;

/// Authenticated client for the Code Assist Gemini upstream.
pub struct CodeAssistClient {
    http: rquest::Client,
    auth: Arc<dyn AuthClient>,
    signatures: Arc<SignatureStore>,
    base_url: String,
    /// Stable per-process id sent as the privileged-user header.
    installation_id: String,
    /// Discovered project id, cached for the client's lifetime.
    project: tokio::sync::Mutex<Option<String>>,
}

impl CodeAssistClient {
    pub fn new(
        http: rquest::Client,
        auth: Arc<dyn AuthClient>,
        signatures: Arc<SignatureStore>,
    ) -> Self {
        Self {
            http,
            auth,
            signatures,
            base_url: CODE_ASSIST_BASE.to_string(),
            installation_id: Uuid::new_v4().to_string(),
            project: tokio::sync::Mutex::new(None),
        }
    }

    /// Override the upstream base URL (tests, sandbox endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{API_VERSION}:{method}", self.base_url)
    }

    fn user_agent(&self, model: &str) -> String {
        format!(
            "GeminiCLI/{CLIENT_VERSION}/{model} ({}; {})",
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }

    /// Open a streaming generation call and return the normalized chunk
    /// stream.
    ///
    /// `model` is the canonical Gemini id sent upstream; `family` keys the
    /// thinking-signature cache and derives from the model the client
    /// originally asked for.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RateLimited`] after exhausting 429 retries,
    /// [`BridgeError::Upstream`] for other upstream failures, and
    /// [`BridgeError::Auth`] when no usable token is available.
    pub async fn stream_generate(
        &self,
        model: &str,
        family: ModelFamily,
        request: Value,
    ) -> Result<ChunkStream> {
        let project = self.project_id().await?;

        let mut inner = request;
        inner["session_id"] = json!(Uuid::new_v4().to_string());
        let envelope = json!({
            "model": model,
            "project": project,
            "user_prompt_id": Uuid::new_v4().to_string(),
            "request": inner,
        });

        let response = self.open_stream(model, &envelope).await?;
        Ok(self.emit_chunks(response, family))
    }

    // ── Project discovery ────────────────────────────────────────────────

    /// The project id for this client: explicit hint first, then lazy
    /// discovery, cached for the process lifetime.
    pub async fn project_id(&self) -> Result<String> {
        let mut cached = self.project.lock().await;
        if let Some(project) = cached.as_ref() {
            return Ok(project.clone());
        }
        let project = match self.auth.project_hint() {
            Some(hint) => hint,
            None => self.discover_project().await?,
        };
        *cached = Some(project.clone());
        Ok(project)
    }

    async fn discover_project(&self) -> Result<String> {
        let metadata = json!({
            "ideType": "IDE_UNSPECIFIED",
            "platform": "PLATFORM_UNSPECIFIED",
            "pluginType": "GEMINI",
        });

        let load = self
            .post_json("loadCodeAssist", &json!({"metadata": metadata}))
            .await?;
        if let Some(project) = load.get("cloudaicompanionProject").and_then(Value::as_str) {
            tracing::debug!(%project, "project adopted from loadCodeAssist");
            return Ok(project.to_string());
        }

        let tier = default_tier(&load);
        tracing::info!(%tier, "onboarding Code Assist user");
        let onboard_body = json!({"tierId": tier, "metadata": metadata});

        for _ in 0..ONBOARD_POLL_ATTEMPTS {
            let operation = self.post_json("onboardUser", &onboard_body).await?;
            if operation.get("done").and_then(Value::as_bool) == Some(true) {
                return operation
                    .pointer("/response/cloudaicompanionProject/id")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| {
                        BridgeError::Auth("onboarding completed without a project id".into())
                    });
            }
            tokio::time::sleep(ONBOARD_POLL_INTERVAL).await;
        }
        Err(BridgeError::Http(
            "timed out waiting for Code Assist onboarding".into(),
        ))
    }

    async fn post_json(&self, method: &str, body: &Value) -> Result<Value> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(self.endpoint(method))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .header("user-agent", self.user_agent("discovery"))
            .header("x-gemini-api-privileged-user-id", self.installation_id.as_str())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        resp.json().await.map_err(BridgeError::from)
    }

    // ── Streaming request ────────────────────────────────────────────────

    async fn open_stream(&self, model: &str, body: &Value) -> Result<rquest::Response> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let mut auth_retried = false;
        let mut attempt: u32 = 0;

        loop {
            let token = self.auth.access_token().await?;
            let resp = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .header("user-agent", self.user_agent(model))
                .header("x-gemini-api-privileged-user-id", self.installation_id.as_str())
                .json(body)
                .send()
                .await?;

            let status = resp.status().as_u16();
            match status {
                200..=299 => return Ok(resp),
                401 if !auth_retried => {
                    // One invalidate-and-restart per logical call.
                    auth_retried = true;
                    self.auth.invalidate_token();
                    tracing::info!("upstream 401, refreshing token and restarting stream");
                }
                429 => {
                    let reset = reset_from_headers(&resp);
                    let body_text = resp.text().await.unwrap_or_default();
                    let reset = reset.or_else(|| parse_reset_hint(&body_text));
                    attempt += 1;
                    if attempt < MAX_ATTEMPTS {
                        let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                        tracing::warn!(%model, attempt, "upstream 429, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(rate_limit_error(model, reset));
                }
                500..=599 => {
                    attempt += 1;
                    if attempt < MAX_ATTEMPTS {
                        let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                        tracing::warn!(%model, status, attempt, "upstream error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let text = resp.text().await.unwrap_or_default();
                    return Err(BridgeError::Upstream { status, body: text });
                }
                400 => {
                    // The error body streams in full; parse the typed shape.
                    let text = resp.text().await.unwrap_or_default();
                    let message = parse_error_body(&text).unwrap_or(text);
                    return Err(BridgeError::Upstream {
                        status: 400,
                        body: message,
                    });
                }
                _ => {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(BridgeError::Upstream { status, body: text });
                }
            }
        }
    }

    fn emit_chunks(&self, response: rquest::Response, family: ModelFamily) -> ChunkStream {
        let signatures = Arc::clone(&self.signatures);
        Box::pin(try_stream! {
            let mut decoder = SseDecoder::new();
            let mut assembler = ChunkAssembler::new(family, signatures);
            let mut bytes = response.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(BridgeError::from)?;
                for record in decoder.feed(&chunk) {
                    for out in assembler.on_record(&record) {
                        yield out;
                    }
                }
            }
            if let Some(record) = decoder.finish() {
                for out in assembler.on_record(&record) {
                    yield out;
                }
            }
            for out in assembler.finish() {
                yield out;
            }
        })
    }
}

/// The default onboarding tier: the one marked `isDefault`, else free-tier.
fn default_tier(load_response: &Value) -> String {
    load_response
        .get("allowedTiers")
        .and_then(Value::as_array)
        .and_then(|tiers| {
            tiers
                .iter()
                .find(|t| t.get("isDefault").and_then(Value::as_bool) == Some(true))
        })
        .and_then(|t| t.get("id").and_then(Value::as_str))
        .unwrap_or("free-tier")
        .to_string()
}

fn reset_from_headers(resp: &rquest::Response) -> Option<(u64, &'static str)> {
    let value = resp.headers().get("retry-after")?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(|secs| (secs, "second"))
}

/// Scrape a quota-reset hint out of an upstream 429 body.
fn parse_reset_hint(body: &str) -> Option<(u64, &'static str)> {
    static RESET_RE: OnceLock<Regex> = OnceLock::new();
    let re = RESET_RE.get_or_init(|| {
        Regex::new(r"(?is)quota.*?reset.*?(\d+)\s*(second|minute|hour)s?").expect("valid regex")
    });
    let caps = re.captures(body)?;
    let amount = caps[1].parse::<u64>().ok()?;
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "minute" => "minute",
        "hour" => "hour",
        _ => "second",
    };
    Some((amount, unit))
}

fn rate_limit_error(model: &str, reset: Option<(u64, &'static str)>) -> BridgeError {
    match reset {
        Some((amount, unit)) => {
            let seconds = amount
                * match unit {
                    "minute" => 60,
                    "hour" => 3600,
                    _ => 1,
                };
            let next = Utc::now() + chrono::Duration::seconds(seconds as i64);
            BridgeError::RateLimited {
                status: 429,
                reset_after: Some(Duration::from_secs(seconds)),
                message: format!(
                    "RESOURCE_EXHAUSTED: Rate limited on {model}. Quota will reset after \
                     {amount} {unit}(s). Next available: {}",
                    next.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            }
        }
        None => BridgeError::RateLimited {
            status: 429,
            reset_after: None,
            message: format!("RESOURCE_EXHAUSTED: Rate limited on {model}. Try again later."),
        },
    }
}

/// Extract `{error: {message}}` from an upstream error body.
fn parse_error_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(String::from)
}

// ── Record → chunk assembly ──────────────────────────────────────────────

/// Stateful translator from upstream SSE records to normalized chunks.
///
/// Tracks the thinking-block lifecycle (at most one open at a time), mints
/// tool-call ids, records signatures in the process-wide cache, and emits
/// the terminal chunk exactly once.
pub(crate) struct ChunkAssembler {
    family: ModelFamily,
    signatures: Arc<SignatureStore>,
    role_pending: bool,
    thinking_open: bool,
    tool_count: usize,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl ChunkAssembler {
    pub(crate) fn new(family: ModelFamily, signatures: Arc<SignatureStore>) -> Self {
        Self {
            family,
            signatures,
            role_pending: true,
            thinking_open: false,
            tool_count: 0,
            usage: None,
            finished: false,
        }
    }

    /// Translate one SSE record (JSON payload) into zero or more chunks.
    pub(crate) fn on_record(&mut self, record: &str) -> Vec<StreamChunk> {
        let Ok(value) = serde_json::from_str::<Value>(record) else {
            tracing::debug!("skipping unparseable SSE record");
            return Vec::new();
        };
        // Code Assist wraps each payload in a `response` envelope.
        let payload = value.get("response").unwrap_or(&value);

        if let Some(meta) = payload.get("usageMetadata") {
            self.usage = Some(TokenUsage {
                prompt_tokens: meta
                    .get("promptTokenCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                completion_tokens: meta
                    .get("candidatesTokenCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            });
        }

        let Some(candidate) = payload.pointer("/candidates/0") else {
            return Vec::new();
        };

        let mut out = Vec::new();
        if let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) {
            for part in parts {
                self.on_part(part, &mut out);
            }
        }
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            out.extend(self.terminal(reason));
        }
        out
    }

    /// Close any open block and emit the terminal chunk if the upstream
    /// ended without an explicit finish reason.
    pub(crate) fn finish(&mut self) -> Vec<StreamChunk> {
        self.terminal("STOP")
    }

    fn on_part(&mut self, part: &Value, out: &mut Vec<StreamChunk>) {
        let signature = part
            .get("thoughtSignature")
            .and_then(Value::as_str)
            .map(String::from);

        if let Some(call) = part.get("functionCall") {
            if self.thinking_open {
                out.push(self.thinking_end_chunk());
            }
            let id = format!("call_{}", Uuid::new_v4());
            let name = call.get("name").and_then(Value::as_str).unwrap_or("");
            let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
            if let Some(sig) = &signature {
                self.signatures.record_tool(&id, sig);
            }
            let delta = ChunkDelta {
                role: self.take_role(),
                tool_calls: vec![ToolCallDelta {
                    index: self.tool_count,
                    id: Some(id),
                    name: Some(name.to_string()),
                    arguments: Some(args.to_string()),
                    thought_signature: signature,
                }],
                ..Default::default()
            };
            self.tool_count += 1;
            out.push(StreamChunk::delta(delta));
            return;
        }

        let Some(text) = part.get("text").and_then(Value::as_str) else {
            return;
        };
        let thought = part.get("thought").and_then(Value::as_bool) == Some(true);

        if thought {
            let opening = !self.thinking_open;
            self.thinking_open = true;
            if let Some(sig) = &signature {
                self.signatures.record_thinking(self.family, sig);
            }
            out.push(StreamChunk::delta(ChunkDelta {
                role: self.take_role(),
                content: Some(text.to_string()),
                thought: true,
                thinking_start: opening,
                thought_signature: signature.filter(|sig| sig.len() >= MIN_SIGNATURE_LEN),
                ..Default::default()
            }));
        } else {
            if self.thinking_open {
                out.push(self.thinking_end_chunk());
            }
            out.push(StreamChunk::delta(ChunkDelta {
                role: self.take_role(),
                content: Some(text.to_string()),
                ..Default::default()
            }));
        }
    }

    fn terminal(&mut self, reason: &str) -> Vec<StreamChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut out = Vec::new();
        if self.thinking_open {
            out.push(self.thinking_end_chunk());
        }
        let finish_reason = if self.tool_count > 0 {
            FinishReason::ToolCalls
        } else {
            match reason {
                "MAX_TOKENS" => FinishReason::Length,
                "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            }
        };
        out.push(StreamChunk::terminal(finish_reason, self.usage.take()));
        out
    }

    fn thinking_end_chunk(&mut self) -> StreamChunk {
        self.thinking_open = false;
        StreamChunk::delta(ChunkDelta {
            thinking_end: true,
            ..Default::default()
        })
    }

    fn take_role(&mut self) -> Option<String> {
        if self.role_pending {
            self.role_pending = false;
            Some("assistant".to_string())
        } else {
            None
        }
    }
}
