//! Rate-limit fallback routing with per-model cooldown.
//!
//! Wraps the two dispatch shapes (collected and streaming). When a typed
//! rate-limit error arrives for a model that has a fallback entry and is
//! not already cooling, the router records the cooldown and re-invokes the
//! dispatch closure once with the fallback model; the retry runs against a
//! fresh upstream call, so all per-stream state starts over. The router
//! itself never sleeps.

use gembridge_translate::{StreamCollector, StreamOutcome};
use gembridge_types::{BridgeError, ChunkStream, traits::Result};
use futures_util::StreamExt as _;
use std::future::Future;
use std::time::Duration;

use crate::cooldown::CooldownTracker;
use crate::registry;

/// Routes requests to the best available model and transparently retries
/// rate-limited calls on the static fallback chain.
#[derive(Debug)]
pub struct FallbackRouter {
    cooldowns: CooldownTracker,
    enabled: bool,
}

impl FallbackRouter {
    #[must_use]
    pub fn new(enabled: bool, cooldown_window: Duration) -> Self {
        Self {
            cooldowns: CooldownTracker::new(cooldown_window),
            enabled,
        }
    }

    /// The underlying cooldown tracker.
    #[must_use]
    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Walk the fallback chain from `model`, skipping models still in
    /// cooldown. Returns the first available model, or the original when
    /// auto-switching is disabled or the whole chain is cooling.
    #[must_use]
    pub fn best_available(&self, model: &str) -> String {
        if !self.enabled {
            return model.to_string();
        }
        let mut current = model;
        while self.cooldowns.is_in_cooldown(current) {
            match registry::fallback_for(current) {
                Some(next) => current = next,
                None => return model.to_string(),
            }
        }
        current.to_string()
    }

    /// Dispatch a non-streaming call: drain the chunk stream into a
    /// [`StreamOutcome`], retrying once on the fallback model if rate
    /// limited. Returns the model that actually served the request.
    ///
    /// # Errors
    ///
    /// Propagates the original error when auto-switching is disabled, the
    /// model has no fallback entry, or it is already in cooldown.
    pub async fn run_collected<F, Fut>(&self, model: &str, doit: F) -> Result<(String, StreamOutcome)>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<ChunkStream>>,
    {
        match collect_once(model, &doit).await {
            Ok(outcome) => Ok((model.to_string(), outcome)),
            Err(err) => {
                let fallback = self.fallback_target(model, &err)?;
                let outcome = collect_once(&fallback, &doit).await?;
                Ok((fallback, outcome))
            }
        }
    }

    /// Dispatch a streaming call, retrying once on the fallback model if
    /// the stream cannot be opened due to rate limiting. Returns the model
    /// that actually serves the stream.
    ///
    /// # Errors
    ///
    /// Propagates the original error when no fallback applies.
    pub async fn run_streaming<F, Fut>(&self, model: &str, doit: F) -> Result<(String, ChunkStream)>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<ChunkStream>>,
    {
        match doit(model.to_string()).await {
            Ok(stream) => Ok((model.to_string(), stream)),
            Err(err) => {
                let fallback = self.fallback_target(model, &err)?;
                let stream = doit(fallback.clone()).await?;
                Ok((fallback, stream))
            }
        }
    }

    /// Decide whether `err` warrants a fallback retry for `model`; if so,
    /// record the cooldown and return the fallback model.
    fn fallback_target(&self, model: &str, err: &BridgeError) -> Result<String> {
        let BridgeError::RateLimited {
            status, message, ..
        } = err
        else {
            return Err(clone_error(err));
        };
        if !self.enabled || self.cooldowns.is_in_cooldown(model) {
            return Err(clone_error(err));
        }
        self.cooldowns.record(model, *status);
        let Some(fallback) = registry::fallback_for(model) else {
            return Err(clone_error(err));
        };
        tracing::warn!(
            from = model,
            to = fallback,
            %message,
            "rate limited, switching to fallback model"
        );
        Ok(fallback.to_string())
    }
}

async fn collect_once<F, Fut>(model: &str, doit: &F) -> Result<StreamOutcome>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<ChunkStream>>,
{
    let mut stream = doit(model.to_string()).await?;
    let mut collector = StreamCollector::new();
    while let Some(chunk) = stream.next().await {
        collector.push(&chunk?);
    }
    Ok(collector.finish())
}

/// `BridgeError` holds no shared state, but some variants are not `Clone`;
/// rebuild the ones the router can see.
fn clone_error(err: &BridgeError) -> BridgeError {
    match err {
        BridgeError::RateLimited {
            status,
            reset_after,
            message,
        } => BridgeError::RateLimited {
            status: *status,
            reset_after: *reset_after,
            message: message.clone(),
        },
        BridgeError::Upstream { status, body } => BridgeError::Upstream {
            status: *status,
            body: body.clone(),
        },
        other => BridgeError::Http(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use gembridge_types::{ChunkDelta, FinishReason, StreamChunk};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text_stream(text: &'static str) -> ChunkStream {
        Box::pin(stream::iter(vec![
            Ok(StreamChunk::delta(ChunkDelta {
                role: Some("assistant".into()),
                content: Some(text.into()),
                ..Default::default()
            })),
            Ok(StreamChunk::terminal(FinishReason::Stop, None)),
        ]))
    }

    fn rate_limit() -> BridgeError {
        BridgeError::RateLimited {
            status: 429,
            reset_after: None,
            message: "RESOURCE_EXHAUSTED: Rate limited on gemini-2.5-pro.".into(),
        }
    }

    #[tokio::test]
    async fn test_collected_success_no_fallback() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        let (model, outcome) = router
            .run_collected("gemini-2.5-pro", |_| async { Ok(text_stream("hi")) })
            .await
            .unwrap();
        assert_eq!(model, "gemini-2.5-pro");
        assert_eq!(outcome.content, "hi");
        assert!(!router.cooldowns().is_in_cooldown("gemini-2.5-pro"));
    }

    #[tokio::test]
    async fn test_rate_limit_switches_to_fallback() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        let calls = AtomicUsize::new(0);
        let (model, outcome) = router
            .run_collected("gemini-2.5-pro", |m| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(rate_limit())
                    } else {
                        assert_eq!(m, "gemini-2.5-flash");
                        Ok(text_stream("fallback reply"))
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(model, "gemini-2.5-flash");
        assert_eq!(outcome.content, "fallback reply");
        assert!(router.cooldowns().is_in_cooldown("gemini-2.5-pro"));
        assert_eq!(router.cooldowns().statuses("gemini-2.5-pro"), vec![429]);
    }

    #[tokio::test]
    async fn test_disabled_router_rethrows() {
        let router = FallbackRouter::new(false, Duration::from_secs(600));
        let err = router
            .run_collected("gemini-2.5-pro", |_| async { Err(rate_limit()) })
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
        assert!(!router.cooldowns().is_in_cooldown("gemini-2.5-pro"));
    }

    #[tokio::test]
    async fn test_no_table_entry_rethrows() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        let err = router
            .run_collected("gemini-2.5-flash-lite-preview", |_| async {
                Err(BridgeError::RateLimited {
                    status: 429,
                    reset_after: None,
                    message: "limited".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn test_model_already_cooling_rethrows() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        router.cooldowns().record("gemini-2.5-pro", 429);
        let err = router
            .run_collected("gemini-2.5-pro", |_| async { Err(rate_limit()) })
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn test_non_rate_limit_errors_propagate() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        let err = router
            .run_collected("gemini-2.5-pro", |_| async {
                Err(BridgeError::Upstream {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Upstream { status: 500, .. }));
        assert!(!router.cooldowns().is_in_cooldown("gemini-2.5-pro"));
    }

    #[tokio::test]
    async fn test_streaming_fallback() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        let calls = AtomicUsize::new(0);
        let (model, _stream) = router
            .run_streaming("gemini-3-pro-preview", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(rate_limit())
                    } else {
                        Ok(text_stream("x"))
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(model, "gemini-2.5-pro");
    }

    #[test]
    fn test_best_available_walks_chain() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        assert_eq!(router.best_available("gemini-2.5-pro"), "gemini-2.5-pro");
        router.cooldowns().record("gemini-2.5-pro", 429);
        assert_eq!(router.best_available("gemini-2.5-pro"), "gemini-2.5-flash");
        router.cooldowns().record("gemini-2.5-flash", 429);
        assert_eq!(
            router.best_available("gemini-2.5-pro"),
            "gemini-2.5-flash-lite-preview"
        );
    }

    #[test]
    fn test_best_available_all_cooling_returns_original() {
        let router = FallbackRouter::new(true, Duration::from_secs(600));
        for model in [
            "gemini-2.5-pro",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite-preview",
        ] {
            router.cooldowns().record(model, 429);
        }
        assert_eq!(router.best_available("gemini-2.5-pro"), "gemini-2.5-pro");
    }

    #[test]
    fn test_best_available_disabled_is_identity() {
        let router = FallbackRouter::new(false, Duration::from_secs(600));
        router.cooldowns().record("gemini-2.5-pro", 429);
        assert_eq!(router.best_available("gemini-2.5-pro"), "gemini-2.5-pro");
    }
}
