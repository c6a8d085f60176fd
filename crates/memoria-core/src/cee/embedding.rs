//! Embedding service: provider chain with retry and fallback. Grounded
//! on the reference crate's `vector/embedding.rs` `EmbeddingService`
//! trait and its blanket `impl<E> EmbeddingService for Arc<E>`,
//! generalized from one local `FastEmbedService` into a
//! `FallbackEmbedder` composing three providers behind a
//! `{primary -> secondary -> local -> degraded}` state machine.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::types::Embedding;

/// One provider's current health, tracked independently.
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    pub is_available: bool,
    pub last_success_at: Option<chrono::DateTime<Utc>>,
    pub last_failure_at: Option<chrono::DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl ProviderHealth {
    fn new() -> Self {
        Self {
            is_available: true,
            ..Default::default()
        }
    }

    fn record_success(&mut self) {
        self.is_available = true;
        self.last_success_at = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.last_failure_at = Some(Utc::now());
        self.consecutive_failures += 1;
    }
}

/// Classify whether a raw provider error is retryable: retry
/// on 429/5xx/connection reset/timeout/network, never on 400/401/403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailure {
    RateLimited,
    ServerError,
    Network,
    BadRequest,
    Unauthorized,
    Forbidden,
}

impl ProviderFailure {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ProviderFailure::RateLimited | ProviderFailure::ServerError | ProviderFailure::Network
        )
    }
}

/// A single embedding provider in the fallback chain.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn dimensions(&self) -> usize;
    fn is_primary(&self) -> bool;
    fn call(&self, text: &str) -> Result<Vec<f32>, ProviderFailure>;
}

/// Outcome of `FallbackEmbedder::embed`.
#[derive(Debug, Clone)]
pub enum EmbedOutcome {
    Ok(Embedding),
    /// All providers exhausted: embedding is null, node still commits,
    /// flagged for later re-embed.
    Degraded { error: String },
}

struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Composes providers behind a fallback state machine.
/// `sleep` is injectable so tests don't pay the real backoff.
pub struct FallbackEmbedder {
    providers: Vec<Arc<dyn Provider>>,
    health: Vec<Mutex<ProviderHealth>>,
    retry: RetryPolicy,
    sleep: Arc<dyn Fn(Duration) + Send + Sync>,
}

impl FallbackEmbedder {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let health = providers.iter().map(|_| Mutex::new(ProviderHealth::new())).collect();
        Self {
            providers,
            health,
            retry: RetryPolicy::default(),
            sleep: Arc::new(std::thread::sleep),
        }
    }

    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    fn context_fields(context_prefix: &str, body: &str) -> String {
        if context_prefix.is_empty() {
            body.to_string()
        } else {
            format!("{context_prefix}\n{body}")
        }
    }

    /// Embed `body` under `context_prefix`, walking the provider chain.
    pub fn embed(&self, context_prefix: &str, body: &str) -> EmbedOutcome {
        let input = Self::context_fields(context_prefix, body);
        let context_hash = crate::cee::hash::stable_hash(context_prefix);

        for (idx, provider) in self.providers.iter().enumerate() {
            match self.call_with_retry(provider.as_ref(), &input) {
                Ok(vector) => {
                    self.health[idx].lock().unwrap().record_success();
                    // Any primary success resets the whole chain.
                    if provider.is_primary() {
                        for h in &self.health {
                            *h.lock().unwrap() = ProviderHealth::new();
                        }
                    }
                    if idx > 0 {
                        log::info!(
                            "embed: fell back to provider {} ({}d, provisional)",
                            provider.name(),
                            provider.dimensions()
                        );
                    }
                    return EmbedOutcome::Ok(Embedding {
                        vector,
                        dimensions: provider.dimensions(),
                        model: provider.name().to_string(),
                        context_prefix: context_prefix.to_string(),
                        context_hash,
                        created_at: Utc::now(),
                        provisional: !provider.is_primary(),
                        version: 1,
                    });
                }
                Err(e) => {
                    self.health[idx].lock().unwrap().record_failure();
                    log::warn!("embed: provider {} failed ({:?}), advancing fallback chain", provider.name(), e);
                    continue;
                }
            }
        }

        log::warn!("embed: all embedding providers exhausted, committing without embedding");
        EmbedOutcome::Degraded {
            error: "all embedding providers exhausted".to_string(),
        }
    }

    fn call_with_retry(&self, provider: &dyn Provider, input: &str) -> Result<Vec<f32>, ProviderFailure> {
        let mut last_err = ProviderFailure::Network;
        for attempt in 0..=self.retry.attempts {
            match provider.call(input) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    last_err = e;
                    if !e.is_retryable() || attempt == self.retry.attempts {
                        return Err(e);
                    }
                    (self.sleep)(self.retry.backoff);
                }
            }
        }
        Err(last_err)
    }

    pub fn health(&self) -> Vec<ProviderHealth> {
        self.health.iter().map(|h| h.lock().unwrap().clone()).collect()
    }
}

/// Increment `version` by exactly one on re-embed (property).
pub fn re_embed(existing: &Embedding, new_vector: Vec<f32>, model: &str, context_prefix: &str, provisional: bool) -> Embedding {
    Embedding {
        vector: new_vector,
        dimensions: existing.dimensions,
        model: model.to_string(),
        context_prefix: context_prefix.to_string(),
        context_hash: crate::cee::hash::stable_hash(context_prefix),
        created_at: Utc::now(),
        provisional,
        version: existing.version + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubProvider {
        name: &'static str,
        dims: usize,
        primary: bool,
        fail_times: AtomicU32,
        failure: ProviderFailure,
    }

    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn dimensions(&self) -> usize {
            self.dims
        }
        fn is_primary(&self) -> bool {
            self.primary
        }
        fn call(&self, _text: &str) -> Result<Vec<f32>, ProviderFailure> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                Err(self.failure)
            } else {
                Ok(vec![0.1; self.dims])
            }
        }
    }

    #[test]
    fn fallback_to_secondary_when_primary_exhausted() {
        let primary = Arc::new(StubProvider {
            name: "openai-3-small",
            dims: 1536,
            primary: true,
            fail_times: AtomicU32::new(10),
            failure: ProviderFailure::ServerError,
        });
        let secondary = Arc::new(StubProvider {
            name: "voyage-3-lite",
            dims: 512,
            primary: false,
            fail_times: AtomicU32::new(0),
            failure: ProviderFailure::ServerError,
        });
        let embedder = FallbackEmbedder::new(vec![primary, secondary]).with_sleep(|_| {});
        match embedder.embed("[ctx]", "hello world") {
            EmbedOutcome::Ok(e) => {
                assert_eq!(e.model, "voyage-3-lite");
                assert!(e.provisional);
            }
            EmbedOutcome::Degraded { .. } => panic!("expected success from secondary"),
        }
    }

    #[test]
    fn non_retryable_failure_skips_straight_to_next_provider() {
        let primary = Arc::new(StubProvider {
            name: "openai-3-small",
            dims: 1536,
            primary: true,
            fail_times: AtomicU32::new(1),
            failure: ProviderFailure::Unauthorized,
        });
        let secondary = Arc::new(StubProvider {
            name: "voyage-3-lite",
            dims: 512,
            primary: false,
            fail_times: AtomicU32::new(0),
            failure: ProviderFailure::ServerError,
        });
        let embedder = FallbackEmbedder::new(vec![primary, secondary]).with_sleep(|_| {});
        match embedder.embed("", "hello") {
            EmbedOutcome::Ok(e) => assert_eq!(e.model, "voyage-3-lite"),
            EmbedOutcome::Degraded { .. } => panic!(),
        }
    }

    #[test]
    fn all_exhausted_yields_degraded() {
        let p = Arc::new(StubProvider {
            name: "local",
            dims: 384,
            primary: false,
            fail_times: AtomicU32::new(100),
            failure: ProviderFailure::Network,
        });
        let embedder = FallbackEmbedder::new(vec![p]).with_sleep(|_| {});
        match embedder.embed("", "hello") {
            EmbedOutcome::Degraded { .. } => {}
            EmbedOutcome::Ok(_) => panic!("expected degraded"),
        }
    }

    #[test]
    fn re_embed_increments_version_by_one() {
        let existing = Embedding {
            vector: vec![0.0; 4],
            dimensions: 4,
            model: "m".to_string(),
            context_prefix: "old".to_string(),
            context_hash: crate::cee::hash::stable_hash("old"),
            created_at: Utc::now(),
            provisional: false,
            version: 3,
        };
        let updated = re_embed(&existing, vec![1.0; 4], "m", "new", false);
        assert_eq!(updated.version, 4);
    }
}
