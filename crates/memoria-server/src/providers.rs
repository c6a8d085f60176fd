//! Concrete embedding providers for the CEE provider chain (:
//! `openai-3-small` primary, `voyage-3-lite` secondary, `minilm-v6`
//! local). HTTP wiring is a server-composition concern, not core logic —
//! grounded on the reference crate's `reqwest::Client` usage in
//! `cli/agent.rs`/`mcp/mod.rs`, generalized from async calls to a
//! blocking client since `cee::embedding::Provider::call` is synchronous
//! (the core is a blocking library; `memoria-server` calls into it from
//! inside `spawn_blocking`, so a blocking HTTP client here is consistent
//! rather than nesting another runtime).

use memoria_core::cee::{Provider, ProviderFailure};
use reqwest::blocking::Client;
use std::time::Duration;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

fn classify_status(status: reqwest::StatusCode) -> ProviderFailure {
    match status.as_u16() {
        429 => ProviderFailure::RateLimited,
        400 => ProviderFailure::BadRequest,
        401 => ProviderFailure::Unauthorized,
        403 => ProviderFailure::Forbidden,
        500..=599 => ProviderFailure::ServerError,
        _ => ProviderFailure::Network,
    }
}

/// `openai-3-small` (1536d, primary tier). Returns `Unauthorized`
/// immediately, without a network round-trip, when no API key is
/// configured — a deployment with no key set is simply running without
/// its primary provider, not hitting a retryable failure.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::builder().timeout(PROVIDER_TIMEOUT).build().expect("reqwest client"),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-3-small"
    }

    fn dimensions(&self) -> usize {
        1536
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn call(&self, text: &str) -> Result<Vec<f32>, ProviderFailure> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderFailure::Unauthorized);
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "model": "text-embedding-3-small", "input": text }))
            .send()
            .map_err(|_| ProviderFailure::Network)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }
        let body: serde_json::Value = response.json().map_err(|_| ProviderFailure::Network)?;
        parse_embedding_vector(&body, &["data", "0", "embedding"])
    }
}

/// `voyage-3-lite` (512d, secondary tier). Same key-gating behavior as
/// [`OpenAiProvider`].
pub struct VoyageProvider {
    client: Client,
    api_key: Option<String>,
}

impl VoyageProvider {
    pub fn new() -> Self {
        Self {
            client: Client::builder().timeout(PROVIDER_TIMEOUT).build().expect("reqwest client"),
            api_key: std::env::var("VOYAGE_API_KEY").ok(),
        }
    }
}

impl Provider for VoyageProvider {
    fn name(&self) -> &str {
        "voyage-3-lite"
    }

    fn dimensions(&self) -> usize {
        512
    }

    fn is_primary(&self) -> bool {
        false
    }

    fn call(&self, text: &str) -> Result<Vec<f32>, ProviderFailure> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderFailure::Unauthorized);
        };
        let response = self
            .client
            .post("https://api.voyageai.com/v1/embeddings")
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "model": "voyage-3-lite", "input": [text] }))
            .send()
            .map_err(|_| ProviderFailure::Network)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }
        let body: serde_json::Value = response.json().map_err(|_| ProviderFailure::Network)?;
        parse_embedding_vector(&body, &["data", "0", "embedding"])
    }
}

/// Walk a `serde_json::Value` by a fixed path of object keys / array
/// indices and decode the leaf as a dense float vector.
fn parse_embedding_vector(body: &serde_json::Value, path: &[&str]) -> Result<Vec<f32>, ProviderFailure> {
    let mut current = body;
    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index).ok_or(ProviderFailure::Network)?,
            Err(_) => current.get(segment).ok_or(ProviderFailure::Network)?,
        };
    }
    current
        .as_array()
        .ok_or(ProviderFailure::Network)?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or(ProviderFailure::Network))
        .collect()
}
