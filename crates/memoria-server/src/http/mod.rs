//! Shared HTTP plumbing. Grounded on the reference crate's
//! `http/mod.rs`: a cloneable `AppState`, a `JsonResponse<T>` envelope,
//! and an `AppError` that turns any error into a 500 + JSON body so
//! handlers can just use `?`.

pub mod routes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memoria_core::cee::FallbackEmbedder;
use memoria_core::ingest::IngestConfig;
use memoria_core::ports::{BehaviorPort, EmbedPort, LLMPort, StorePort};
use memoria_core::ssa::rerank::RerankConfig;
use memoria_core::ssa::spread::SpreadConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorePort>,
    /// Full provider chain, used for context-prefixed node embedding
    /// after ingest commit.
    pub fallback: Arc<FallbackEmbedder>,
    /// Thin `EmbedPort` view over `fallback`, used by SSA query
    /// embedding, which has no node context to prefix with.
    pub query_embedder: Arc<dyn EmbedPort>,
    pub behavior: Arc<dyn BehaviorPort>,
    pub llm: Arc<dyn LLMPort>,
    pub ingest_config: Arc<IngestConfig>,
    pub spread_config: Arc<SpreadConfig>,
    pub rerank_config: Arc<RerankConfig>,
    pub started_at: Instant,
}

#[derive(Debug, Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data: Some(data), error: None })
    }
}

impl JsonResponse<()> {
    pub fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self { success: false, data: None, error: Some(message.into()) })
    }
}

/// Wraps any error reaching a handler (core, store, serde) into a JSON
/// 500. This is the catch-all path; handlers that need a different
/// status code build their own response instead of using `?` into this.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, JsonResponse::<()>::err(self.0.to_string())).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
