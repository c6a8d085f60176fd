//! Ingest/query/health routes ('s "external collaborators"
//! surface around the four CORE subsystems). Grounded on the reference
//! crate's `http/routes.rs` (`create_router` + handler-per-route,
//! `JsonResponse<T>` envelope, `?` through `AppError`).

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoria_core::cee::{self, PrefixInput};
use memoria_core::ingest::envelope::{InputContext, InputOptions, InputSource, Mode, RawInput};
use memoria_core::ingest::{self, PromptState};
use memoria_core::ssa::filters::FilterRequest;
use memoria_core::ssa::{self, QueryRequest};
use memoria_core::types::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::{AppResult, AppState, JsonResponse};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest_text))
        .route("/query", post(query))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    healthy: bool,
    total_nodes: u64,
    total_edges: u64,
    uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> AppResult<Json<JsonResponse<HealthData>>> {
    let store = state.store.clone();
    let metrics = tokio::task::spawn_blocking(move || store.get_graph_metrics()).await??;
    Ok(JsonResponse::ok(HealthData {
        healthy: true,
        total_nodes: metrics.total_nodes,
        total_edges: metrics.total_edges,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SourceDto {
    Chat,
    File,
    Voice,
    Api,
    Stream,
}

impl From<SourceDto> for InputSource {
    fn from(s: SourceDto) -> Self {
        match s {
            SourceDto::Chat => InputSource::Chat,
            SourceDto::File => InputSource::File,
            SourceDto::Voice => InputSource::Voice,
            SourceDto::Api => InputSource::Api,
            SourceDto::Stream => InputSource::Stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequestDto {
    #[serde(default = "default_source")]
    source: SourceDto,
    #[serde(default)]
    incognito: bool,
    #[serde(default)]
    force_save: bool,
    text: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    #[serde(default = "default_session_id")]
    session_id: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

fn default_source() -> SourceDto {
    SourceDto::Chat
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_user_id() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
struct IngestResponseDto {
    action: String,
    intent: String,
    save_signal: String,
    confidence: f32,
    content_category: String,
    prompted: bool,
    created_node_ids: Vec<String>,
    total_duration_ms: u64,
}

async fn ingest_text(
    State(state): State<AppState>,
    Json(req): Json<IngestRequestDto>,
) -> AppResult<Json<JsonResponse<IngestResponseDto>>> {
    let raw = RawInput {
        source: req.source.into(),
        mode: if req.incognito { Mode::Incognito } else { Mode::Normal },
        text: req.text,
        file_name: req.file_name,
        mime_type: req.mime_type,
        content: req.content,
        metadata: req.metadata,
    };
    let user_behavior = {
        let behavior = state.behavior.clone();
        let user_id = req.user_id.clone();
        tokio::task::spawn_blocking(move || behavior.load(&user_id)).await??
    };
    let context = InputContext {
        session_id: req.session_id,
        user_id: req.user_id.clone(),
        conversation_history: Vec::new(),
        user_behavior,
    };
    let options = InputOptions { force_save: req.force_save, content_category: None };

    let store = state.store.clone();
    let llm = state.llm.clone();
    let ingest_config = state.ingest_config.clone();
    let result = tokio::task::spawn_blocking(move || {
        ingest::process(raw, context, options, llm.as_ref(), store.as_ref(), PromptState::default(), &ingest_config)
    })
    .await??;

    let mut created_node_ids = Vec::new();
    if let Some(commit) = &result.commit {
        created_node_ids = commit.outcome.created_ids.iter().map(|id| id.to_string()).collect();
        for &node_id in &commit.outcome.created_ids {
            embed_and_link(&state, node_id).await?;
        }
    }

    Ok(JsonResponse::ok(IngestResponseDto {
        action: format!("{:?}", result.action),
        intent: format!("{:?}", result.classification.intent),
        save_signal: format!("{:?}", result.classification.save_signal),
        confidence: result.classification.confidence,
        content_category: result.classification.content_category.as_str().to_string(),
        prompted: result.prompted,
        created_node_ids,
        total_duration_ms: result.stage_durations_ms.total_ms(),
    }))
}

/// Post-commit CEE step : generate the node's context prefix,
/// embed it through the provider chain, write the embedding back, and
/// run similarity-edge maintenance against recently embedded nodes. Runs
/// best-effort — a degraded embed still leaves the node committed.
async fn embed_and_link(state: &AppState, node_id: memoria_core::ids::NodeId) -> AppResult<()> {
    let store = state.store.clone();
    let fallback = state.fallback.clone();
    tokio::task::spawn_blocking(move || -> memoria_core::error::Result<()> {
        let Some(node) = store.get_node(node_id)? else {
            return Ok(());
        };
        let prefix_input = PrefixInput {
            node_type: Some(node.kind),
            node_subtype: node.subtype.clone(),
            title: node.title.clone(),
            content: node.body.clone(),
            ..Default::default()
        };
        let prefix = cee::generate_context_prefix(&prefix_input);
        match fallback.embed(&prefix, &node.body) {
            cee::EmbedOutcome::Ok(embedding) => {
                store.update_embedding(node_id, embedding)?;
                if let Some(node) = store.get_node(node_id)? {
                    cee::maintain_on_commit(store.as_ref(), &node)?;
                }
            }
            cee::EmbedOutcome::Degraded { .. } => {}
        }
        Ok(())
    })
    .await??;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QueryRequestDto {
    queries: Vec<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    include_connections: bool,
    #[serde(default)]
    types: Vec<String>,
}

fn default_limit() -> usize {
    30
}

#[derive(Debug, Serialize)]
struct RankedResultDto {
    node_id: String,
    score: f32,
    primary_signal: String,
    explanation: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct QueryResponseDto {
    results: Vec<RankedResultDto>,
    seeds_found: usize,
    nodes_activated: usize,
    total_duration_ms: u64,
}

fn parse_node_kind(s: &str) -> Option<NodeKind> {
    match s {
        "concept" => Some(NodeKind::Concept),
        "episode" => Some(NodeKind::Episode),
        "chunk" => Some(NodeKind::Chunk),
        "section" => Some(NodeKind::Section),
        "note" => Some(NodeKind::Note),
        "raw" => Some(NodeKind::Raw),
        "document" => Some(NodeKind::Document),
        _ => None,
    }
}

fn signal_name(signal: memoria_core::ssa::rerank::Signal) -> &'static str {
    use memoria_core::ssa::rerank::Signal;
    match signal {
        Signal::Semantic => "semantic",
        Signal::Keyword => "keyword",
        Signal::Graph => "graph",
        Signal::Recency => "recency",
        Signal::Authority => "authority",
        Signal::Affinity => "affinity",
    }
}

async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequestDto>,
) -> AppResult<Json<JsonResponse<QueryResponseDto>>> {
    let request = QueryRequest {
        queries: req.queries,
        filter: FilterRequest {
            types: req.types.iter().filter_map(|s| parse_node_kind(s)).collect(),
            ..Default::default()
        },
        limit: req.limit,
        include_connections: req.include_connections,
        ..Default::default()
    };

    let store = state.store.clone();
    let embedder = state.query_embedder.clone();
    let spread_config = state.spread_config.clone();
    let rerank_config = state.rerank_config.clone();
    let response = tokio::task::spawn_blocking(move || {
        ssa::query(store.as_ref(), embedder.as_ref(), &request, &spread_config, &rerank_config)
    })
    .await??;

    let mut results = Vec::with_capacity(response.results.len());
    for r in &response.results {
        let store = state.store.clone();
        let node_id = r.node_id;
        let title = tokio::task::spawn_blocking(move || store.get_node(node_id))
            .await??
            .map(|n| n.title)
            .unwrap_or_default();
        results.push(RankedResultDto {
            node_id: r.node_id.to_string(),
            score: r.score,
            primary_signal: signal_name(r.primary_signal).to_string(),
            explanation: r.explanation.clone(),
            title,
        });
    }

    Ok(JsonResponse::ok(QueryResponseDto {
        results,
        seeds_found: response.metrics.seeds_found,
        nodes_activated: response.metrics.nodes_activated,
        total_duration_ms: response.metrics.total_ms,
    }))
}
