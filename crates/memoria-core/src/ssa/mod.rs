//! Seeded Spreading Activation retrieval : hybrid seeding,
//! bounded activation spread over typed edges, then multi-signal
//! reranking.

pub mod extras;
pub mod filters;
pub mod rerank;
pub mod seeding;
pub mod spread;

use crate::cee::{self, QueryCombination};
use crate::error::Result;
use crate::ids::NodeId;
use crate::ports::{EmbedPort, StorePort};
use chrono::Utc;
use extras::{connection_map, serendipity_candidates, ConnectionEdge, SerendipityLevel};
use filters::{CompiledFilter, FilterRequest};
use rerank::{combine, compute_components, explain, profile_for_subtype, RerankConfig, RerankScore, ScoredNode};
use spread::{spread, SpreadConfig, SpreadResult};

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub queries: Vec<String>,
    pub filter: FilterRequest,
    pub serendipity_level: SerendipityLevel,
    pub query_combination: QueryCombination,
    pub limit: usize,
    pub include_connections: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            filter: FilterRequest::default(),
            serendipity_level: SerendipityLevel::Off,
            query_combination: QueryCombination::Average,
            limit: 30,
            include_connections: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedResult {
    pub node_id: NodeId,
    pub score: f32,
    pub primary_signal: rerank::Signal,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    pub embed_ms: u64,
    pub seed_ms: u64,
    pub spread_ms: u64,
    pub rerank_ms: u64,
    pub total_ms: u64,
    pub seeds_found: usize,
    pub nodes_activated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub results: Vec<RankedResult>,
    pub connections: Vec<ConnectionEdge>,
    pub serendipity: Vec<NodeId>,
    pub metrics: QueryMetrics,
}

const DEFAULT_MAX_LIMIT: usize = 100;

/// Run the full SSA pipeline for one request (Steps 0-5), with
/// deployment-tunable spreading and reranking parameters.
pub fn query(
    store: &dyn StorePort,
    embedder: &dyn EmbedPort,
    request: &QueryRequest,
    spread_config: &SpreadConfig,
    rerank_config: &RerankConfig,
) -> Result<QueryResponse> {
    let started = std::time::Instant::now();

    let mut compiled_filter = CompiledFilter::compile(request.filter.clone())?;
    let effective_max_hops = compiled_filter.effective_max_hops(spread_config.max_hops);
    if let Some(origin) = compiled_filter.connected_to() {
        let reachable = spread::reachable_within(store, origin, &compiled_filter, effective_max_hops)?;
        compiled_filter = compiled_filter.with_reachable(reachable);
    }
    let spread_config = &SpreadConfig { max_hops: effective_max_hops, ..*spread_config };

    let t = std::time::Instant::now();
    let analyses: Vec<cee::QueryAnalysis> = request.queries.iter().map(|q| cee::analyze(q)).collect();
    let mut query_vectors = Vec::new();
    for analysis in &analyses {
        if analysis.should_skip_embedding() {
            continue;
        }
        let text = if analysis.semantic_part.is_empty() {
            analysis.original_query.clone()
        } else {
            analysis.semantic_part.clone()
        };
        let embedded = embedder.embed(&[text])?;
        if let Some(vector) = embedded.into_iter().next() {
            query_vectors.push(vector);
        }
    }
    let bm25_terms = cee::union_terms(&request.queries);
    let embed_ms = t.elapsed().as_millis() as u64;

    let t = std::time::Instant::now();
    let seeding_outcome = seeding::seed(
        store,
        &query_vectors,
        &bm25_terms,
        request.query_combination,
        &compiled_filter,
        seeding::MAX_SEEDS,
    )?;
    let seed_ms = t.elapsed().as_millis() as u64;

    if seeding_outcome.seeds.is_empty() {
        return Ok(QueryResponse {
            results: Vec::new(),
            connections: Vec::new(),
            serendipity: Vec::new(),
            metrics: QueryMetrics {
                embed_ms,
                seed_ms,
                spread_ms: 0,
                rerank_ms: 0,
                total_ms: started.elapsed().as_millis() as u64,
                seeds_found: 0,
                nodes_activated: 0,
            },
        });
    }

    let t = std::time::Instant::now();
    let SpreadResult { activations, nodes_visited, .. } = spread(
        store,
        &seeding_outcome.seeds,
        &seeding_outcome.candidates,
        &compiled_filter,
        spread_config,
    )?;
    let spread_ms = t.elapsed().as_millis() as u64;

    let t = std::time::Instant::now();
    let now = Utc::now();
    let graph_metrics = store.get_graph_metrics()?;
    let max_access_count_observed = activations
        .iter()
        .filter_map(|a| store.get_node_for_reranking(a.node_id).ok().flatten())
        .map(|f| f.access_count)
        .max()
        .unwrap_or(0);

    let mut ranked: Vec<RankedResult> = Vec::new();
    for activation in &activations {
        let Some(fields) = store.get_node_for_reranking(activation.node_id)? else {
            continue;
        };
        let Some(node) = store.get_node(activation.node_id)? else {
            continue;
        };
        let scored = ScoredNode {
            id: activation.node_id,
            semantic_score: activation.vector_score,
            bm25_score: activation.bm25_score,
            graph_score: activation.activation,
            last_accessed: fields.last_accessed,
            created_at: fields.created_at,
            access_count: fields.access_count,
            inbound_edge_count: fields.inbound_edge_count,
            subtype: fields.subtype.clone(),
        };
        let weights = profile_for_subtype(scored.subtype.as_deref(), &rerank_config.profiles);
        let components = compute_components(
            &scored,
            now,
            node.content_category,
            graph_metrics,
            max_access_count_observed,
            &rerank_config.half_lives,
        );
        let RerankScore { score, primary_signal, .. } = combine(components, weights);
        ranked.push(RankedResult {
            node_id: activation.node_id,
            score,
            primary_signal,
            explanation: explain(primary_signal, components.raw(primary_signal)),
        });
    }
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    let limit = request.limit.clamp(1, DEFAULT_MAX_LIMIT);
    ranked.truncate(limit);
    let rerank_ms = t.elapsed().as_millis() as u64;

    let connections = if request.include_connections {
        connection_map(store, &activations, &compiled_filter)?
    } else {
        Vec::new()
    };
    let serendipity = serendipity_candidates(&activations, request.serendipity_level);

    Ok(QueryResponse {
        results: ranked,
        connections,
        serendipity,
        metrics: QueryMetrics {
            embed_ms,
            seed_ms,
            spread_ms,
            rerank_ms,
            total_ms: started.elapsed().as_millis() as u64,
            seeds_found: seeding_outcome.seeds.len(),
            nodes_activated: nodes_visited,
        },
    })
}
