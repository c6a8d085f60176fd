//! External ports. The CORE never touches a concrete store,
//! index, or provider directly — every external interaction goes through
//! one of these traits, the same way the reference crate's
//! `storage::Storage` and `vector::EmbeddingService` traits separate the
//! core's logic from its concrete `redb`/`fastembed` backends. Signatures
//! here are synchronous (the core is a blocking library); `memoria-server`
//! wraps calls in `spawn_blocking` at the async boundary.

use crate::error::Result;
use crate::ids::NodeId;
use crate::types::{Edge, EdgeType, Embedding, Node, StagingRecord, UserBehaviorModel};

/// A neighbor reached by one hop from some node, as returned by
/// `StorePort::get_neighbors`.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub node: Node,
    pub edge: Edge,
}

/// A scored hit from the concrete vector index (`vectorSearch`).
#[derive(Debug, Clone, Copy)]
pub struct VectorHit {
    pub node_id: NodeId,
    /// Cosine similarity, `[0, 1]`, descending order.
    pub score: f32,
}

/// A scored hit from the concrete full-text index (`bm25Search`).
/// Scores are NOT normalized; callers (CEE hybrid fusion) do that.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Hit {
    pub node_id: NodeId,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphMetrics {
    pub total_nodes: u64,
    pub total_edges: u64,
    pub avg_degree: f32,
}

/// The subset of a node's fields the reranker needs, fetched separately
/// from the full `Node` so a store can serve it from a lightweight index.
#[derive(Debug, Clone)]
pub struct RerankFields {
    pub id: NodeId,
    pub last_accessed: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub access_count: u64,
    pub inbound_edge_count: u64,
    pub subtype: Option<String>,
}

/// Outcome of `StorePort::commit`: stable ids for everything the batch
/// produced.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub created_ids: Vec<NodeId>,
    pub updated_ids: Vec<NodeId>,
    pub linked_edge_ids: Vec<crate::ids::EdgeId>,
}

/// A node staged for commit, paired with the ids it should link to.
#[derive(Debug, Clone)]
pub struct CommitNode {
    pub staged: StagingRecord,
    pub node: Node,
}

/// A pending edge write, addressed by the nodes' staging ids so the
/// store can translate to final `NodeId`s after insert.
#[derive(Debug, Clone)]
pub struct CommitEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub weight: f32,
}

/// Storage port (StorePort). Owns Node/Edge rows, the concrete
/// vector index, and the concrete full-text index — all three are
/// "external collaborators" kept out of the CORE's own logic.
pub trait StorePort: Send + Sync {
    fn get_node(&self, id: NodeId) -> Result<Option<Node>>;
    fn get_neighbors(&self, node_id: NodeId) -> Result<Vec<Neighbor>>;
    /// Cosine similarity, descending, top `limit`.
    fn vector_search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;
    /// Unnormalized BM25 scores, top `limit`.
    fn bm25_search(&self, terms: &[String], limit: usize) -> Result<Vec<Bm25Hit>>;
    fn get_graph_metrics(&self) -> Result<GraphMetrics>;
    fn get_node_for_reranking(&self, id: NodeId) -> Result<Option<RerankFields>>;
    /// All-or-nothing: either every staged node and edge lands, or none
    /// does (Stage 6 failure semantics).
    fn commit(&self, nodes: &[CommitNode], edges: &[CommitEdge]) -> Result<CommitOutcome>;
    /// Create (or overwrite) a single edge outside of a batch commit —
    /// used by CEE similarity maintenance, which runs per-node
    /// after the node's own commit has already landed.
    fn upsert_edge(&self, edge: &Edge) -> Result<()>;
    fn remove_edge(&self, id: crate::ids::EdgeId) -> Result<()>;
    /// Most recently embedded nodes, newest first, for similarity
    /// maintenance's bounded recent-window scan.
    fn recent_embedded_nodes(&self, limit: usize) -> Result<Vec<Node>>;
    /// Write a freshly produced or re-embedded vector onto an
    /// already-committed node (the CEE embeds after Stage 6 commit, not
    /// as part of it) and refresh the vector index and recent-embedded
    /// window accordingly.
    fn update_embedding(&self, node_id: NodeId, embedding: Embedding) -> Result<()>;
}

/// Embedding port (EmbedPort). The caller passes a batch; the
/// core embeds either one query-combined vector or one text per node.
pub trait EmbedPort: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Per-user behavior persistence (BehaviorPort). Mutated only by
/// ingestion, serialized per user id by the caller — the port
/// itself makes no concurrency guarantees beyond that contract.
pub trait BehaviorPort: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<UserBehaviorModel>>;
    fn record_prompt(&self, user_id: &str, was_shown: bool) -> Result<()>;
    fn record_save(&self, user_id: &str, was_saved: bool) -> Result<()>;
}

/// Partial classification result an `LLMPort` can contribute at Stage 2
/// Step 5. Every field is optional: the stub implementation only ever
/// fills `intent`/`save_signal`/`confidence`.
#[derive(Debug, Clone, Default)]
pub struct PartialClassification {
    pub intent: Option<String>,
    pub save_signal: Option<String>,
    pub confidence: Option<f32>,
}

/// LLM classification stub, deliberately thin. Used only in the
/// Stage 2 fallback branch.
pub trait LLMPort: Send + Sync {
    fn classify_text(&self, text: &str) -> Result<PartialClassification>;
}

/// Stub default: `implicit/0.7`, nothing more. Wired in when no real
/// LLM classifier is configured (see DESIGN.md's Open Questions).
pub struct NoopLLMPort;

impl LLMPort for NoopLLMPort {
    fn classify_text(&self, _text: &str) -> Result<PartialClassification> {
        Ok(PartialClassification {
            intent: Some("content".to_string()),
            save_signal: Some("implicit".to_string()),
            confidence: Some(0.7),
        })
    }
}
