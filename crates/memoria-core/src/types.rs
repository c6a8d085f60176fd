//! Core data model. The store owns `Node`/`Edge` rows; the core
//! only ever holds their ids, never pointers — graph representation stays
//! id-based the way the reference crate's `types.rs` does.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EdgeId, NodeId};

/// What a node represents. A closed enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Episode,
    Chunk,
    Section,
    Note,
    Raw,
    Document,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Concept => "concept",
            NodeKind::Episode => "episode",
            NodeKind::Chunk => "chunk",
            NodeKind::Section => "section",
            NodeKind::Note => "note",
            NodeKind::Raw => "raw",
            NodeKind::Document => "document",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse content category. Controls gate/classifier thresholds and
/// SSA recency half-lives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Identity,
    Academic,
    Conversation,
    Work,
    Temporal,
    Document,
    General,
}

impl Default for ContentCategory {
    fn default() -> Self {
        ContentCategory::General
    }
}

impl ContentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::Identity => "identity",
            ContentCategory::Academic => "academic",
            ContentCategory::Conversation => "conversation",
            ContentCategory::Work => "work",
            ContentCategory::Temporal => "temporal",
            ContentCategory::Document => "document",
            ContentCategory::General => "general",
        }
    }
}

/// One-way lifecycle, ARCHIVE<->DORMANT excepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Weak,
    Dormant,
    Archive,
    Deleted,
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Active
    }
}

impl LifecycleState {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Active, Weak) | (Weak, Dormant) | (Dormant, Archive) => true,
            (Archive, Dormant) | (Dormant, Archive) => true,
            (_, Deleted) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }
}

/// Source of a node mention's resolved content-time (Temporal model).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    Explicit,
    Inferred,
    UserStated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentTimeType {
    Historical,
    Relative,
    Approximate,
}

/// A single resolved time mention inside a node's body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentTimeMention {
    pub resolved: DateTime<Utc>,
    pub original_text: String,
    pub mention_type: ContentTimeType,
    pub confidence: f32,
}

/// When the event described by a node happened, as distinct from when it
/// was ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventTime {
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    pub source: TimeSource,
}

/// Four timestamps per node (Temporal model). Only `ingestion_time`
/// is required; everything else is inferred lazily.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemporalModel {
    pub event_time: Option<EventTime>,
    pub content_time_mentions: Vec<ContentTimeMention>,
    pub reference_patterns: Vec<String>,
}

/// Dense vector attached 1-1 to a `Node`, produced by the CEE.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub dimensions: usize,
    pub model: String,
    pub context_prefix: String,
    /// 32-bit stable hash of `context_prefix`, hex-padded to 8 chars.
    pub context_hash: String,
    pub created_at: DateTime<Utc>,
    pub provisional: bool,
    pub version: u32,
}

impl Embedding {
    /// `embedding.contextHash != H(currentPrefix)` re-embed trigger.
    pub fn needs_re_embedding(&self, current_prefix: &str) -> bool {
        self.context_hash != crate::cee::hash::stable_hash(current_prefix)
    }
}

/// A unit of memory (Node).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub subtype: Option<String>,
    pub title: String,
    pub body: String,
    pub content_category: ContentCategory,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Strictly increasing on every mutation.
    pub version: u32,
    pub lifecycle: LifecycleState,
    pub retrievability: f32,
    pub access_count: u64,
    pub inbound_edge_count: u64,
    pub cluster: Option<String>,
    pub tags: Vec<String>,
    pub embedding: Option<Embedding>,
    pub temporal: TemporalModel,
    pub metadata: HashMap<String, Value>,
}

impl Node {
    /// First line or first 100 trimmed chars of `body`.
    pub fn derive_title(body: &str) -> String {
        let first_line = body.lines().next().unwrap_or("").trim();
        if !first_line.is_empty() {
            return truncate_chars(first_line, 100);
        }
        truncate_chars(body.trim(), 100)
    }

    pub fn new(
        kind: NodeKind,
        subtype: Option<String>,
        body: String,
        content_category: ContentCategory,
    ) -> Self {
        let now = Utc::now();
        let title = Self::derive_title(&body);
        Node {
            id: NodeId::new(),
            kind,
            subtype,
            title,
            body,
            content_category,
            created_at: now,
            last_accessed_at: now,
            version: 1,
            lifecycle: LifecycleState::Active,
            retrievability: 1.0,
            access_count: 0,
            inbound_edge_count: 0,
            cluster: None,
            tags: Vec::new(),
            embedding: None,
            temporal: TemporalModel::default(),
            metadata: HashMap::new(),
        }
    }

    /// `body` non-empty and >= 3 chars (Node invariant).
    pub fn validate(&self) -> Result<(), String> {
        if self.body.trim().chars().count() < 3 {
            return Err("body must be non-empty and at least 3 characters".to_string());
        }
        if !(0.0..=1.0).contains(&self.retrievability) {
            return Err(format!(
                "retrievability {} out of range [0.0, 1.0]",
                self.retrievability
            ));
        }
        Ok(())
    }

    /// Record a read access: bumps `access_count`/`last_accessed_at`, does
    /// NOT bump `version` (reads are not mutations).
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }

    /// Any content mutation bumps `version` strictly.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>().trim_end().to_string()
    }
}

/// Closed enumeration of edge types with fixed SSA weights.
/// Unknown/extension types fall back to 0.5 at spread time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    SameEntity,
    ParentChild,
    Contradicts,
    Supports,
    RelatesTo,
    UserLinked,
    Supersedes,
    SimilarTo,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::SameEntity => "same_entity",
            EdgeType::ParentChild => "parent_child",
            EdgeType::Contradicts => "contradicts",
            EdgeType::Supports => "supports",
            EdgeType::RelatesTo => "relates_to",
            EdgeType::UserLinked => "user_linked",
            EdgeType::Supersedes => "supersedes",
            EdgeType::SimilarTo => "similar_to",
        }
    }

    /// Fixed SSA edge-type weight. `similar_to` is not fixed —
    /// it carries the cosine score as the edge's own `weight` field instead.
    pub fn base_weight(self) -> f32 {
        match self {
            EdgeType::SameEntity => 0.95,
            EdgeType::ParentChild => 0.80,
            EdgeType::Contradicts => 0.75,
            EdgeType::Supports => 0.75,
            EdgeType::RelatesTo => 0.50,
            EdgeType::UserLinked => 0.85,
            EdgeType::Supersedes => 0.60,
            EdgeType::SimilarTo => 1.0, // overridden by edge.weight (cosine)
        }
    }
}

/// A directed, typed connection between two node ids (Edge).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub weight: f32,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, edge_type: EdgeType, weight: f32) -> Self {
        Edge {
            id: EdgeId::new(),
            from,
            to,
            edge_type,
            weight: weight.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// No self-edges (Edge invariant). "At most one edge of a
    /// given type between an ordered pair" is a store-level invariant,
    /// enforced by `StorePort::commit` / edge upsert, not checked here.
    pub fn validate(&self) -> Result<(), String> {
        if self.from == self.to {
            return Err("self-edges are not allowed".to_string());
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(format!("weight {} out of range [0.0, 1.0]", self.weight));
        }
        Ok(())
    }

    /// Effective SSA spread weight: fixed per-type weight, except
    /// `similar_to` which carries its own cosine-derived weight.
    pub fn spread_weight(&self) -> f32 {
        match self.edge_type {
            EdgeType::SimilarTo => self.weight,
            other => other.base_weight(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Extraction,
    Manual,
    Import,
}

/// Provenance of a staged (pre-commit) node (Staging record).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    pub source_type: SourceType,
    pub input_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A suggested edge from a staged node, realized into a real `Edge` on
/// commit (Stage 6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedEdge {
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub weight: f32,
}

/// A transient node proposed by ingestion before commit (Staging
/// record). Disappears on commit or rejection; never persisted itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagingRecord {
    pub id: crate::ids::StagingId,
    pub kind: NodeKind,
    pub subtype: Option<String>,
    pub title: String,
    pub body: String,
    pub content_category: ContentCategory,
    pub provenance: Provenance,
    pub confidence: f32,
    pub suggested_edges: Vec<SuggestedEdge>,
    pub tags: Vec<String>,
}

impl StagingRecord {
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.body.trim().chars().count() >= 3
    }
}

/// Per-user prior used to tilt classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserBehaviorModel {
    pub typical_save_rate: f32,
    pub prompt_response_rate: f32,
    pub dismissed_prompts: u32,
    pub always_save: Vec<String>,
    pub never_save: Vec<String>,
    pub session: SessionBehavior,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionBehavior {
    pub prompts_shown: u32,
    pub messages_since_prompt: u32,
}

impl Default for UserBehaviorModel {
    fn default() -> Self {
        Self {
            typical_save_rate: 0.5,
            prompt_response_rate: 0.5,
            dismissed_prompts: 0,
            always_save: Vec::new(),
            never_save: Vec::new(),
            session: SessionBehavior::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_title_uses_first_line() {
        let t = Node::derive_title("Hello world\nrest of body");
        assert_eq!(t, "Hello world");
    }

    #[test]
    fn derive_title_truncates_single_line_to_100() {
        let body = "x".repeat(200);
        let t = Node::derive_title(&body);
        assert_eq!(t.chars().count(), 100);
    }

    #[test]
    fn node_validate_rejects_short_body() {
        let n = Node::new(NodeKind::Note, None, "hi".to_string(), ContentCategory::General);
        assert!(n.validate().is_err());
    }

    #[test]
    fn edge_rejects_self_edges() {
        let id = NodeId::new();
        let e = Edge::new(id, id, EdgeType::RelatesTo, 0.5);
        assert!(e.validate().is_err());
    }

    #[test]
    fn lifecycle_archive_dormant_is_bidirectional() {
        assert!(LifecycleState::Archive.can_transition_to(LifecycleState::Dormant));
        assert!(LifecycleState::Dormant.can_transition_to(LifecycleState::Archive));
        assert!(!LifecycleState::Active.can_transition_to(LifecycleState::Archive));
    }
}
