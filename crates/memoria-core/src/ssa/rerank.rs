//! SSA Step 4 Reranking. Grounded on the reference crate's
//! `vector::scoring::apply_score_decay` — one pure function per
//! component score, each unit-tested standalone, then combined by a
//! weighted sum per section profile.

use crate::ports::{GraphMetrics, RerankFields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNode {
    pub id: crate::ids::NodeId,
    pub semantic_score: f32,
    pub bm25_score: f32,
    pub graph_score: f32,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub inbound_edge_count: u64,
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Components {
    pub semantic: f32,
    pub keyword: f32,
    pub graph: f32,
    pub recency: f32,
    pub authority: f32,
    pub affinity: f32,
}

impl Components {
    /// The raw, unweighted value of a single signal — what `explain`
    /// renders as a percent, as opposed to its weighted contribution
    /// to the total score.
    pub fn raw(&self, signal: Signal) -> f32 {
        match signal {
            Signal::Semantic => self.semantic,
            Signal::Keyword => self.keyword,
            Signal::Graph => self.graph,
            Signal::Recency => self.recency,
            Signal::Authority => self.authority,
            Signal::Affinity => self.affinity,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    pub semantic: f32,
    pub keyword: f32,
    pub graph: f32,
    pub recency: f32,
    pub authority: f32,
    pub affinity: f32,
}

pub const LESSON_PROFILE: Weights = Weights {
    semantic: 0.25,
    keyword: 0.35,
    graph: 0.25,
    recency: 0.05,
    authority: 0.05,
    affinity: 0.05,
};

pub const SIGNAL_PROFILE: Weights = Weights {
    semantic: 0.15,
    keyword: 0.15,
    graph: 0.15,
    recency: 0.45,
    authority: 0.05,
    affinity: 0.05,
};

pub const EPISODE_PROFILE: Weights = Weights {
    semantic: 0.10,
    keyword: 0.10,
    graph: 0.25,
    recency: 0.40,
    authority: 0.05,
    affinity: 0.10,
};

pub const KNOWLEDGE_PROFILE: Weights = Weights {
    semantic: 0.30,
    keyword: 0.15,
    graph: 0.15,
    recency: 0.10,
    authority: 0.25,
    affinity: 0.05,
};

/// Per-section weight profiles ("roughly"; exact split is an
/// open question this implementation fixes and documents), kept as a
/// `Config` field rather than the bare consts above so a deployment can
/// retune a section without recompiling. Weight order within each
/// profile mirrors `Components`: semantic, keyword, graph, recency,
/// authority, affinity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightProfiles {
    pub lesson: Weights,
    pub signal: Weights,
    pub episode: Weights,
    pub knowledge: Weights,
}

impl Default for WeightProfiles {
    fn default() -> Self {
        Self {
            lesson: LESSON_PROFILE,
            signal: SIGNAL_PROFILE,
            episode: EPISODE_PROFILE,
            knowledge: KNOWLEDGE_PROFILE,
        }
    }
}

/// Select a weight profile by `subtype` prefix (Step 4).
pub fn profile_for_subtype(subtype: Option<&str>, profiles: &WeightProfiles) -> Weights {
    match subtype {
        Some(s) if s.starts_with("custom:lesson") => profiles.lesson,
        Some(s) if s.starts_with("custom:signal") => profiles.signal,
        Some(s) if s.starts_with("custom:episode") => profiles.episode,
        _ => profiles.knowledge,
    }
}

/// Recency half-life in hours by content category, overridable per
/// deployment rather than fixed in code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyHalfLives {
    pub identity: f32,
    pub document: f32,
    pub academic: f32,
    pub work: f32,
    pub conversation: f32,
    pub temporal: f32,
    pub general: f32,
}

impl Default for RecencyHalfLives {
    fn default() -> Self {
        Self {
            identity: 48.0,
            document: 48.0,
            academic: 24.0,
            work: 24.0,
            conversation: 6.0,
            temporal: 12.0,
            general: 24.0,
        }
    }
}

impl RecencyHalfLives {
    pub fn for_category(&self, category: crate::types::ContentCategory) -> f32 {
        use crate::types::ContentCategory::*;
        match category {
            Identity => self.identity,
            Document => self.document,
            Academic => self.academic,
            Work => self.work,
            Conversation => self.conversation,
            Temporal => self.temporal,
            General => self.general,
        }
    }
}

/// Every tunable of the Step 4 reranker: which weight profile applies to
/// which subtype, and how fast recency decays per content category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RerankConfig {
    pub profiles: WeightProfiles,
    pub half_lives: RecencyHalfLives,
}

pub fn recency_score(last_accessed: DateTime<Utc>, now: DateTime<Utc>, half_life_hours: f32) -> f32 {
    let elapsed_hours = (now - last_accessed).num_seconds().max(0) as f32 / 3600.0;
    if half_life_hours <= 0.0 {
        return 0.0;
    }
    0.5f32.powf(elapsed_hours / half_life_hours)
}

pub fn authority_score(inbound_edge_count: u64, avg_degree: f32) -> f32 {
    if avg_degree <= 0.0 {
        return 0.0;
    }
    (inbound_edge_count as f32 / avg_degree).clamp(0.0, 1.0)
}

pub fn affinity_score(access_count: u64, max_access_count_observed: u64) -> f32 {
    let denom = ((max_access_count_observed + 1) as f32).ln();
    if denom <= 0.0 {
        return 0.0;
    }
    ((access_count + 1) as f32).ln() / denom
}

pub fn compute_components(
    node: &ScoredNode,
    now: DateTime<Utc>,
    category: crate::types::ContentCategory,
    graph_metrics: GraphMetrics,
    max_access_count_observed: u64,
    half_lives: &RecencyHalfLives,
) -> Components {
    Components {
        semantic: node.semantic_score,
        keyword: node.bm25_score,
        graph: node.graph_score,
        recency: recency_score(node.last_accessed, now, half_lives.for_category(category)),
        authority: authority_score(node.inbound_edge_count, graph_metrics.avg_degree),
        affinity: affinity_score(node.access_count, max_access_count_observed),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Semantic,
    Keyword,
    Graph,
    Recency,
    Authority,
    Affinity,
}

#[derive(Debug, Clone, Copy)]
pub struct RerankScore {
    pub score: f32,
    pub primary_signal: Signal,
    pub components: [(Signal, f32); 6],
}

/// Weighted-sum combination with primary-signal selection (
/// Step 4 `score = Σ weight_i · component_i`, `primary_signal =
/// argmax(weight_i · component_i)`).
pub fn combine(components: Components, weights: Weights) -> RerankScore {
    let contributions = [
        (Signal::Semantic, weights.semantic * components.semantic),
        (Signal::Keyword, weights.keyword * components.keyword),
        (Signal::Graph, weights.graph * components.graph),
        (Signal::Recency, weights.recency * components.recency),
        (Signal::Authority, weights.authority * components.authority),
        (Signal::Affinity, weights.affinity * components.affinity),
    ];
    let score = contributions.iter().map(|(_, v)| v).sum();
    let primary_signal = contributions
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(s, _)| *s)
        .unwrap_or(Signal::Semantic);
    RerankScore { score, primary_signal, components: contributions }
}

/// Human-readable explanation template, one per primary signal.
/// `component_value` is the raw signal in `[0,1]` (e.g. cosine
/// similarity), not its weighted contribution to the total score.
pub fn explain(signal: Signal, component_value: f32) -> String {
    let percent = (component_value * 100.0).round() as i32;
    match signal {
        Signal::Semantic => format!("Strong semantic match ({percent}% similarity)"),
        Signal::Keyword => format!("Strong keyword match ({percent}% relevance)"),
        Signal::Graph => format!("Strongly connected in the activation graph ({percent}%)"),
        Signal::Recency => format!("Recently accessed ({percent}% recency)"),
        Signal::Authority => format!("Highly referenced by other memories ({percent}% authority)"),
        Signal::Affinity => format!("Frequently accessed by you ({percent}% affinity)"),
    }
}

pub fn rerank_fields_to_scored(
    fields: &RerankFields,
    semantic_score: f32,
    bm25_score: f32,
    graph_score: f32,
) -> ScoredNode {
    ScoredNode {
        id: fields.id,
        semantic_score,
        bm25_score,
        graph_score,
        last_accessed: fields.last_accessed,
        created_at: fields.created_at,
        access_count: fields.access_count,
        inbound_edge_count: fields.inbound_edge_count,
        subtype: fields.subtype.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn recency_halves_at_half_life() {
        let now = Utc::now();
        let then = now - Duration::hours(24);
        let score = recency_score(then, now, 24.0);
        assert!((score - 0.5).abs() < 0.01);
    }

    #[test]
    fn authority_clamps_to_one() {
        assert_eq!(authority_score(100, 2.0), 1.0);
    }

    #[test]
    fn affinity_increases_with_access_count() {
        let low = affinity_score(1, 100);
        let high = affinity_score(50, 100);
        assert!(high > low);
    }

    #[test]
    fn lesson_subtype_selects_keyword_dominant_profile() {
        let w = profile_for_subtype(Some("custom:lesson:week3"), &WeightProfiles::default());
        assert!(w.keyword > w.recency);
    }

    #[test]
    fn signal_subtype_selects_recency_dominant_profile() {
        let w = profile_for_subtype(Some("custom:signal:market"), &WeightProfiles::default());
        assert!(w.recency > w.semantic);
    }

    #[test]
    fn default_profile_favors_authority_and_semantic() {
        let w = profile_for_subtype(Some("fact"), &WeightProfiles::default());
        assert!(w.authority >= w.recency);
        assert!(w.semantic >= w.keyword);
    }

    #[test]
    fn half_lives_are_overridable_per_category() {
        let mut half_lives = RecencyHalfLives::default();
        half_lives.conversation = 1.0;
        assert_eq!(half_lives.for_category(crate::types::ContentCategory::Conversation), 1.0);
        assert_eq!(
            half_lives.for_category(crate::types::ContentCategory::General),
            RecencyHalfLives::default().general
        );
    }

    #[test]
    fn primary_signal_is_the_largest_weighted_contribution() {
        let components = Components { semantic: 0.9, keyword: 0.1, graph: 0.1, recency: 0.1, authority: 0.1, affinity: 0.1 };
        let result = combine(components, KNOWLEDGE_PROFILE);
        assert_eq!(result.primary_signal, Signal::Semantic);
    }

    #[test]
    fn explanation_renders_raw_component_not_weighted_share() {
        // Perfect similarity under the knowledge profile (semantic weight 0.30)
        // should still read "100% similarity", not the weighted contribution.
        let components = Components { semantic: 1.0, keyword: 0.0, graph: 0.0, recency: 0.0, authority: 0.0, affinity: 0.0 };
        let result = combine(components, KNOWLEDGE_PROFILE);
        assert_eq!(result.primary_signal, Signal::Semantic);
        let text = explain(result.primary_signal, components.raw(result.primary_signal));
        assert!(text.contains("100%"), "expected raw 100%, got: {text}");
    }
}
