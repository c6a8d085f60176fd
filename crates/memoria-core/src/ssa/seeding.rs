//! SSA Step 1-2: query embedding/term extraction and hybrid vector+BM25
//! seeding. Grounded on the reference crate's
//! `vector::hybrid::HybridSearch` candidate-then-filter-then-blend shape.

use crate::cee::{self, FusionWeights};
use crate::error::Result;
use crate::ids::NodeId;
use crate::ports::StorePort;
use crate::ssa::filters::CompiledFilter;
use chrono::Utc;
use std::collections::HashMap;

pub const SEED_THRESHOLD: f32 = 0.60;
pub const MAX_SEEDS: usize = 15;

#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub node_id: NodeId,
    pub combined_score: f32,
    pub vector_score: f32,
    pub bm25_score: f32,
}

/// Per-candidate raw scores from both indexes, kept even below the seed
/// threshold. Spreading activation consults this map for its
/// query-relevance floor ("drop any activated node that is not
/// a seed and has vector_score=0 AND bm25_score=0") — a node reached only
/// through edges, never surfaced by either index, is a hub-only artifact;
/// a node the indexes saw but that missed the seed threshold still counts
/// as relevant.
#[derive(Debug, Clone, Default)]
pub struct CandidateScores(pub HashMap<NodeId, (f32, f32)>);

impl CandidateScores {
    pub fn get(&self, node_id: NodeId) -> (f32, f32) {
        self.0.get(&node_id).copied().unwrap_or((0.0, 0.0))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedingOutcome {
    pub seeds: Vec<Seed>,
    pub candidates: CandidateScores,
}

/// Combine one or more query vectors per `query_combination`, then run
/// hybrid seeding against the store port (Steps 1-2).
pub fn seed(
    store: &dyn StorePort,
    query_vectors: &[Vec<f32>],
    bm25_terms: &[String],
    combination: cee::QueryCombination,
    filter: &CompiledFilter,
    max_seeds: usize,
) -> Result<SeedingOutcome> {
    let combined_vector = cee::combine_vectors(query_vectors, combination);
    let fetch_limit = max_seeds.saturating_mul(3);

    let vector_hits = if combined_vector.is_empty() {
        Vec::new()
    } else {
        store.vector_search(&combined_vector, fetch_limit)?
    };
    let bm25_hits = if bm25_terms.is_empty() {
        Vec::new()
    } else {
        store.bm25_search(bm25_terms, fetch_limit)?
    };

    let bm25_max = bm25_hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
    let bm25_normalized: HashMap<NodeId, f32> = bm25_hits
        .iter()
        .map(|h| {
            let score = if bm25_max > 0.0 { h.score / bm25_max } else { 0.0 };
            (h.node_id, score)
        })
        .collect();

    let mut combined: HashMap<NodeId, (f32, f32)> = HashMap::new();
    for hit in &vector_hits {
        combined.entry(hit.node_id).or_insert((0.0, 0.0)).0 = hit.score;
    }
    for (&node_id, &score) in &bm25_normalized {
        combined.entry(node_id).or_insert((0.0, 0.0)).1 = score;
    }

    let weights = FusionWeights::default();
    let now = Utc::now();
    let mut seeds: Vec<Seed> = Vec::new();
    for (&node_id, &(vector_score, bm25_score)) in &combined {
        let fused = cee::fuse(vector_score, bm25_score, weights);
        if fused < SEED_THRESHOLD {
            continue;
        }
        let Some(node) = store.get_node(node_id)? else {
            continue;
        };
        if !filter.matches_node(&node, now) {
            continue;
        }
        seeds.push(Seed {
            node_id,
            combined_score: fused,
            vector_score,
            bm25_score,
        });
    }

    seeds.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap());
    seeds.truncate(max_seeds);
    Ok(SeedingOutcome { seeds, candidates: CandidateScores(combined) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Bm25Hit, CommitEdge, CommitNode, CommitOutcome, GraphMetrics, Neighbor, RerankFields, VectorHit};
    use crate::ssa::filters::FilterRequest;
    use crate::types::{ContentCategory, Edge, Node, NodeKind};

    struct FakeStore {
        nodes: Vec<Node>,
        vector_hits: Vec<VectorHit>,
        bm25_hits: Vec<Bm25Hit>,
    }

    impl StorePort for FakeStore {
        fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
            Ok(self.nodes.iter().find(|n| n.id == id).cloned())
        }
        fn get_neighbors(&self, _node_id: NodeId) -> Result<Vec<Neighbor>> {
            Ok(Vec::new())
        }
        fn vector_search(&self, _vector: &[f32], _limit: usize) -> Result<Vec<VectorHit>> {
            Ok(self.vector_hits.clone())
        }
        fn bm25_search(&self, _terms: &[String], _limit: usize) -> Result<Vec<Bm25Hit>> {
            Ok(self.bm25_hits.clone())
        }
        fn get_graph_metrics(&self) -> Result<GraphMetrics> {
            Ok(GraphMetrics::default())
        }
        fn get_node_for_reranking(&self, _id: NodeId) -> Result<Option<RerankFields>> {
            Ok(None)
        }
        fn commit(&self, _nodes: &[CommitNode], _edges: &[CommitEdge]) -> Result<CommitOutcome> {
            Ok(CommitOutcome::default())
        }
        fn upsert_edge(&self, _edge: &Edge) -> Result<()> {
            Ok(())
        }
        fn remove_edge(&self, _id: crate::ids::EdgeId) -> Result<()> {
            Ok(())
        }
        fn recent_embedded_nodes(&self, _limit: usize) -> Result<Vec<Node>> {
            Ok(Vec::new())
        }
        fn update_embedding(&self, _node_id: NodeId, _embedding: crate::types::Embedding) -> Result<()> {
            Ok(())
        }
    }

    fn node() -> Node {
        Node::new(NodeKind::Note, None, "some test content".to_string(), ContentCategory::General)
    }

    #[test]
    fn below_threshold_candidates_are_dropped_from_seeds_but_kept_as_candidates() {
        let n = node();
        let store = FakeStore {
            nodes: vec![n.clone()],
            vector_hits: vec![VectorHit { node_id: n.id, score: 0.1 }],
            bm25_hits: Vec::new(),
        };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let outcome = seed(&store, &[vec![1.0, 0.0]], &[], cee::QueryCombination::Average, &filter, MAX_SEEDS).unwrap();
        assert!(outcome.seeds.is_empty());
        assert_eq!(outcome.candidates.get(n.id).0, 0.1);
    }

    #[test]
    fn above_threshold_candidate_survives_and_is_filtered() {
        let n = node();
        let store = FakeStore {
            nodes: vec![n.clone()],
            vector_hits: vec![VectorHit { node_id: n.id, score: 0.95 }],
            bm25_hits: Vec::new(),
        };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let outcome = seed(&store, &[vec![1.0, 0.0]], &[], cee::QueryCombination::Average, &filter, MAX_SEEDS).unwrap();
        assert_eq!(outcome.seeds.len(), 1);
        assert_eq!(outcome.seeds[0].node_id, n.id);
    }

    #[test]
    fn truncates_to_max_seeds() {
        let nodes: Vec<Node> = (0..20).map(|_| node()).collect();
        let hits: Vec<VectorHit> = nodes.iter().map(|n| VectorHit { node_id: n.id, score: 0.99 }).collect();
        let store = FakeStore { nodes, vector_hits: hits, bm25_hits: Vec::new() };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let outcome = seed(&store, &[vec![1.0, 0.0]], &[], cee::QueryCombination::Average, &filter, MAX_SEEDS).unwrap();
        assert_eq!(outcome.seeds.len(), MAX_SEEDS);
    }
}
