//! SSA Step 3 Spreading activation. Grounded on the
//! reference crate's `graph::traversal` wall-clock budget and
//! `max_nodes`-style circuit breaker, generalized from shortest-path
//! search to activation accumulation with per-hop decay.

use crate::error::Result;
use crate::ids::NodeId;
use crate::ports::StorePort;
use crate::ssa::filters::CompiledFilter;
use crate::ssa::seeding::{CandidateScores, Seed};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    pub initial_activation: f32,
    pub hop_decay: f32,
    pub min_threshold: f32,
    pub max_hops: u8,
    pub max_nodes: usize,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Max,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            initial_activation: 0.5,
            hop_decay: 0.5,
            min_threshold: 0.05,
            max_hops: 3,
            max_nodes: 200,
            aggregation: Aggregation::Sum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    MaxHops,
    MaxNodes,
    NoSpread,
    WallClockBudget,
}

#[derive(Debug, Clone)]
pub struct Activation {
    pub node_id: NodeId,
    pub activation: f32,
    pub hop_distance: u8,
    pub path: Vec<NodeId>,
    pub is_seed: bool,
    pub vector_score: f32,
    pub bm25_score: f32,
}

#[derive(Debug, Clone)]
pub struct SpreadResult {
    pub activations: Vec<Activation>,
    pub termination: TerminationReason,
    pub nodes_visited: usize,
}

/// Run bounded spreading activation from a seed set (Step 3).
/// `store` is queried once per frontier node per hop via `get_neighbors`.
pub fn spread(
    store: &dyn StorePort,
    seeds: &[Seed],
    candidates: &CandidateScores,
    filter: &CompiledFilter,
    config: &SpreadConfig,
) -> Result<SpreadResult> {
    let deadline = Duration::from_millis(config.max_hops as u64 * 100);
    let started = Instant::now();

    let mut activations: HashMap<NodeId, Activation> = HashMap::new();
    let mut frontier: Vec<NodeId> = Vec::new();

    for s in seeds {
        activations.insert(
            s.node_id,
            Activation {
                node_id: s.node_id,
                activation: config.initial_activation * s.combined_score,
                hop_distance: 0,
                path: vec![s.node_id],
                is_seed: true,
                vector_score: s.vector_score,
                bm25_score: s.bm25_score,
            },
        );
        frontier.push(s.node_id);
    }

    let mut nodes_visited = activations.len();
    let mut termination = TerminationReason::MaxHops;

    'hops: for hop in 1..=config.max_hops {
        if started.elapsed() >= deadline {
            log::warn!("spread: wall-clock budget ({deadline:?}) exceeded at hop {hop}, stopping early");
            termination = TerminationReason::WallClockBudget;
            break;
        }

        let mut next_frontier: Vec<NodeId> = Vec::new();

        for &current_id in &frontier {
            let current_activation = activations.get(&current_id).map(|a| a.activation).unwrap_or(0.0);
            if current_activation < config.min_threshold {
                continue;
            }
            let current_path = activations.get(&current_id).map(|a| a.path.clone()).unwrap_or_default();

            let neighbors = store.get_neighbors(current_id)?;
            for neighbor in neighbors {
                if !filter.matches_edge_type(neighbor.edge.edge_type) {
                    continue;
                }
                let target = neighbor.node.id;
                if target == current_id {
                    continue;
                }
                if !filter.matches_node(&neighbor.node, chrono::Utc::now()) {
                    continue;
                }

                let edge_weight = neighbor.edge.spread_weight();
                let spread_amount = current_activation * edge_weight * config.hop_decay;
                if spread_amount < config.min_threshold {
                    continue;
                }

                let mut new_path = current_path.clone();
                new_path.push(target);

                match activations.get_mut(&target) {
                    Some(existing) => {
                        existing.activation = match config.aggregation {
                            Aggregation::Sum => existing.activation + spread_amount,
                            Aggregation::Max => existing.activation.max(spread_amount),
                        };
                        if (new_path.len() as u8) < existing.hop_distance + 1 || new_path.len() < existing.path.len()
                        {
                            existing.hop_distance = hop;
                            existing.path = new_path;
                        }
                    }
                    None => {
                        if nodes_visited >= config.max_nodes {
                            termination = TerminationReason::MaxNodes;
                            break 'hops;
                        }
                        let (vector_score, bm25_score) = candidates.get(target);
                        activations.insert(
                            target,
                            Activation {
                                node_id: target,
                                activation: spread_amount,
                                hop_distance: hop,
                                path: new_path.clone(),
                                is_seed: false,
                                vector_score,
                                bm25_score,
                            },
                        );
                        nodes_visited += 1;
                        next_frontier.push(target);
                    }
                }
            }
        }

        if next_frontier.is_empty() {
            termination = TerminationReason::NoSpread;
            break;
        }
        frontier = next_frontier;
    }

    // Query-relevance floor: drop non-seed nodes with zero
    // vector and BM25 scores.
    let mut surviving: Vec<Activation> = activations
        .into_values()
        .filter(|a| a.is_seed || a.vector_score > 0.0 || a.bm25_score > 0.0)
        .collect();

    // Activation normalization: rescale to the surviving set's max.
    let max_activation = surviving.iter().map(|a| a.activation).fold(0.0f32, f32::max);
    if max_activation > 0.0 {
        for a in &mut surviving {
            a.activation /= max_activation;
        }
    }

    match termination {
        TerminationReason::MaxNodes | TerminationReason::WallClockBudget => {
            log::warn!("spread: terminated with {termination:?} after visiting {nodes_visited} nodes")
        }
        TerminationReason::MaxHops | TerminationReason::NoSpread => {
            log::debug!("spread: terminated with {termination:?} after visiting {nodes_visited} nodes")
        }
    }

    Ok(SpreadResult { activations: surviving, termination, nodes_visited })
}

/// Breadth-first reachability from `from`, honoring the filter's edge
/// whitelist (`relationships`) but not its node predicate — a
/// `connected_to` constraint is structural and applies independently of
/// any other filter the caller also asked for. Used to resolve
/// `connected_to`/`within_hops` into a concrete node set before seeding
/// or spreading (`CompiledFilter::with_reachable`).
pub fn reachable_within(
    store: &dyn StorePort,
    from: NodeId,
    filter: &CompiledFilter,
    max_hops: u8,
) -> Result<std::collections::HashSet<NodeId>> {
    let mut visited = std::collections::HashSet::new();
    visited.insert(from);
    let mut frontier = vec![from];

    for _ in 0..max_hops {
        let mut next_frontier = Vec::new();
        for node_id in &frontier {
            for neighbor in store.get_neighbors(*node_id)? {
                if !filter.matches_edge_type(neighbor.edge.edge_type) {
                    continue;
                }
                if visited.insert(neighbor.node.id) {
                    next_frontier.push(neighbor.node.id);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Bm25Hit, CommitEdge, CommitNode, CommitOutcome, GraphMetrics, Neighbor, RerankFields, VectorHit};
    use crate::ssa::filters::FilterRequest;
    use crate::types::{ContentCategory, Edge, EdgeType, Node, NodeKind};
    use std::collections::HashMap as StdHashMap;

    struct FakeStore {
        neighbors: StdHashMap<NodeId, Vec<Neighbor>>,
    }

    impl StorePort for FakeStore {
        fn get_node(&self, _id: NodeId) -> Result<Option<Node>> {
            Ok(None)
        }
        fn get_neighbors(&self, node_id: NodeId) -> Result<Vec<Neighbor>> {
            Ok(self.neighbors.get(&node_id).cloned().unwrap_or_default())
        }
        fn vector_search(&self, _vector: &[f32], _limit: usize) -> Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }
        fn bm25_search(&self, _terms: &[String], _limit: usize) -> Result<Vec<Bm25Hit>> {
            Ok(Vec::new())
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

    fn node(body: &str) -> Node {
        Node::new(NodeKind::Note, None, body.to_string(), ContentCategory::General)
    }

    #[test]
    fn seed_activation_scales_by_initial_activation() {
        let seed_node = node("seed node body");
        let seeds = vec![Seed { node_id: seed_node.id, combined_score: 0.8, vector_score: 0.8, bm25_score: 0.0 }];
        let store = FakeStore { neighbors: StdHashMap::new() };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let candidates = CandidateScores::default();
        let result = spread(&store, &seeds, &candidates, &filter, &SpreadConfig::default()).unwrap();
        assert_eq!(result.activations.len(), 1);
        assert!(result.activations[0].is_seed);
    }

    #[test]
    fn spreads_to_one_hop_neighbor_through_edge_when_also_a_candidate() {
        let seed_node = node("seed node body");
        let neighbor_node = node("neighbor node body");
        let edge = Edge::new(seed_node.id, neighbor_node.id, EdgeType::RelatesTo, 0.5);
        let mut neighbors = StdHashMap::new();
        neighbors.insert(seed_node.id, vec![Neighbor { node: neighbor_node.clone(), edge }]);
        let store = FakeStore { neighbors };
        let seeds = vec![Seed { node_id: seed_node.id, combined_score: 1.0, vector_score: 1.0, bm25_score: 0.0 }];
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let mut candidates = CandidateScores::default();
        candidates.0.insert(neighbor_node.id, (0.4, 0.0));
        let result = spread(&store, &seeds, &candidates, &filter, &SpreadConfig::default()).unwrap();
        assert!(result.activations.iter().any(|a| a.node_id == neighbor_node.id));
    }

    #[test]
    fn hub_only_neighbor_with_no_index_score_is_dropped_by_relevance_floor() {
        let seed_node = node("seed node body");
        let neighbor_node = node("neighbor node body");
        let edge = Edge::new(seed_node.id, neighbor_node.id, EdgeType::RelatesTo, 0.5);
        let mut neighbors = StdHashMap::new();
        neighbors.insert(seed_node.id, vec![Neighbor { node: neighbor_node.clone(), edge }]);
        let store = FakeStore { neighbors };
        let seeds = vec![Seed { node_id: seed_node.id, combined_score: 1.0, vector_score: 1.0, bm25_score: 0.0 }];
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let candidates = CandidateScores::default();
        let result = spread(&store, &seeds, &candidates, &filter, &SpreadConfig::default()).unwrap();
        assert!(!result.activations.iter().any(|a| a.node_id == neighbor_node.id));
    }

    #[test]
    fn no_neighbors_terminates_with_no_spread() {
        let seed_node = node("lonely seed body");
        let seeds = vec![Seed { node_id: seed_node.id, combined_score: 1.0, vector_score: 1.0, bm25_score: 0.0 }];
        let store = FakeStore { neighbors: StdHashMap::new() };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let candidates = CandidateScores::default();
        let result = spread(&store, &seeds, &candidates, &filter, &SpreadConfig::default()).unwrap();
        assert_eq!(result.termination, TerminationReason::NoSpread);
    }

    #[test]
    fn reachable_within_stops_at_hop_ceiling() {
        let a = node("a");
        let b = node("b");
        let c = node("c");
        let edge_ab = Edge::new(a.id, b.id, EdgeType::RelatesTo, 0.5);
        let edge_bc = Edge::new(b.id, c.id, EdgeType::RelatesTo, 0.5);
        let mut neighbors = StdHashMap::new();
        neighbors.insert(a.id, vec![Neighbor { node: b.clone(), edge: edge_ab }]);
        neighbors.insert(b.id, vec![Neighbor { node: c.clone(), edge: edge_bc }]);
        let store = FakeStore { neighbors };
        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();

        let one_hop = reachable_within(&store, a.id, &filter, 1).unwrap();
        assert!(one_hop.contains(&a.id));
        assert!(one_hop.contains(&b.id));
        assert!(!one_hop.contains(&c.id));

        let two_hop = reachable_within(&store, a.id, &filter, 2).unwrap();
        assert!(two_hop.contains(&c.id));
    }

    #[test]
    fn reachable_within_honors_relationship_whitelist() {
        let a = node("a");
        let b = node("b");
        let edge = Edge::new(a.id, b.id, EdgeType::Contradicts, 0.5);
        let mut neighbors = StdHashMap::new();
        neighbors.insert(a.id, vec![Neighbor { node: b.clone(), edge }]);
        let store = FakeStore { neighbors };
        let filter = CompiledFilter::compile(FilterRequest {
            relationships: vec![EdgeType::RelatesTo],
            ..Default::default()
        })
        .unwrap();

        let reachable = reachable_within(&store, a.id, &filter, 3).unwrap();
        assert!(reachable.contains(&a.id));
        assert!(!reachable.contains(&b.id));
    }

    #[test]
    fn connected_to_restriction_excludes_unreachable_spread_targets() {
        let seed_node = node("seed node body");
        let reachable_neighbor = node("reachable neighbor");
        let unreachable_stranger = node("unreachable stranger");
        let edge = Edge::new(seed_node.id, reachable_neighbor.id, EdgeType::RelatesTo, 0.5);
        let mut neighbors = StdHashMap::new();
        neighbors.insert(seed_node.id, vec![Neighbor { node: reachable_neighbor.clone(), edge }]);
        let store = FakeStore { neighbors };

        let filter = CompiledFilter::compile(FilterRequest::default()).unwrap();
        let reachable_set = reachable_within(&store, seed_node.id, &filter, 1).unwrap();
        let filter = filter.with_reachable(reachable_set);

        let seeds = vec![Seed { node_id: seed_node.id, combined_score: 1.0, vector_score: 1.0, bm25_score: 0.0 }];
        let mut candidates = CandidateScores::default();
        candidates.0.insert(reachable_neighbor.id, (0.4, 0.0));
        candidates.0.insert(unreachable_stranger.id, (0.9, 0.0));

        let result = spread(&store, &seeds, &candidates, &filter, &SpreadConfig::default()).unwrap();
        assert!(result.activations.iter().any(|a| a.node_id == reachable_neighbor.id));
        assert!(!result.activations.iter().any(|a| a.node_id == unreachable_stranger.id));
    }
}
