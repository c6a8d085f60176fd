//! SSA Step 5 extras : connection map and serendipity
//! candidates. New composition over `ssa::spread`'s activation map and
//! `ssa::filters`'s edge predicate — the reference pack has no direct
//! analog, so this follows the shape of the rest of the SSA pipeline
//! (pure functions over already-fetched data).

use crate::ids::{EdgeId, NodeId};
use crate::ports::{Neighbor, StorePort};
use crate::error::Result;
use crate::ssa::filters::CompiledFilter;
use crate::ssa::spread::Activation;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct ConnectionEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: crate::types::EdgeType,
    pub weight: f32,
}

/// Edges internal to the activated, filter-passing set (Step
/// 5 "optionally compute a connection map").
pub fn connection_map(
    store: &dyn StorePort,
    activations: &[Activation],
    filter: &CompiledFilter,
) -> Result<Vec<ConnectionEdge>> {
    let activated: HashSet<NodeId> = activations.iter().map(|a| a.node_id).collect();
    let mut seen_edges: HashSet<EdgeId> = HashSet::new();
    let mut edges = Vec::new();

    for node_id in &activated {
        let neighbors: Vec<Neighbor> = store.get_neighbors(*node_id)?;
        for neighbor in neighbors {
            if !activated.contains(&neighbor.node.id) {
                continue;
            }
            if !filter.matches_edge_type(neighbor.edge.edge_type) {
                continue;
            }
            if seen_edges.insert(neighbor.edge.id) {
                edges.push(ConnectionEdge {
                    id: neighbor.edge.id,
                    from: neighbor.edge.from,
                    to: neighbor.edge.to,
                    edge_type: neighbor.edge.edge_type,
                    weight: neighbor.edge.weight,
                });
            }
        }
    }

    Ok(edges)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerendipityLevel {
    Off,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy)]
pub struct SerendipityThresholds {
    pub max_similarity: f32,
    pub min_graph: f32,
    pub count: usize,
}

/// Threshold/count tiers (Step 5): `off(0,0,0)`, `low(0.4,0.5,2)`,
/// `medium(0.3,0.5,5)`, `high(0.2,0.5,10)`.
pub fn thresholds_for(level: SerendipityLevel) -> SerendipityThresholds {
    match level {
        SerendipityLevel::Off => SerendipityThresholds { max_similarity: 0.0, min_graph: 0.0, count: 0 },
        SerendipityLevel::Low => SerendipityThresholds { max_similarity: 0.4, min_graph: 0.5, count: 2 },
        SerendipityLevel::Medium => SerendipityThresholds { max_similarity: 0.3, min_graph: 0.5, count: 5 },
        SerendipityLevel::High => SerendipityThresholds { max_similarity: 0.2, min_graph: 0.5, count: 10 },
    }
}

/// Nodes with `vector_score < maxSim` AND `activation >= minGraph`
/// (Step 5 serendipity candidates), trimmed to the tier's count.
pub fn serendipity_candidates(activations: &[Activation], level: SerendipityLevel) -> Vec<NodeId> {
    let thresholds = thresholds_for(level);
    if thresholds.count == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<&Activation> = activations
        .iter()
        .filter(|a| a.vector_score < thresholds.max_similarity && a.activation >= thresholds.min_graph)
        .collect();
    candidates.sort_by(|a, b| b.activation.partial_cmp(&a.activation).unwrap());
    candidates.truncate(thresholds.count);
    candidates.into_iter().map(|a| a.node_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation(node_id: NodeId, vector_score: f32, activation_value: f32) -> Activation {
        Activation {
            node_id,
            activation: activation_value,
            hop_distance: 1,
            path: vec![node_id],
            is_seed: false,
            vector_score,
            bm25_score: 0.0,
        }
    }

    #[test]
    fn off_level_yields_no_candidates() {
        let a = activation(crate::ids::NodeId::new(), 0.0, 1.0);
        assert!(serendipity_candidates(&[a], SerendipityLevel::Off).is_empty());
    }

    #[test]
    fn low_level_excludes_high_similarity_nodes() {
        let a = activation(crate::ids::NodeId::new(), 0.9, 1.0);
        assert!(serendipity_candidates(&[a], SerendipityLevel::Low).is_empty());
    }

    #[test]
    fn low_level_includes_low_similarity_high_activation_nodes() {
        let a = activation(crate::ids::NodeId::new(), 0.1, 0.8);
        assert_eq!(serendipity_candidates(&[a], SerendipityLevel::Low).len(), 1);
    }

    #[test]
    fn results_truncated_to_tier_count() {
        let activations: Vec<Activation> = (0..5).map(|_| activation(crate::ids::NodeId::new(), 0.1, 0.9)).collect();
        assert_eq!(serendipity_candidates(&activations, SerendipityLevel::Low).len(), 2);
    }
}
