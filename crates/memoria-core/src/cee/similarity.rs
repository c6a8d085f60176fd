//! Similarity edge maintenance. Grounded on the reference
//! crate's `linker/rules.rs::SimilarityLinkRule` (threshold-gated proposed
//! edge emission) generalized from one threshold to a three-tier
//! scheme, and on `linker/dedup.rs`'s pairwise scan-a-bounded-window
//! pattern rather than scanning the whole index.

use crate::cee::matryoshka;
use crate::ids::EdgeId;
use crate::ports::StorePort;
use crate::types::{Edge, EdgeType, Node};

pub const CREATE_THRESHOLD: f32 = 0.90;
pub const DEDUP_SIGNAL_THRESHOLD: f32 = 0.95;
pub const STALE_THRESHOLD: f32 = 0.80;
/// SSA seeding uses a separate, lower floor.
pub const SEEDING_FLOOR: f32 = 0.60;

/// Sum-checked cosine similarity: a zero-norm vector yields 0 rather than
/// dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let dot: f32 = a[..n].iter().zip(&b[..n]).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a[..n].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b[..n].iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceResult {
    pub created: Vec<Edge>,
    pub dedup_flagged: Vec<crate::ids::NodeId>,
}

/// After a commit of node `n`, compare its 512-truncated vector against
/// at most the most recent 100 embedded nodes.
pub fn maintain_on_commit(store: &dyn StorePort, node: &Node) -> crate::error::Result<MaintenanceResult> {
    let mut result = MaintenanceResult {
        created: Vec::new(),
        dedup_flagged: Vec::new(),
    };

    let Some(embedding) = &node.embedding else {
        return Ok(result);
    };
    let query = matryoshka::truncate(&embedding.vector, matryoshka::DEFAULT_DIMENSION);

    let recent = store.recent_embedded_nodes(100)?;
    for other in recent.iter().filter(|o| o.id != node.id) {
        let Some(other_emb) = &other.embedding else { continue };
        let other_vec = matryoshka::truncate(&other_emb.vector, matryoshka::DEFAULT_DIMENSION);
        let score = cosine_similarity(&query, &other_vec);

        if score >= CREATE_THRESHOLD {
            let edge = Edge::new(node.id, other.id, EdgeType::SimilarTo, score);
            store.upsert_edge(&edge)?;
            result.created.push(edge);
        }
        if score >= DEDUP_SIGNAL_THRESHOLD {
            result.dedup_flagged.push(other.id);
        }
    }

    Ok(result)
}

/// Periodic maintenance: remove any `similar_to` edge whose *current*
/// similarity has dropped below the stale threshold.
pub fn prune_stale(store: &dyn StorePort, node: &Node) -> crate::error::Result<Vec<EdgeId>> {
    let mut removed = Vec::new();
    let Some(embedding) = &node.embedding else {
        return Ok(removed);
    };
    let query = matryoshka::truncate(&embedding.vector, matryoshka::DEFAULT_DIMENSION);

    for neighbor in store.get_neighbors(node.id)? {
        if neighbor.edge.edge_type != EdgeType::SimilarTo {
            continue;
        }
        let Some(other_emb) = &neighbor.node.embedding else { continue };
        let other_vec = matryoshka::truncate(&other_emb.vector, matryoshka::DEFAULT_DIMENSION);
        let score = cosine_similarity(&query, &other_vec);
        if score < STALE_THRESHOLD {
            store.remove_edge(neighbor.edge.id)?;
            removed.push(neighbor.edge.id);
        }
    }
    Ok(removed)
}
