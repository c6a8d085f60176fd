//! Concrete vector index ("the concrete vector index" — an
//! external collaborator, out of the CORE's scope but needed to exercise
//! `StorePort::vector_search`). Grounded on the reference crate's
//! `vector::index::HnswIndex` brute-force fallback path and its
//! `rayon`-parallel batch search; generalized to a flat cosine index so
//! every search is exact rather than approximate, since Matryoshka
//! truncation already bounds dimensionality per node.

use crate::cee::similarity::cosine_similarity;
use crate::ids::NodeId;
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FlatVectorIndex {
    vectors: HashMap<NodeId, Vec<f32>>,
}

impl FlatVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    pub fn remove(&mut self, id: NodeId) {
        self.vectors.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Cosine similarity search, descending, top `limit`. Scored in
    /// parallel across the index with `rayon`, since this runs on the
    /// CPU-bound search path rather than an I/O-bound provider call.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<(NodeId, f32)> {
        let mut scored: Vec<(NodeId, f32)> = self
            .vectors
            .par_iter()
            .map(|(&id, vector)| (id, cosine_similarity(query, vector)))
            .collect();
        scored.par_sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(limit);
        scored
    }
}
