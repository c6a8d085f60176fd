//! Dense+BM25 fusion primitive. Grounded on the reference
//! crate's `vector/hybrid.rs::HybridSearch` (min-max normalization before
//! blending two scores) and on the reference pack's weighted
//! multi-signal retrieval scorer — generalized from an ad hoc five-weight
//! blend down to a fixed two-term `{dense: 0.7, bm25: 0.3}` fusion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub dense: f32,
    pub bm25: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { dense: 0.7, bm25: 0.3 }
    }
}

impl FusionWeights {
    /// Validator: the two weights must sum to 1.0.
    pub fn validate(&self) -> Result<(), String> {
        if (self.dense + self.bm25 - 1.0).abs() > 1e-4 {
            return Err(format!(
                "fusion weights must sum to 1.0, got {}",
                self.dense + self.bm25
            ));
        }
        Ok(())
    }
}

/// Min-max normalize a batch of scores into `[0, 1]`. A flat batch (all
/// equal) normalizes to all-zero to avoid a divide-by-zero.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// `fused = dense_weight * dense + bm25_weight * bm25`. Callers normalize
/// each component across the candidate set first.
pub fn fuse(dense: f32, bm25: f32, weights: FusionWeights) -> f32 {
    weights.dense * dense + weights.bm25 * bm25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(FusionWeights::default().validate().is_ok());
    }

    #[test]
    fn invalid_weights_rejected() {
        let w = FusionWeights { dense: 0.9, bm25: 0.3 };
        assert!(w.validate().is_err());
    }

    #[test]
    fn min_max_normalize_basic() {
        let normed = min_max_normalize(&[1.0, 2.0, 3.0]);
        assert_eq!(normed, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn min_max_normalize_flat_batch_is_zero() {
        let normed = min_max_normalize(&[5.0, 5.0, 5.0]);
        assert_eq!(normed, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn fuse_weighted_sum() {
        let f = fuse(1.0, 0.0, FusionWeights::default());
        assert!((f - 0.7).abs() < 1e-6);
    }
}
