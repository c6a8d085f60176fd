//! Matryoshka truncation. The first k dimensions of a
//! Matryoshka-trained embedding form a valid lower-dimensional embedding,
//! so truncation is just `vector.slice(0, d)` — never extend.

pub const DIMENSIONS: &[usize] = &[128, 512, 1536];

/// Default working dimensionality for similarity/comparison.
pub const DEFAULT_DIMENSION: usize = 512;

/// Truncate to the first `d` dimensions. A no-op if `vector` is already
/// `<= d` long (never extends).
pub fn truncate(vector: &[f32], d: usize) -> Vec<f32> {
    if vector.len() <= d {
        vector.to_vec()
    } else {
        vector[..d].to_vec()
    }
}
