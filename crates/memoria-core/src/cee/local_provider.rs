//! The chain's guaranteed-available "local" tier: `minilm-v6`
//! (384d). Grounded on the reference crate's
//! `vector/embedding.rs::FastEmbedService`, generalized from a standalone
//! `EmbeddingService` into one `Provider` in a `FallbackEmbedder` chain —
//! this tier runs on-box, so it never surfaces a `ProviderFailure` itself,
//! only a `Network` failure if the model genuinely can't produce output.

use crate::cee::embedding::{Provider, ProviderFailure};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

pub const LOCAL_MODEL_NAME: &str = "minilm-v6";
pub const LOCAL_DIMENSIONS: usize = 384;

/// `TextEmbedding` takes `&mut self` per call; the provider chain hands
/// out `&self`, so the model is wrapped in a `Mutex` the way the
/// reference crate's `RwLockVectorIndex` wraps its own interior mutable
/// index for a `Send + Sync` trait object.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedProvider {
    pub fn new() -> Result<Self, fastembed::Error> {
        let init = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
        let model = TextEmbedding::try_new(init)?;
        Ok(Self { model: Mutex::new(model) })
    }
}

impl Provider for FastEmbedProvider {
    fn name(&self) -> &str {
        LOCAL_MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        LOCAL_DIMENSIONS
    }

    fn is_primary(&self) -> bool {
        false
    }

    fn call(&self, text: &str) -> Result<Vec<f32>, ProviderFailure> {
        let mut model = self.model.lock().map_err(|_| ProviderFailure::Network)?;
        let mut vectors = model
            .embed(vec![text.to_string()], None)
            .map_err(|_| ProviderFailure::Network)?;
        vectors.pop().ok_or(ProviderFailure::Network)
    }
}
