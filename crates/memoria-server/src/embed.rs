//! Bridges the CEE's context-prefix-aware [`FallbackEmbedder`] to the
//! core's plain [`EmbedPort`], used where the core only wants
//! a bare vector back — SSA query-time embedding, which has no node to
//! attach a context prefix to.

use memoria_core::cee::{EmbedOutcome, FallbackEmbedder};
use memoria_core::error::{MemoriaError, Result};
use memoria_core::ports::EmbedPort;
use std::sync::Arc;

pub struct QueryEmbedder(pub Arc<FallbackEmbedder>);

impl EmbedPort for QueryEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            match self.0.embed("", text) {
                EmbedOutcome::Ok(embedding) => out.push(embedding.vector),
                EmbedOutcome::Degraded { error } => return Err(MemoriaError::ProviderExhausted(error)),
            }
        }
        Ok(out)
    }
}
