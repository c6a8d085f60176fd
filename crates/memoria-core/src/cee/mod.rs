//! Contextual Embedding Ecosystem : context-prefixed vector
//! embeddings with Matryoshka truncation, provider fallback, and
//! automatic similarity-edge maintenance.

pub mod cost;
pub mod embedding;
pub mod hash;
pub mod hybrid;
pub mod local_provider;
pub mod matryoshka;
pub mod prefix;
pub mod query;
pub mod similarity;

pub use cost::{estimate, monthly_estimate, CostEstimate};
pub use embedding::{EmbedOutcome, FallbackEmbedder, Provider, ProviderFailure, ProviderHealth};
pub use hash::stable_hash;
pub use local_provider::FastEmbedProvider;
pub use hybrid::{fuse, min_max_normalize, FusionWeights};
pub use prefix::{generate_context_prefix, ClusterInfo, PrefixInput, SourceEpisode};
pub use query::{analyze, bm25_tokenize, combine_vectors, union_terms, QueryAnalysis, QueryCombination};
pub use matryoshka::{truncate as truncate_embedding, DEFAULT_DIMENSION, DIMENSIONS};
pub use similarity::{cosine_similarity, maintain_on_commit, prune_stale, MaintenanceResult};
