//! Core of a personal memory server : the Gate Filter,
//! Ingestion Pipeline, Contextual Embedding Ecosystem, and Seeded
//! Spreading Activation retrieval. Everything outside these four
//! subsystems — transport, concrete indexes, persistence, auth, LLM
//! providers — is an external collaborator reached only through
//! [`ports`].

pub mod cee;
pub mod error;
pub mod gate;
pub mod ids;
pub mod ingest;
pub mod ports;
pub mod ssa;
pub mod storage;
pub mod types;

pub use error::{MemoriaError, Result};
pub use gate::{Decision, Gate, GateConfig, GateEnvelope, GateResult, Source as GateSource};
pub use ids::{ChunkId, EdgeId, InputId, NodeId, StagingId};
pub use ingest::{process, IngestResult, PromptState, StageDurations};
pub use ports::{
    BehaviorPort, Bm25Hit, CommitEdge, CommitNode, CommitOutcome, EmbedPort, GraphMetrics,
    LLMPort, Neighbor, NoopLLMPort, PartialClassification, RerankFields, StorePort, VectorHit,
};
pub use ssa::{query, QueryMetrics, QueryRequest, QueryResponse, RankedResult};
pub use storage::{Bm25Index, FlatVectorIndex, RedbStore};
pub use types::*;
