use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoriaError>;

/// Crate-wide error type. Each failure domain gets its own variant so a
/// caller at a port boundary can match on it and apply the 
/// propagation policy directly (bubble, degrade-open, log-and-swallow)
/// instead of re-deriving it from a generic error string.
#[derive(Debug, Error)]
pub enum MemoriaError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("node not found: {0}")]
    NodeNotFound(crate::ids::NodeId),

    #[error("edge not found: {0}")]
    EdgeNotFound(crate::ids::EdgeId),

    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed envelope or unsupported source (InputError).
    /// Fails the request outright.
    #[error("input error: {0}")]
    Input(String),

    /// An internal exception inside the gate (GateDegraded).
    /// Callers degrade open to PASS/uncertain rather than propagate.
    #[error("gate degraded: {0}")]
    GateDegraded(String),

    /// Classifier failure (ClassificationDegraded); caller falls
    /// back to the LLM-default classification.
    #[error("classification degraded: {0}")]
    ClassificationDegraded(String),

    /// All embedding providers exhausted after retry. Commit proceeds
    /// without an embedding; the node is flagged for re-embed.
    #[error("embedding provider exhausted: {0}")]
    ProviderExhausted(String),

    /// An SSA filter failed to compile (FilterError). Rejected
    /// before any I/O, with structured validation output.
    #[error("invalid filter: {0}")]
    FilterInvalid(String),

    /// A cooperative cancel fired between stages/hops.
    #[error("operation cancelled")]
    Cancelled,
}
