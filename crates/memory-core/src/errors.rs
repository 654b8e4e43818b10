//! Error taxonomy. `CortexError` is the workspace-wide error surfaced to
//! callers; the narrower per-subsystem enums exist so a crate can construct
//! a precise variant without depending on every other crate, and convert
//! into `CortexError` at the boundary.

use thiserror::Error;

/// Storage-layer errors (vector + graph adapters).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("collection not found for variant {variant}")]
    CollectionNotFound { variant: String },

    #[error("vector has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("point {id} not found")]
    PointNotFound { id: String },

    #[error("connection pool exhausted: {active_connections} active connections")]
    PoolExhausted { active_connections: usize },
}

/// Embedding subsystem errors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("provider request failed: {reason}")]
    ProviderError { reason: String },

    #[error("provider returned {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Sync manager errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vector store write failed: {reason}")]
    VectorWriteFailed { reason: String },

    #[error("graph store write failed, queued for retry: {reason}")]
    GraphWriteQueued { reason: String },

    #[error("retry log entry for {memory_id} exceeded max_retries")]
    RetriesExhausted { memory_id: String },
}

/// Retrieval subsystem errors.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("limit {requested} exceeds configured maximum {max}")]
    LimitExceeded { requested: usize, max: usize },

    #[error("depth {requested} exceeds configured maximum {max}")]
    DepthExceeded { requested: usize, max: usize },

    #[error("search failed: {reason}")]
    SearchFailed { reason: String },
}

/// Normaliser subsystem errors.
#[derive(Debug, Error)]
pub enum NormalizerError {
    #[error("phase {phase} failed: {reason}")]
    PhaseFailed { phase: String, reason: String },
}

/// Parser orchestrator errors (rare — most failures are captured per-file in
/// `ParseResult.errors` rather than propagated).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file extension: {extension}")]
    UnsupportedExtension { extension: String },

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("extractor error in {path}: {reason}")]
    ExtractorFailed { path: String, reason: String },
}

/// Workspace-wide error type. Every public operation returns
/// `CortexResult<T>`.
#[derive(Debug, Error)]
pub enum CortexError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("conflict with existing memory {existing_id} (similarity {similarity:.3})")]
    Conflict { existing_id: String, similarity: f64 },

    #[error("embedding retries exhausted: {0}")]
    EmbeddingExhausted(#[from] EmbeddingError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("normalizer error: {0}")]
    Normalizer(#[from] NormalizerError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violated: {message}")]
    Internal { message: String },
}

/// Workspace-wide result alias.
pub type CortexResult<T> = Result<T, CortexError>;
