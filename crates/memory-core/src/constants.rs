/// Dense embedding vector width. Every stored vector has exactly this many
/// components, or is absent entirely (never any other length).
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// Maximum texts per embedding provider request.
pub const EMBEDDING_BATCH_SIZE: usize = 128;

/// Maximum retry attempts for a single embedding batch before the call fails.
pub const EMBEDDING_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff on transient embedding failures.
pub const EMBEDDING_BASE_RETRY_SECS: f64 = 1.0;

/// Upper bound on backoff delay, absent an explicit `Retry-After`.
pub const EMBEDDING_MAX_RETRY_SECS: f64 = 30.0;

/// Lower/upper bounds accepted for `duplicate_threshold`.
pub const DUPLICATE_THRESHOLD_MIN: f64 = 0.70;
pub const DUPLICATE_THRESHOLD_MAX: f64 = 0.95;

/// Lower/upper bounds accepted for `conflict_threshold`.
pub const CONFLICT_THRESHOLD_MIN: f64 = 0.90;
pub const CONFLICT_THRESHOLD_MAX: f64 = 1.0;

/// Package version, re-exported for health/diagnostic reporting.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
