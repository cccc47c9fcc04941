/// Error taxonomy for coinwatch
///
/// Three layers, matching the subsystems: upstream fetch classification,
/// durable store failures, and the caller-facing tracker results. Nothing in
/// here is fatal to the process; every variant is recoverable by serving
/// cached data or surfacing a typed result.
use thiserror::Error;

/// Classification of an upstream fetch attempt
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Upstream signalled rate limiting (HTTP 429)
    #[error("rate limit exceeded")]
    RateLimited,

    /// Timeout, connection failure, 5xx or other transport-level trouble
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Schema mismatch or missing required numeric fields; never cached
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Upstream answered but the identifier matches no listed token
    #[error("token not listed upstream")]
    NotListed,
}

/// Failures of the durable token store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write rejected by the no-clobber guards (negative price, stale timestamp)
    #[error("rejected write for {token_id}: {reason}")]
    RejectedWrite { token_id: String, reason: String },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Caller-facing result classification from the tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Never cached and upstream reports the identifier unknown
    #[error("token not found")]
    NotFound,

    /// Never cached and upstream currently unreachable or rate limited
    #[error("data temporarily unavailable, retry in {retry_after_secs}s")]
    Unavailable { retry_after_secs: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
