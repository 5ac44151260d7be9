//! Library error type.
//!
//! Upstream failures (embedding provider, vector index, message source) are
//! surfaced as a single typed error per call, never retried here. The caller
//! owns any retry/backoff policy. Malformed input records are the exception:
//! they are skipped and logged inside a batch rather than failing it.

use thiserror::Error;

/// All failure modes surfaced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedding provider could not be reached or rejected the call.
    /// Aborts the current ingestion/search call; nothing is partially written.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The vector index could not be reached or rejected the call.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The remote message source (posts API) could not be reached.
    #[error("message source unavailable: {0}")]
    SourceUnavailable(String),

    /// `delete` was called with neither an id list nor a selector.
    #[error("delete requires an explicit id list or a selector")]
    InvalidDeleteSelector,

    /// A single input record is missing required fields. Callers skip the
    /// record with a warning; this never fails a whole batch.
    #[error("malformed message record: {0}")]
    MalformedMessage(String),

    /// Invalid or incomplete configuration detected at startup.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
