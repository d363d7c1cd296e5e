//! Error types shared across the retrieval pipeline.
//!
//! The taxonomy mirrors how failures surface to callers:
//!
//! | Variant | Meaning | Caller policy |
//! |---------|---------|---------------|
//! | [`Error::NotFound`] | No indexed data for the request (e.g. context for an unknown path) | Surfaced |
//! | [`Error::Schema`] | Malformed filter or unknown collection/field | Surfaced; a bug |
//! | [`Error::Transient`] | Store or LLM network/timeout failure | Surfaced; caller may retry |
//! | [`Error::Llm`] | LLM answered but the response was unusable | Trigger the deterministic fallback |
//! | [`Error::Config`] | Invalid configuration | Surfaced at startup |
//!
//! Per-record delete failures in the memory compactor and below-threshold
//! reflexion outcomes are *not* errors: they are counted in reports and
//! returned as `quality_met = false` respectively.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of the search core.
#[derive(Error, Debug)]
pub enum Error {
    /// No indexed data matched the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed filter, unknown collection, or unknown field.
    #[error("schema error: {0}")]
    Schema(String),

    /// Store or LLM network/timeout failure. Safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// The LLM call completed but returned an unusable response.
    #[error("llm error: {0}")]
    Llm(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures (connect, timeout, body read) are all
        // retryable from the caller's point of view. HTTP status codes are
        // mapped where the response is inspected, not here.
        Error::Transient(err.to_string())
    }
}
