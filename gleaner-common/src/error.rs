//! Error kinds for each pipeline stage.
//!
//! Stage functions return their own error type so callers can tell a fetch
//! failure from a model failure without inspecting messages. [`GleanerError`]
//! wraps all of them for the pipeline facade and binaries.
use std::time::Duration;

/// Failures while obtaining a rendered page from the remote browser.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("could not open a remote browser session: {0}")]
    Connect(#[source] anyhow::Error),

    #[error("navigation to {url} failed: {source}")]
    Navigate {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("challenge wait failed: {0}")]
    Challenge(#[source] anyhow::Error),

    #[error("challenge did not resolve within {0:?}")]
    ChallengeTimeout(Duration),

    #[error("challenge could not be solved (status: {0})")]
    ChallengeFailed(String),

    #[error("could not read the page source: {0}")]
    PageSource(#[source] anyhow::Error),
}

/// Reserved for malformed input. Every parse outcome, including a document
/// without a body, is currently a valid result.
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("malformed document: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ChunkError {
    #[error("maximum segment length must be greater than zero")]
    InvalidMaxLength,
}

/// Failures from the text-generation model.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("model server unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("model API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("model configuration error: {0}")]
    Config(String),
}

/// Error types used across the Gleaner system.
#[derive(thiserror::Error, Debug)]
pub enum GleanerError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`GleanerError`].
pub type Result<T> = std::result::Result<T, GleanerError>;
