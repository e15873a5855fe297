//! Error types for the deferred write pipeline.

use search_index_repository::SearchIndexError;
use search_index_shared::RequestError;
use thiserror::Error;

/// Errors that can occur while queueing or draining deferred requests.
#[derive(Error, Debug)]
pub enum DeferError {
    /// The job store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A queued payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A queued payload decoded to an invalid request.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// The dispatcher failed to deliver a request.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] SearchIndexError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeferError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<sqlx::Error> for DeferError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DeferError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Config(format!("Failed to run migrations: {}", err))
    }
}

impl From<serde_json::Error> for DeferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<DeferError> for SearchIndexError {
    fn from(err: DeferError) -> Self {
        match err {
            DeferError::Dispatch(inner) => inner,
            other => SearchIndexError::job_queue(other.to_string()),
        }
    }
}
