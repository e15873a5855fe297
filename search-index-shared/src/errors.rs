//! Error types for the shared value objects.

use thiserror::Error;

/// Errors raised while building or decoding a [`Request`](crate::Request).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A request was built with an empty destination path.
    #[error("Request path cannot be empty")]
    EmptyPath,

    /// A transferable representation had no `path` entry.
    #[error("Transferable request is missing the path key")]
    MissingPath,

    /// The `path` or `body` entry had the wrong JSON type.
    #[error("Invalid transferable request: {0}")]
    InvalidField(String),

    /// The mapped object could not be serialized for field extraction.
    #[error("Failed to serialize mapped object: {0}")]
    Serialization(String),
}

impl RequestError {
    /// Create an invalid field error.
    pub fn invalid_field(msg: impl Into<String>) -> Self {
        Self::InvalidField(msg.into())
    }
}

/// Errors raised by the [`Query`](crate::Query) builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    /// A page number or page size could not be parsed as an integer.
    #[error("Invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// An operation name that no deferred write is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown deferred operation: {0}")]
pub struct UnknownOperation(pub String);
