//! Search index error types.
//!
//! This module defines the unified error type for the search client, covering
//! transport failures, remote query errors and the configuration errors raised
//! before anything is sent.

use search_index_shared::RequestError;
use thiserror::Error;

/// Unified errors from search index operations.
///
/// Returned by the `SearchTransport`, `JobQueue` and `RequestDispatcher` traits
/// and by `SearchClient`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchIndexError {
    /// No mapping was registered for the given type.
    #[error("Cannot map object of type {0} to the search index; register a mapping for it")]
    UnknownMapping(String),

    /// A deferred write was requested but no job queue is configured.
    #[error("No job queue configured; set one before deferring {0} requests")]
    NoJobQueue(String),

    /// The search service rejected a query.
    #[error("Query error ({status}): {message}")]
    Query { status: u16, message: String },

    /// The request could not be delivered, or the service answered with a failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failed to serialize an object for the search service.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failed to parse a response from the search service.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input, such as a malformed request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The job queue failed to accept a deferred request.
    #[error("Job queue error: {0}")]
    JobQueue(String),
}

impl SearchIndexError {
    /// Create an unknown mapping error naming the unmapped type.
    pub fn unknown_mapping(type_name: impl Into<String>) -> Self {
        Self::UnknownMapping(type_name.into())
    }

    /// Create a missing job queue error for the given operation.
    pub fn no_job_queue(operation: impl Into<String>) -> Self {
        Self::NoJobQueue(operation.into())
    }

    /// Create a query error carrying the remote status and message.
    pub fn query(status: u16, message: impl Into<String>) -> Self {
        Self::Query {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a job queue error.
    pub fn job_queue(msg: impl Into<String>) -> Self {
        Self::JobQueue(msg.into())
    }

    /// The remote status code, for query errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Query { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<RequestError> for SearchIndexError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Serialization(msg) => Self::Serialization(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mapping_names_type() {
        let err = SearchIndexError::unknown_mapping("Article");
        assert!(err.to_string().contains("Article"));
    }

    #[test]
    fn test_query_error_keeps_status_and_message() {
        let err = SearchIndexError::query(400, "SearchPhaseExecutionException");
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "Query error (400): SearchPhaseExecutionException"
        );
        assert_eq!(SearchIndexError::transport("down").status(), None);
    }

    #[test]
    fn test_from_request_error() {
        let err: SearchIndexError = RequestError::EmptyPath.into();
        assert!(matches!(err, SearchIndexError::Validation(_)));

        let err: SearchIndexError = RequestError::Serialization("bad key".to_string()).into();
        assert_eq!(err, SearchIndexError::Serialization("bad key".to_string()));
    }
}
