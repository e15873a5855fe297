//! Search transport trait definition.
//!
//! This module defines the verb-based interface the search client sends
//! requests through, allowing different HTTP backends to be plugged in.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{HttpMethod, TransportResponse};

/// Abstracts the HTTP connection to the search service.
///
/// Implementations only need [`SearchTransport::send`]; the verb helpers are
/// provided on top of it. A non-2xx status is not an error at this level: it is
/// returned in the `TransportResponse` for the caller to interpret. Errors are
/// reserved for requests that could not be delivered at all.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Send a request with the given verb.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP verb
    /// * `path` - The request path, starting with `/`
    /// * `body` - Optional JSON body
    ///
    /// # Returns
    ///
    /// * `Ok(TransportResponse)` - The status and raw body returned by the service
    /// * `Err(SearchIndexError)` - If the request could not be sent or read
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, SearchIndexError>;

    /// PUT a JSON body to `path`.
    async fn put(&self, path: &str, body: &Value) -> Result<TransportResponse, SearchIndexError> {
        self.send(HttpMethod::Put, path, Some(body)).await
    }

    /// DELETE `path`.
    async fn delete(&self, path: &str) -> Result<TransportResponse, SearchIndexError> {
        self.send(HttpMethod::Delete, path, None).await
    }

    /// POST a JSON body to `path`.
    async fn post(&self, path: &str, body: &Value) -> Result<TransportResponse, SearchIndexError> {
        self.send(HttpMethod::Post, path, Some(body)).await
    }
}
