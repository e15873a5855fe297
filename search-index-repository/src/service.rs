//! Search client implementation.
//!
//! This module provides the main entry point application code uses to write
//! objects to the search index, run searches and defer writes to a job queue.
//!
//! # Note on deferred writes
//!
//! `defer` does not talk to the search service. It hands the request's
//! transferable form to the configured `JobQueue`; a worker later replays it
//! through `SearchClient` acting as a `RequestDispatcher`.

use std::sync::Arc;

use async_trait::async_trait;
use search_index_shared::{
    sanitize, DeferredOperation, Mappable, Query, Request, Results, SearchDocument,
    TypeConversions,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::SearchClientConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::{JobQueue, RequestDispatcher, SearchTransport};
use crate::mappings::MappingRegistry;
use crate::opensearch::OpenSearchTransport;
use crate::types::{HttpMethod, TransportResponse};
use crate::utils::{query_error, write_failure};

/// The main client for interacting with the search index.
///
/// Holds the transport, the mappings used to turn objects into requests, and
/// an optional job queue for deferred writes.
///
/// # Example
///
/// ```no_run
/// use search_index_repository::{MappingRegistry, SearchClient, SearchClientConfig};
/// use search_index_shared::{Mappable, Mapping};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Article {
///     id: u64,
///     title: String,
/// }
///
/// impl Mappable for Article {
///     fn mapping_id(&self) -> String {
///         self.id.to_string()
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mappings =
///     MappingRegistry::new().with(Mapping::<Article>::builder("articles").field("title").build());
/// let client = SearchClient::connect(SearchClientConfig::default(), mappings)?;
///
/// let article = Article { id: 1, title: "Hello".to_string() };
/// client.index(&article).await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchClient {
    transport: Box<dyn SearchTransport>,
    mappings: MappingRegistry,
    job_queue: Option<Arc<dyn JobQueue>>,
    config: SearchClientConfig,
}

impl SearchClient {
    /// Create a new SearchClient with default configuration.
    ///
    /// # Arguments
    ///
    /// * `transport` - A boxed implementation of `SearchTransport` (e.g., `OpenSearchTransport`)
    /// * `mappings` - The mappings used by `index`, `delete` and `defer`
    pub fn new(transport: Box<dyn SearchTransport>, mappings: MappingRegistry) -> Self {
        Self::with_config(transport, mappings, SearchClientConfig::default())
    }

    /// Create a new SearchClient with custom configuration.
    pub fn with_config(
        transport: Box<dyn SearchTransport>,
        mappings: MappingRegistry,
        config: SearchClientConfig,
    ) -> Self {
        Self {
            transport,
            mappings,
            job_queue: None,
            config,
        }
    }

    /// Create a SearchClient that talks to `config.url` over OpenSearch.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchClient)` - A client with no job queue configured
    /// * `Err(SearchIndexError::Transport)` - If the URL is invalid
    pub fn connect(
        config: SearchClientConfig,
        mappings: MappingRegistry,
    ) -> Result<Self, SearchIndexError> {
        let transport = OpenSearchTransport::new(&config.url)?;
        Ok(Self::with_config(Box::new(transport), mappings, config))
    }

    /// Set the job queue used by `defer`.
    pub fn set_job_queue(&mut self, job_queue: Arc<dyn JobQueue>) {
        self.job_queue = Some(job_queue);
    }

    /// Builder-style [`SearchClient::set_job_queue`].
    pub fn with_job_queue(mut self, job_queue: Arc<dyn JobQueue>) -> Self {
        self.set_job_queue(job_queue);
        self
    }

    pub fn config(&self) -> &SearchClientConfig {
        &self.config
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    /// Map `object` and write it to the index.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(response))` - If the document was written
    /// * `Ok(None)` - If the mapping's guard rejected the object; nothing was sent
    /// * `Err(SearchIndexError::UnknownMapping)` - If `T` has no mapping
    /// * `Err(SearchIndexError)` - If the write failed
    pub async fn index<T: Mappable + 'static>(
        &self,
        object: &T,
    ) -> Result<Option<TransportResponse>, SearchIndexError> {
        let request = self.mappings.build_request(object)?;
        self.index_request(&request).await
    }

    /// Write a prepared request to the index with a PUT.
    ///
    /// A request without a body is skipped and `Ok(None)` is returned.
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub async fn index_request(
        &self,
        request: &Request,
    ) -> Result<Option<TransportResponse>, SearchIndexError> {
        let Some(body) = request.body() else {
            debug!("Request has no body, skipping index");
            return Ok(None);
        };

        let body = if self.config.sanitize_documents {
            sanitize(body)
        } else {
            body.clone()
        };

        let response = self
            .send(HttpMethod::Put, request.path(), Some(&Value::Object(body)))
            .await?;

        if !response.is_success() {
            warn!(status = response.status, body = %response.body, "Index request failed");
            return Err(write_failure("PUT", request.path(), &response));
        }

        Ok(Some(response))
    }

    /// Map `object` and delete its document from the index.
    pub async fn delete<T: Mappable + 'static>(
        &self,
        object: &T,
    ) -> Result<TransportResponse, SearchIndexError> {
        let request = self.mappings.build_request(object)?;
        self.delete_request(&request).await
    }

    /// Delete the document at the request's path.
    ///
    /// A missing document (404) is treated as deleted.
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub async fn delete_request(
        &self,
        request: &Request,
    ) -> Result<TransportResponse, SearchIndexError> {
        let response = self.send(HttpMethod::Delete, request.path(), None).await?;

        if !response.is_success() && response.status != 404 {
            warn!(status = response.status, body = %response.body, "Delete request failed");
            return Err(write_failure("DELETE", request.path(), &response));
        }

        Ok(response)
    }

    /// Run `query` against `index_path`.
    ///
    /// Sends `POST <index_path>/_search` with the query body. Hits are converted
    /// lazily by the returned [`Results`] using `conversions`.
    ///
    /// # Arguments
    ///
    /// * `index_path` - The index (or `/<index>/<type>`) to search
    /// * `query` - The query; it is moved into the results
    /// * `conversions` - Callbacks turning hits into domain objects by type
    ///
    /// # Returns
    ///
    /// * `Ok(Results<T>)` - The results
    /// * `Err(SearchIndexError::Query)` - If the service rejected the query, with its status and message
    /// * `Err(SearchIndexError::Parse)` - If a successful response was not valid JSON
    #[instrument(skip(self, query, conversions))]
    pub async fn search<T: SearchDocument>(
        &self,
        index_path: &str,
        query: Query,
        conversions: TypeConversions<T>,
    ) -> Result<Results<T>, SearchIndexError> {
        let path = format!("{}/_search", index_path.trim_end_matches('/'));
        let response = self.send(HttpMethod::Post, &path, Some(query.body())).await?;

        if !response.is_success() {
            let err = query_error(&response);
            warn!(error = %err, "Search failed");
            return Err(err);
        }

        let body = response.json()?;
        Ok(Results::new(query, body, conversions))
    }

    /// Map `object` and queue `operation` for it on the job queue.
    pub async fn defer<T: Mappable + 'static>(
        &self,
        operation: DeferredOperation,
        object: &T,
    ) -> Result<(), SearchIndexError> {
        let request = self.mappings.build_request(object)?;
        self.defer_request(operation, &request).await
    }

    /// Queue `operation` for a prepared request.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the job queue accepted the request
    /// * `Err(SearchIndexError::NoJobQueue)` - If no job queue is configured
    /// * `Err(SearchIndexError)` - If the job queue failed
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub async fn defer_request(
        &self,
        operation: DeferredOperation,
        request: &Request,
    ) -> Result<(), SearchIndexError> {
        let job_queue = self
            .job_queue
            .as_ref()
            .ok_or_else(|| SearchIndexError::no_job_queue(operation.as_str()))?;

        job_queue.enqueue(operation, request.to_transferable()).await
    }

    /// Send a raw request.
    ///
    /// The response is returned whatever its status.
    pub async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, SearchIndexError> {
        self.send(method, path, body).await
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, SearchIndexError> {
        if self.config.debug {
            let body_bytes = body.map(|b| b.to_string().len()).unwrap_or(0);
            debug!(method = %method, path = %path, body_bytes, "Sending search request");
        }
        self.transport.send(method, path, body).await
    }
}

#[async_trait]
impl RequestDispatcher for SearchClient {
    async fn dispatch(
        &self,
        operation: DeferredOperation,
        request: Request,
    ) -> Result<(), SearchIndexError> {
        match operation {
            DeferredOperation::Index => self.index_request(&request).await.map(|_| ()),
            DeferredOperation::Delete => self.delete_request(&request).await.map(|_| ()),
        }
    }
}
