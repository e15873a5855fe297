//! OpenSearch transport implementation.
//!
//! Requests go through the client's generic `send`, so any path the search
//! client builds can be reached without going through the typed API surface.

use async_trait::async_trait;
use opensearch::{
    http::{
        headers::HeaderMap,
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        Method,
    },
    OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchTransport;
use crate::types::{HttpMethod, TransportResponse};

/// Search transport backed by a single OpenSearch node.
///
/// # Example
///
/// ```no_run
/// use search_index_repository::{OpenSearchTransport, SearchTransport};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = OpenSearchTransport::new("http://localhost:9200")?;
/// let response = transport.put("/articles/article/1", &json!({"title": "Hello"})).await?;
/// assert!(response.is_success());
/// # Ok(())
/// # }
/// ```
pub struct OpenSearchTransport {
    client: OpenSearch,
    url: Url,
}

impl OpenSearchTransport {
    /// Create a new transport connected to the specified URL.
    ///
    /// No request is made; connection problems surface on the first send.
    ///
    /// # Arguments
    ///
    /// * `url` - The search service URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchTransport)` - A new transport instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the client cannot be built
    pub fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url.clone());
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch transport");

        Ok(Self {
            client,
            url: parsed_url,
        })
    }

    /// The URL this transport sends to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Put => Method::Put,
            HttpMethod::Post => Method::Post,
            HttpMethod::Delete => Method::Delete,
            HttpMethod::Head => Method::Head,
        }
    }
}

#[async_trait]
impl SearchTransport for OpenSearchTransport {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, SearchIndexError> {
        let response = self
            .client
            .send(
                Self::method(method),
                path,
                HeaderMap::new(),
                Option::<&()>::None,
                body.map(|b| JsonBody::new(b.clone())),
                None,
            )
            .await
            .map_err(|e| {
                error!(method = %method, path = %path, error = %e, "Request failed to send");
                SearchIndexError::transport(e.to_string())
            })?;

        let status = response.status_code().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        debug!(method = %method, path = %path, status = status, "Search service responded");

        Ok(TransportResponse::new(status, text))
    }
}
