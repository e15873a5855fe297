//! # Search Index Repository
//!
//! This crate provides the client used to talk to the search index. It
//! includes the unified error type, the transport, job queue and dispatcher
//! interfaces, a concrete transport for OpenSearch, the mapping registry and
//! the `SearchClient` facade tying them together.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod mappings;
pub mod opensearch;
pub mod service;
pub mod types;
pub mod utils;

pub use config::SearchClientConfig;
pub use errors::SearchIndexError;
pub use interfaces::{JobQueue, RequestDispatcher, SearchTransport};
pub use mappings::MappingRegistry;
pub use opensearch::OpenSearchTransport;
pub use service::SearchClient;
pub use types::{HttpMethod, TransportResponse};
pub use utils::query_error;
