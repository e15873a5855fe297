//! OpenSearch implementation of the search transport.
//!
//! This module provides a concrete implementation of `SearchTransport`
//! using the OpenSearch client as the HTTP backend.

mod transport;

pub use transport::OpenSearchTransport;
