//! # Search Index Shared
//!
//! This crate defines the value types shared across the search index client:
//! the [`Request`] handed to the transport or the deferred queue, the [`Query`]
//! builder, the lazily materialized [`Results`], and the [`Mapping`] that turns a
//! domain object into a `Request`.
//!
//! Nothing in here performs I/O.

pub mod errors;
pub mod types;
pub mod utils;

pub use errors::{QueryBuildError, RequestError, UnknownOperation};
pub use types::mapping::{FieldSource, FieldType, Guard, Mappable, Mapping, MappingBuilder};
pub use types::operation::DeferredOperation;
pub use types::request::Request;
pub use types::search_query::{Query, SortDirection};
pub use types::search_result::{ConversionError, Hit, Results, SearchDocument, TypeConversions};
pub use utils::sanitize;
