//! Request dispatcher trait definition.

use async_trait::async_trait;
use search_index_shared::{DeferredOperation, Request};

use crate::errors::SearchIndexError;

/// Performs a write against the search service on behalf of a drain.
///
/// A drain pops deferred requests off a queue and hands each one, together with
/// the operation it was queued under, to a dispatcher. `SearchClient` is the
/// production implementation.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    /// Perform `operation` for `request`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the write was delivered, or skipped because the request has no body
    /// * `Err(SearchIndexError)` - If the write failed; the drain stops at this record
    async fn dispatch(
        &self,
        operation: DeferredOperation,
        request: Request,
    ) -> Result<(), SearchIndexError>;
}
