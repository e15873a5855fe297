//! Job queue trait definition.

use async_trait::async_trait;
use search_index_shared::DeferredOperation;
use serde_json::{Map, Value};

use crate::errors::SearchIndexError;

/// Accepts deferred write requests for later delivery.
///
/// The payload is the transferable form of a `Request` (see
/// `Request::to_transferable`). Enqueue is fire-and-forget: a successful return
/// only means the queue accepted the payload.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        operation: DeferredOperation,
        payload: Map<String, Value>,
    ) -> Result<(), SearchIndexError>;
}
