//! Deferred request queue.
//!
//! Producers call [`DeferredQueue::enqueue_request`] (or go through the
//! `JobQueue` trait) to push a request onto its operation's queue and make sure
//! a drain job is scheduled. Workers call [`DeferredQueue::perform`] to replay
//! every queued request through a dispatcher.
//!
//! # Stale locks
//!
//! The lock that keeps one job per operation can outlive its job when a
//! scheduler or worker crashes at the wrong moment, after which nothing would
//! ever be scheduled for that operation again. Each enqueue clears such locks
//! when no registered worker is running a job from the job queue and the job
//! the lock guards is not pending.
//!
//! This check reads worker state and then deletes the lock in separate steps.
//! A worker that starts in between is not seen, so the cleanup is a
//! best-effort mitigation and not a guarantee. A failed cleanup is logged and
//! the enqueue goes on to schedule.
//!
//! # Concurrent drains
//!
//! Reserving a job releases its lock, so a request enqueued during a drain
//! schedules a follow-up job. With more than one worker process that job can
//! be reserved while the first drain is still running, and the two workers
//! then drain the same operation at once. Updates to one document may be
//! applied out of order in that window.

use std::sync::Arc;

use async_trait::async_trait;
use search_index_repository::{JobQueue, RequestDispatcher, SearchIndexError};
use search_index_shared::{DeferredOperation, Request};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::DeferError;
use crate::store::{lock_prefix, JobStore, ScheduledJob};

/// Default job queue drain jobs are scheduled on.
pub const DEFAULT_JOB_QUEUE: &str = "search";

/// Default prefix of the per-operation request queue keys.
pub const DEFAULT_KEY_PREFIX: &str = "search_index";

/// Configuration for the deferred queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredQueueConfig {
    /// The job queue workers reserve drain jobs from.
    pub job_queue: String,
    /// Request queues live at `<key_prefix>:<operation>`.
    pub key_prefix: String,
}

impl Default for DeferredQueueConfig {
    fn default() -> Self {
        Self {
            job_queue: DEFAULT_JOB_QUEUE.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Queue of deferred requests backed by a [`JobStore`].
pub struct DeferredQueue {
    store: Arc<dyn JobStore>,
    config: DeferredQueueConfig,
}

impl DeferredQueue {
    /// Create a queue with the default configuration.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_config(store, DeferredQueueConfig::default())
    }

    /// Create a queue with custom configuration.
    pub fn with_config(store: Arc<dyn JobStore>, config: DeferredQueueConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &DeferredQueueConfig {
        &self.config
    }

    /// The key of the request queue for `operation`.
    pub fn request_key(&self, operation: DeferredOperation) -> String {
        format!("{}:{}", self.config.key_prefix, operation)
    }

    /// The drain job for `operation`.
    pub fn job(&self, operation: DeferredOperation) -> ScheduledJob {
        ScheduledJob::new(self.config.job_queue.clone(), operation)
    }

    /// Number of requests waiting for `operation`.
    pub async fn pending(&self, operation: DeferredOperation) -> Result<usize, DeferError> {
        self.store.queue_length(&self.request_key(operation)).await
    }

    /// Queue a request payload and make sure a drain job is scheduled.
    ///
    /// Stale locks are cleared between the push and the scheduling, so a lost
    /// job cannot keep the request from ever being drained.
    ///
    /// # Arguments
    ///
    /// * `operation` - The operation to perform when the request is drained
    /// * `payload` - The transferable form of the request
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If this call scheduled a new drain job
    /// * `Ok(false)` - If a job for `operation` was already outstanding
    /// * `Err(DeferError)` - If the store failed
    #[instrument(skip(self, payload))]
    pub async fn enqueue_request(
        &self,
        operation: DeferredOperation,
        payload: &Map<String, Value>,
    ) -> Result<bool, DeferError> {
        let encoded = serde_json::to_string(payload)?;
        self.store
            .push_request(&self.request_key(operation), &encoded)
            .await?;

        if let Err(e) = self.clear_stale_locks().await {
            warn!(error = %e, "Stale lock cleanup failed");
        }

        let scheduled = self.store.schedule_unique(&self.job(operation)).await?;
        debug!(scheduled, "Request queued");
        Ok(scheduled)
    }

    /// Delete locks on this job queue that no outstanding job stands behind.
    ///
    /// Nothing is cleared while any registered worker is running a job from
    /// the job queue. Otherwise each lock whose job is not pending is deleted.
    /// The worker check and the deletes are not atomic; see the module docs.
    ///
    /// # Returns
    ///
    /// The number of locks deleted.
    pub async fn clear_stale_locks(&self) -> Result<usize, DeferError> {
        let queue = &self.config.job_queue;
        let prefix = lock_prefix(queue);

        let lock_keys = self.store.lock_keys(&prefix).await?;
        if lock_keys.is_empty() {
            return Ok(0);
        }

        let workers = self.store.workers().await?;
        if workers.iter().any(|worker| worker.is_working_on(queue)) {
            return Ok(0);
        }

        let mut cleared = 0;
        for lock_key in lock_keys {
            let Some(operation) = lock_key
                .strip_prefix(&prefix)
                .and_then(|name| name.parse::<DeferredOperation>().ok())
            else {
                continue;
            };

            if self.store.job_pending(&self.job(operation)).await? {
                continue;
            }

            if self.store.delete_lock(&lock_key).await? {
                warn!(lock_key = %lock_key, "Cleared stale job lock");
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Drain the request queue for `operation`.
    ///
    /// Pops requests oldest first and hands each one to `dispatcher` until the
    /// queue is empty. Requests pushed while the drain runs are picked up if
    /// they arrive before the queue is seen empty.
    ///
    /// The first failure stops the drain: the requests behind it stay queued
    /// for the next job, while the failed request itself has already been
    /// popped and is only logged.
    ///
    /// # Returns
    ///
    /// * `Ok(count)` - The number of requests dispatched
    /// * `Err(DeferError)` - If a payload could not be decoded, the dispatcher failed, or the store failed
    #[instrument(skip(self, dispatcher))]
    pub async fn perform(
        &self,
        operation: DeferredOperation,
        dispatcher: &dyn RequestDispatcher,
    ) -> Result<usize, DeferError> {
        let key = self.request_key(operation);
        let mut drained = 0;

        while let Some(encoded) = self.store.pop_request(&key).await? {
            let request = decode(&encoded).map_err(|e| {
                error!(error = %e, payload = %encoded, "Dropping undecodable request");
                e
            })?;
            let path = request.path().to_string();

            if let Err(e) = dispatcher.dispatch(operation, request).await {
                error!(
                    path = %path,
                    drained,
                    error = %e,
                    "Dispatch failed, aborting drain"
                );
                return Err(e.into());
            }
            drained += 1;
        }

        info!(drained, "Drained request queue");
        Ok(drained)
    }
}

fn decode(encoded: &str) -> Result<Request, DeferError> {
    let map: Map<String, Value> = serde_json::from_str(encoded)?;
    Ok(Request::from_transferable(&map)?)
}

#[async_trait]
impl JobQueue for DeferredQueue {
    async fn enqueue(
        &self,
        operation: DeferredOperation,
        payload: Map<String, Value>,
    ) -> Result<(), SearchIndexError> {
        self.enqueue_request(operation, &payload).await?;
        Ok(())
    }
}
