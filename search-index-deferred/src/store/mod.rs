//! Durable storage for deferred requests and their worker jobs.
//!
//! The store holds four kinds of records:
//!
//! - request queues: FIFO lists of serialized requests, one per key
//! - locks: the uniqueness marks guaranteeing one scheduled job per operation
//! - jobs: scheduled drain jobs waiting for a worker, per job queue
//! - workers: the live workers and the job each one is running
//!
//! Every method is independently atomic; nothing spans more than one call.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_index_shared::DeferredOperation;

use crate::errors::DeferError;

pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

/// Prefix shared by every lock key.
pub const LOCK_PREFIX: &str = "loners";

/// A drain job for one operation on one job queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduledJob {
    /// The job queue workers reserve from.
    pub queue: String,
    /// The operation whose request queue the job drains.
    pub operation: DeferredOperation,
}

impl ScheduledJob {
    pub fn new(queue: impl Into<String>, operation: DeferredOperation) -> Self {
        Self {
            queue: queue.into(),
            operation,
        }
    }

    /// The key of the lock guarding this job, `loners:queue:<queue>:job:<operation>`.
    pub fn lock_key(&self) -> String {
        format!("{}{}", lock_prefix(&self.queue), self.operation)
    }
}

/// The prefix of every lock key guarding a job on `queue`.
pub fn lock_prefix(queue: &str) -> String {
    format!("{}:queue:{}:job:", LOCK_PREFIX, queue)
}

/// A registered worker as seen by other processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerState {
    pub id: String,
    /// Job queues the worker reserves from.
    pub queues: Vec<String>,
    /// The job being run, if any.
    pub current_job: Option<ScheduledJob>,
    pub started_at: DateTime<Utc>,
}

impl WorkerState {
    pub fn new(id: impl Into<String>, queues: Vec<String>) -> Self {
        Self {
            id: id.into(),
            queues,
            current_job: None,
            started_at: Utc::now(),
        }
    }

    /// Whether the worker is running a job from `queue` right now.
    pub fn is_working_on(&self, queue: &str) -> bool {
        self.current_job
            .as_ref()
            .is_some_and(|job| job.queue == queue)
    }
}

/// Abstracts the shared store behind the deferred pipeline.
///
/// Implementations are injected into `DeferredQueue` and `Worker`. Producers
/// and workers in different processes share one store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Append a serialized request to the tail of the queue at `key`.
    async fn push_request(&self, key: &str, payload: &str) -> Result<(), DeferError>;

    /// Remove and return the head of the queue at `key`, or `None` when it is empty.
    async fn pop_request(&self, key: &str) -> Result<Option<String>, DeferError>;

    /// Number of requests waiting in the queue at `key`.
    async fn queue_length(&self, key: &str) -> Result<usize, DeferError>;

    /// All lock keys starting with `prefix`, sorted.
    async fn lock_keys(&self, prefix: &str) -> Result<Vec<String>, DeferError>;

    /// Delete a lock. Returns whether it existed.
    async fn delete_lock(&self, key: &str) -> Result<bool, DeferError>;

    /// Schedule `job` unless its lock is already held.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the lock was taken and the job scheduled
    /// * `Ok(false)` - If a job for the same operation is already outstanding
    async fn schedule_unique(&self, job: &ScheduledJob) -> Result<bool, DeferError>;

    /// Whether `job` is scheduled and waiting for a worker.
    async fn job_pending(&self, job: &ScheduledJob) -> Result<bool, DeferError>;

    /// Take the oldest scheduled job from `queue` and release its lock.
    ///
    /// Once a job is reserved a new one can be scheduled for the same operation,
    /// so requests enqueued during a drain are never left without a job. Two
    /// workers can then drain one operation at the same time.
    async fn reserve_job(&self, queue: &str) -> Result<Option<ScheduledJob>, DeferError>;

    /// Register or re-register a worker.
    async fn register_worker(&self, worker: &WorkerState) -> Result<(), DeferError>;

    /// Record the job a worker is running, or `None` when it goes idle.
    async fn set_current_job(
        &self,
        worker_id: &str,
        job: Option<&ScheduledJob>,
    ) -> Result<(), DeferError>;

    /// Remove a worker.
    async fn unregister_worker(&self, worker_id: &str) -> Result<(), DeferError>;

    /// Every registered worker.
    async fn workers(&self) -> Result<Vec<WorkerState>, DeferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_format() {
        let job = ScheduledJob::new("search", DeferredOperation::Index);
        assert_eq!(job.lock_key(), "loners:queue:search:job:index");
        assert!(job.lock_key().starts_with(&lock_prefix("search")));
    }

    #[test]
    fn test_is_working_on() {
        let mut worker = WorkerState::new("w1", vec!["search".to_string()]);
        assert!(!worker.is_working_on("search"));

        worker.current_job = Some(ScheduledJob::new("search", DeferredOperation::Delete));
        assert!(worker.is_working_on("search"));
        assert!(!worker.is_working_on("mailers"));
    }
}
