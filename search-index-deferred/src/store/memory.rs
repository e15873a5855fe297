//! In-process job store.
//!
//! Everything lives behind one mutex, so each call is atomic. Useful for tests
//! and for running producer and worker in the same process.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{JobStore, ScheduledJob, WorkerState};
use crate::errors::DeferError;

#[derive(Debug, Default)]
struct State {
    requests: HashMap<String, VecDeque<String>>,
    locks: BTreeSet<String>,
    jobs: HashMap<String, VecDeque<ScheduledJob>>,
    workers: BTreeMap<String, WorkerState>,
}

/// Job store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lock without scheduling a job, as a scheduler that lost its job would leave it.
    pub async fn insert_lock(&self, key: impl Into<String>) {
        self.state.lock().await.locks.insert(key.into());
    }

    /// Number of scheduled jobs waiting on `queue`.
    pub async fn scheduled_jobs(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .get(queue)
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn push_request(&self, key: &str, payload: &str) -> Result<(), DeferError> {
        self.state
            .lock()
            .await
            .requests
            .entry(key.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn pop_request(&self, key: &str) -> Result<Option<String>, DeferError> {
        Ok(self
            .state
            .lock()
            .await
            .requests
            .get_mut(key)
            .and_then(VecDeque::pop_front))
    }

    async fn queue_length(&self, key: &str) -> Result<usize, DeferError> {
        Ok(self
            .state
            .lock()
            .await
            .requests
            .get(key)
            .map_or(0, VecDeque::len))
    }

    async fn lock_keys(&self, prefix: &str) -> Result<Vec<String>, DeferError> {
        Ok(self
            .state
            .lock()
            .await
            .locks
            .iter()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_lock(&self, key: &str) -> Result<bool, DeferError> {
        Ok(self.state.lock().await.locks.remove(key))
    }

    async fn schedule_unique(&self, job: &ScheduledJob) -> Result<bool, DeferError> {
        let mut state = self.state.lock().await;
        if !state.locks.insert(job.lock_key()) {
            return Ok(false);
        }
        state
            .jobs
            .entry(job.queue.clone())
            .or_default()
            .push_back(job.clone());
        Ok(true)
    }

    async fn job_pending(&self, job: &ScheduledJob) -> Result<bool, DeferError> {
        Ok(self
            .state
            .lock()
            .await
            .jobs
            .get(&job.queue)
            .is_some_and(|jobs| jobs.contains(job)))
    }

    async fn reserve_job(&self, queue: &str) -> Result<Option<ScheduledJob>, DeferError> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(queue).and_then(VecDeque::pop_front);
        if let Some(job) = &job {
            state.locks.remove(&job.lock_key());
        }
        Ok(job)
    }

    async fn register_worker(&self, worker: &WorkerState) -> Result<(), DeferError> {
        self.state
            .lock()
            .await
            .workers
            .insert(worker.id.clone(), worker.clone());
        Ok(())
    }

    async fn set_current_job(
        &self,
        worker_id: &str,
        job: Option<&ScheduledJob>,
    ) -> Result<(), DeferError> {
        let mut state = self.state.lock().await;
        let worker = state
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| DeferError::store(format!("Unknown worker {}", worker_id)))?;
        worker.current_job = job.cloned();
        Ok(())
    }

    async fn unregister_worker(&self, worker_id: &str) -> Result<(), DeferError> {
        self.state.lock().await.workers.remove(worker_id);
        Ok(())
    }

    async fn workers(&self) -> Result<Vec<WorkerState>, DeferError> {
        Ok(self.state.lock().await.workers.values().cloned().collect())
    }
}
