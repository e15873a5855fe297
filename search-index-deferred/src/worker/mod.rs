//! Worker that runs scheduled drain jobs.
//!
//! The worker registers itself in the job store, then polls its job queue.
//! Each reserved job drains one operation's request queue through the
//! dispatcher. While a job runs the worker's state names it, which is what
//! stale-lock cleanup looks at.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use search_index_repository::RequestDispatcher;
use search_index_shared::DeferredOperation;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::DeferError;
use crate::queue::DeferredQueue;
use crate::store::WorkerState;

/// Default delay between polls of the job queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to wait between polls when the job queue is empty.
    pub poll_interval: Duration,

    /// Operations drained once at startup, before any job is reserved.
    ///
    /// Picks up requests whose job was lost while no worker was running.
    pub operations: Vec<DeferredOperation>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            operations: DeferredOperation::ALL.to_vec(),
        }
    }
}

/// Worker that reserves drain jobs and runs them.
pub struct Worker {
    id: String,
    queue: Arc<DeferredQueue>,
    dispatcher: Arc<dyn RequestDispatcher>,
    config: WorkerConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Total number of jobs run since startup.
    total_jobs: Arc<AtomicU64>,
    /// Total number of requests dispatched since startup.
    total_requests: Arc<AtomicU64>,
}

impl Worker {
    /// Create a new worker with default configuration.
    pub fn new(queue: Arc<DeferredQueue>, dispatcher: Arc<dyn RequestDispatcher>) -> Self {
        Self::with_config(queue, dispatcher, WorkerConfig::default())
    }

    /// Create a new worker with custom configuration.
    pub fn with_config(
        queue: Arc<DeferredQueue>,
        dispatcher: Arc<dyn RequestDispatcher>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            id: format!("worker-{}", Uuid::new_v4()),
            queue,
            dispatcher,
            config,
            shutdown_tx,
            total_jobs: Arc::new(AtomicU64::new(0)),
            total_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A sender that stops [`Worker::run`] when it fires.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of jobs run since startup.
    pub fn total_jobs(&self) -> u64 {
        self.total_jobs.load(Ordering::Relaxed)
    }

    /// Number of requests dispatched since startup.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Register this worker in the job store.
    ///
    /// [`Worker::run`] does this itself; call it before driving the worker
    /// with [`Worker::work_once`] directly.
    pub async fn register(&self) -> Result<(), DeferError> {
        let state = WorkerState::new(
            self.id.clone(),
            vec![self.queue.config().job_queue.clone()],
        );
        self.queue.store().register_worker(&state).await
    }

    /// Reserve one job from the job queue and run it.
    ///
    /// The worker must be registered.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(count))` - If a job ran; `count` requests were dispatched
    /// * `Ok(None)` - If no job was scheduled
    /// * `Err(DeferError)` - If the store failed or the drain aborted
    pub async fn work_once(&self) -> Result<Option<usize>, DeferError> {
        let store = self.queue.store();
        let Some(job) = store.reserve_job(&self.queue.config().job_queue).await? else {
            return Ok(None);
        };

        debug!(operation = %job.operation, "Reserved drain job");

        store.set_current_job(&self.id, Some(&job)).await?;
        let result = self
            .queue
            .perform(job.operation, self.dispatcher.as_ref())
            .await;
        store.set_current_job(&self.id, None).await?;

        self.total_jobs.fetch_add(1, Ordering::Relaxed);
        let drained = result?;
        self.total_requests
            .fetch_add(drained as u64, Ordering::Relaxed);
        Ok(Some(drained))
    }

    /// Run until a shutdown signal is received.
    ///
    /// Drain failures are logged and the worker moves on to the next job.
    /// Store failures during registration are returned.
    #[instrument(skip(self), fields(worker_id = %self.id))]
    pub async fn run(&self) -> Result<(), DeferError> {
        let job_queue = self.queue.config().job_queue.clone();
        info!(job_queue = %job_queue, "Starting deferred request worker");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.register().await?;

        self.recover().await;

        let mut poll_timer = interval(self.config.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut progress_timer = interval(Duration::from_secs(60));
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received ctrl-c");
                    break;
                }
                _ = poll_timer.tick() => {
                    self.work_available().await;
                }
                _ = progress_timer.tick() => {
                    info!(
                        total_jobs = self.total_jobs(),
                        total_requests = self.total_requests(),
                        "Worker progress"
                    );
                }
            }
        }

        if let Err(e) = self.queue.store().unregister_worker(&self.id).await {
            warn!(error = %e, "Failed to unregister worker");
        }

        info!(
            total_jobs = self.total_jobs(),
            total_requests = self.total_requests(),
            "Worker stopped"
        );
        Ok(())
    }

    async fn work_available(&self) {
        loop {
            match self.work_once().await {
                Ok(Some(drained)) => debug!(drained, "Job finished"),
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Job failed");
                    break;
                }
            }
        }
    }

    async fn recover(&self) {
        for operation in &self.config.operations {
            match self
                .queue
                .perform(*operation, self.dispatcher.as_ref())
                .await
            {
                Ok(0) => {}
                Ok(drained) => {
                    self.total_requests
                        .fetch_add(drained as u64, Ordering::Relaxed);
                    info!(operation = %operation, drained, "Recovered queued requests");
                }
                Err(e) => error!(operation = %operation, error = %e, "Recovery drain failed"),
            }
        }
    }
}
