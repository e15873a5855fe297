//! Dependency initialization and wiring for the deferred request worker.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use search_index_repository::config::{DEFAULT_HOST, DEFAULT_PORT};
use search_index_repository::{HttpMethod, MappingRegistry, SearchClient, SearchClientConfig};
use search_index_shared::DeferredOperation;

use crate::errors::DeferError;
use crate::queue::{DeferredQueue, DeferredQueueConfig, DEFAULT_JOB_QUEUE};
use crate::store::{JobStore, PostgresJobStore};
use crate::worker::{Worker, WorkerConfig, DEFAULT_POLL_INTERVAL};

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if the search service cannot be reached.
    FailFast,
    /// Retry until the search service answers.
    Retry,
}

impl ConnectionMode {
    /// Parse connection mode from environment variable.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    /// Defaults to "retry" if not set or invalid.
    fn from_env() -> Self {
        Self::parse(&env::var("SEARCH_CONNECTION_MODE").unwrap_or_else(|_| "retry".to_string()))
    }

    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid SEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Client used to deliver drained requests.
    ///
    /// Its `defer` pushes onto `queue`.
    pub client: Arc<SearchClient>,
    /// The deferred request queue.
    pub queue: Arc<DeferredQueue>,
    /// The configured worker ready to run.
    pub worker: Worker,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_HOST`: Search service host with scheme (default: http://localhost)
    /// - `SEARCH_PORT`: Search service port (default: 9200)
    /// - `SEARCH_DEBUG`: Log every outgoing request (default: false)
    /// - `SEARCH_SANITIZE_DOCUMENTS`: Escape quotes and slashes in documents (default: false)
    /// - `SEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `SEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `DATABASE_URL`: PostgreSQL URL of the shared job store (required)
    /// - `DEFERRED_JOB_QUEUE`: Job queue drain jobs are scheduled on (default: search)
    /// - `WORKER_POLL_INTERVAL_MS`: Delay between job queue polls (default: 1000)
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(DeferError)` - If `DATABASE_URL` is missing, the job store cannot be
    ///   reached, or the search service is unreachable in fail-fast mode
    pub async fn new() -> Result<Self, DeferError> {
        let host = env::var("SEARCH_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var("SEARCH_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let search_config = SearchClientConfig::from_host_and_port(&host, port)
            .debug(env_flag("SEARCH_DEBUG"))
            .sanitize_documents(env_flag("SEARCH_SANITIZE_DOCUMENTS"));

        let connection_mode = ConnectionMode::from_env();
        let retry_interval = env::var("SEARCH_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| DeferError::config("DATABASE_URL must be set for the job store"))?;
        let job_queue =
            env::var("DEFERRED_JOB_QUEUE").unwrap_or_else(|_| DEFAULT_JOB_QUEUE.to_string());
        let poll_interval = env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        info!(
            search_url = %search_config.url,
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval,
            job_queue = %job_queue,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Initializing dependencies"
        );

        let store: Arc<dyn JobStore> = Arc::new(PostgresJobStore::connect(&database_url).await?);

        let client = Self::connect_to_search(
            search_config,
            connection_mode,
            Duration::from_secs(retry_interval),
        )
        .await?;

        info!("Search service connection established");

        Ok(Self::assemble(
            store,
            client,
            DeferredQueueConfig {
                job_queue,
                ..Default::default()
            },
            WorkerConfig {
                poll_interval,
                operations: DeferredOperation::ALL.to_vec(),
            },
        ))
    }

    /// Wire a store and a client into a queue, a deferring client and a worker.
    pub fn assemble(
        store: Arc<dyn JobStore>,
        client: SearchClient,
        queue_config: DeferredQueueConfig,
        worker_config: WorkerConfig,
    ) -> Self {
        let queue = Arc::new(DeferredQueue::with_config(store, queue_config));
        let client = Arc::new(client.with_job_queue(queue.clone()));
        let worker = Worker::with_config(queue.clone(), client.clone(), worker_config);

        Self {
            client,
            queue,
            worker,
        }
    }

    /// Connect to the search service with retry logic based on connection mode.
    async fn connect_to_search(
        config: SearchClientConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<SearchClient, DeferError> {
        loop {
            match Self::try_connect_search(config.clone()).await {
                Ok(client) => return Ok(client),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(DeferError::config(format!(
                            "Failed to connect to search service: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            search_url = %config.url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to search service, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Build a client and check the service answers.
    ///
    /// Drained requests are replayed by path, so the client needs no mappings.
    async fn try_connect_search(config: SearchClientConfig) -> Result<SearchClient, DeferError> {
        let client = SearchClient::connect(config, MappingRegistry::new())
            .map_err(|e| DeferError::config(e.to_string()))?;

        let response = client
            .execute(HttpMethod::Head, "/", None)
            .await
            .map_err(|e| DeferError::config(e.to_string()))?;
        if !response.is_success() {
            return Err(DeferError::config(format!(
                "Search service answered with status {}",
                response.status
            )));
        }

        Ok(client)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
