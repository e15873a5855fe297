//! PostgreSQL implementation of the job store.
//!
//! Lets producers and workers in different processes share one queue.
//!
//! ## Database Tables
//!
//! - `deferred_requests`: serialized requests, ordered by `id` within a `queue_key`
//! - `deferred_locks`: one row per outstanding job
//! - `deferred_jobs`: scheduled jobs waiting for a worker
//! - `deferred_workers`: registered workers and the job each one is running
//!
//! Pops use `FOR UPDATE SKIP LOCKED` so concurrent workers never receive the
//! same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_index_shared::DeferredOperation;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::info;

use super::{JobStore, ScheduledJob, WorkerState};
use crate::errors::DeferError;

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL-backed job store.
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Create a store on an existing pool whose schema is already migrated.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and run the bundled migrations.
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresJobStore)` - Ready-to-use store
    /// * `Err(DeferError)` - If the connection or a migration fails
    pub async fn connect(database_url: &str) -> Result<Self, DeferError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        sqlx::migrate!("src/store/migrations").run(&pool).await?;

        info!("Connected to PostgreSQL job store");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn parse_operation(value: &str) -> Result<DeferredOperation, DeferError> {
        value
            .parse()
            .map_err(|e: search_index_shared::UnknownOperation| DeferError::store(e.to_string()))
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn push_request(&self, key: &str, payload: &str) -> Result<(), DeferError> {
        sqlx::query("INSERT INTO deferred_requests (queue_key, payload) VALUES ($1, $2)")
            .bind(key)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pop_request(&self, key: &str) -> Result<Option<String>, DeferError> {
        let row = sqlx::query(
            "DELETE FROM deferred_requests WHERE id = (
                SELECT id FROM deferred_requests
                WHERE queue_key = $1
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            ) RETURNING payload",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.try_get::<String, _>("payload"))
            .transpose()
            .map_err(DeferError::from)
    }

    async fn queue_length(&self, key: &str) -> Result<usize, DeferError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM deferred_requests WHERE queue_key = $1")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn lock_keys(&self, prefix: &str) -> Result<Vec<String>, DeferError> {
        let rows = sqlx::query(
            "SELECT lock_key FROM deferred_locks WHERE starts_with(lock_key, $1) ORDER BY lock_key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("lock_key").map_err(DeferError::from))
            .collect()
    }

    async fn delete_lock(&self, key: &str) -> Result<bool, DeferError> {
        let result = sqlx::query("DELETE FROM deferred_locks WHERE lock_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn schedule_unique(&self, job: &ScheduledJob) -> Result<bool, DeferError> {
        let lock_key = job.lock_key();
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query(
            "INSERT INTO deferred_locks (lock_key) VALUES ($1) ON CONFLICT (lock_key) DO NOTHING",
        )
        .bind(&lock_key)
        .execute(&mut *tx)
        .await?;

        if locked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO deferred_jobs (queue, operation, lock_key) VALUES ($1, $2, $3)")
            .bind(&job.queue)
            .bind(job.operation.as_str())
            .bind(&lock_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn job_pending(&self, job: &ScheduledJob) -> Result<bool, DeferError> {
        let row = sqlx::query(
            "SELECT EXISTS (
                SELECT 1 FROM deferred_jobs WHERE queue = $1 AND operation = $2
            ) AS pending",
        )
        .bind(&job.queue)
        .bind(job.operation.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("pending")?)
    }

    async fn reserve_job(&self, queue: &str) -> Result<Option<ScheduledJob>, DeferError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "DELETE FROM deferred_jobs WHERE id = (
                SELECT id FROM deferred_jobs
                WHERE queue = $1
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            ) RETURNING operation, lock_key",
        )
        .bind(queue)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let operation: String = row.try_get("operation")?;
        let lock_key: String = row.try_get("lock_key")?;

        sqlx::query("DELETE FROM deferred_locks WHERE lock_key = $1")
            .bind(&lock_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(ScheduledJob::new(
            queue,
            Self::parse_operation(&operation)?,
        )))
    }

    async fn register_worker(&self, worker: &WorkerState) -> Result<(), DeferError> {
        let (current_queue, current_operation) = match &worker.current_job {
            Some(job) => (Some(job.queue.clone()), Some(job.operation.as_str())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO deferred_workers (id, queues, current_queue, current_operation, started_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                queues = EXCLUDED.queues,
                current_queue = EXCLUDED.current_queue,
                current_operation = EXCLUDED.current_operation,
                started_at = EXCLUDED.started_at",
        )
        .bind(&worker.id)
        .bind(&worker.queues)
        .bind(current_queue)
        .bind(current_operation)
        .bind(worker.started_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_current_job(
        &self,
        worker_id: &str,
        job: Option<&ScheduledJob>,
    ) -> Result<(), DeferError> {
        let result = sqlx::query(
            "UPDATE deferred_workers SET current_queue = $2, current_operation = $3 WHERE id = $1",
        )
        .bind(worker_id)
        .bind(job.map(|job| job.queue.as_str()))
        .bind(job.map(|job| job.operation.as_str()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeferError::store(format!("Unknown worker {}", worker_id)));
        }
        Ok(())
    }

    async fn unregister_worker(&self, worker_id: &str) -> Result<(), DeferError> {
        sqlx::query("DELETE FROM deferred_workers WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn workers(&self) -> Result<Vec<WorkerState>, DeferError> {
        let rows = sqlx::query(
            "SELECT id, queues, current_queue, current_operation, started_at
             FROM deferred_workers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut workers = Vec::with_capacity(rows.len());
        for row in rows {
            let current_queue: Option<String> = row.try_get("current_queue")?;
            let current_operation: Option<String> = row.try_get("current_operation")?;
            let current_job = match (current_queue, current_operation) {
                (Some(queue), Some(operation)) => {
                    Some(ScheduledJob::new(queue, Self::parse_operation(&operation)?))
                }
                _ => None,
            };
            let started_at: DateTime<Utc> = row.try_get("started_at")?;

            workers.push(WorkerState {
                id: row.try_get("id")?,
                queues: row.try_get("queues")?,
                current_job,
                started_at,
            });
        }
        Ok(workers)
    }
}
