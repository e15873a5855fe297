//! Integration tests for the PostgreSQL job store.
//!
//! These tests require a real PostgreSQL database and use SQLx test macros
//! to ensure proper test isolation and cleanup.
//!
//! Run with: `cargo test --test postgres_store`

use std::sync::Arc;

use search_index_deferred::{
    DeferredQueue, JobStore, PostgresJobStore, ScheduledJob, WorkerState,
};
use search_index_shared::{DeferredOperation, Request};
use serde_json::json;

fn payload(path: &str) -> serde_json::Map<String, serde_json::Value> {
    Request::new(path, json!({"n": 1}).as_object().cloned())
        .unwrap()
        .to_transferable()
}

#[sqlx::test(migrations = "src/store/migrations")]
async fn test_requests_pop_in_push_order(pool: sqlx::PgPool) {
    let store = PostgresJobStore::new(pool);

    store.push_request("search_index:index", "first").await.unwrap();
    store.push_request("search_index:delete", "other").await.unwrap();
    store.push_request("search_index:index", "second").await.unwrap();

    assert_eq!(store.queue_length("search_index:index").await.unwrap(), 2);
    assert_eq!(
        store.pop_request("search_index:index").await.unwrap(),
        Some("first".to_string())
    );
    assert_eq!(
        store.pop_request("search_index:index").await.unwrap(),
        Some("second".to_string())
    );
    assert_eq!(store.pop_request("search_index:index").await.unwrap(), None);
    assert_eq!(store.queue_length("search_index:delete").await.unwrap(), 1);
}

#[sqlx::test(migrations = "src/store/migrations")]
async fn test_schedule_unique_and_reserve(pool: sqlx::PgPool) {
    let store = PostgresJobStore::new(pool);
    let job = ScheduledJob::new("search", DeferredOperation::Index);

    assert!(store.schedule_unique(&job).await.unwrap());
    assert!(!store.schedule_unique(&job).await.unwrap());
    assert!(store.job_pending(&job).await.unwrap());
    assert_eq!(
        store.lock_keys("loners:queue:search:").await.unwrap(),
        vec!["loners:queue:search:job:index".to_string()]
    );

    assert_eq!(store.reserve_job("search").await.unwrap(), Some(job.clone()));
    assert!(!store.job_pending(&job).await.unwrap());
    assert!(store.lock_keys("loners:").await.unwrap().is_empty());
    assert_eq!(store.reserve_job("search").await.unwrap(), None);
}

#[sqlx::test(migrations = "src/store/migrations")]
async fn test_lock_prefix_is_literal(pool: sqlx::PgPool) {
    let store = PostgresJobStore::new(pool.clone());
    sqlx::query("INSERT INTO deferred_locks (lock_key) VALUES ($1), ($2)")
        .bind("loners:queue:search:job:index")
        .bind("loners:queue:searchXjob:index")
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(
        store.lock_keys("loners:queue:search:").await.unwrap(),
        vec!["loners:queue:search:job:index".to_string()]
    );
    assert!(store.delete_lock("loners:queue:search:job:index").await.unwrap());
    assert!(!store.delete_lock("loners:queue:search:job:index").await.unwrap());
}

#[sqlx::test(migrations = "src/store/migrations")]
async fn test_worker_state_round_trip(pool: sqlx::PgPool) {
    let store = PostgresJobStore::new(pool);
    let worker = WorkerState::new("worker-1", vec!["search".to_string()]);
    store.register_worker(&worker).await.unwrap();

    let job = ScheduledJob::new("search", DeferredOperation::Delete);
    store.set_current_job("worker-1", Some(&job)).await.unwrap();

    let workers = store.workers().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].queues, vec!["search".to_string()]);
    assert_eq!(workers[0].current_job, Some(job));
    assert!(workers[0].is_working_on("search"));

    store.set_current_job("worker-1", None).await.unwrap();
    assert!(!store.workers().await.unwrap()[0].is_working_on("search"));

    store.unregister_worker("worker-1").await.unwrap();
    assert!(store.workers().await.unwrap().is_empty());
    assert!(store.set_current_job("worker-1", None).await.is_err());
}

#[sqlx::test(migrations = "src/store/migrations")]
async fn test_queue_clears_stale_lock(pool: sqlx::PgPool) {
    let store = Arc::new(PostgresJobStore::new(pool.clone()));
    let queue = DeferredQueue::new(store.clone());

    // A lock whose job row was lost.
    sqlx::query("INSERT INTO deferred_locks (lock_key) VALUES ($1)")
        .bind("loners:queue:search:job:index")
        .execute(&pool)
        .await
        .unwrap();

    let scheduled = queue
        .enqueue_request(DeferredOperation::Index, &payload("/a/b/1"))
        .await
        .unwrap();

    assert!(scheduled);
    assert!(store
        .job_pending(&ScheduledJob::new("search", DeferredOperation::Index))
        .await
        .unwrap());
    assert!(!queue
        .enqueue_request(DeferredOperation::Index, &payload("/a/b/2"))
        .await
        .unwrap());
}
