//! Integration tests for the deferred write pipeline.
//!
//! These tests use the real SearchClient, DeferredQueue and Worker on top of
//! the in-memory job store, with a mock transport standing in for the search
//! service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use search_index_deferred::{
    DeferError, DeferredQueue, InMemoryJobStore, JobStore, Worker, WorkerConfig,
};
use search_index_repository::{
    HttpMethod, MappingRegistry, SearchClient, SearchIndexError, SearchTransport,
    TransportResponse,
};
use search_index_shared::{DeferredOperation, Mappable, Mapping};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{sleep, timeout};

type Sent = Arc<Mutex<Vec<(HttpMethod, String)>>>;

// Mock transport recording every call; fails with 500 on one path if asked.
struct MockTransport {
    sent: Sent,
    fail_path: Option<String>,
}

#[async_trait]
impl SearchTransport for MockTransport {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        _body: Option<&Value>,
    ) -> Result<TransportResponse, SearchIndexError> {
        self.sent.lock().unwrap().push((method, path.to_string()));
        if self.fail_path.as_deref() == Some(path) {
            return Ok(TransportResponse::new(500, "internal error"));
        }
        Ok(TransportResponse::new(200, "{}"))
    }
}

#[derive(Serialize)]
struct Article {
    id: u64,
    title: String,
}

impl Mappable for Article {
    fn mapping_id(&self) -> String {
        self.id.to_string()
    }
}

fn article(id: u64) -> Article {
    Article {
        id,
        title: format!("Article {}", id),
    }
}

struct Pipeline {
    store: Arc<InMemoryJobStore>,
    queue: Arc<DeferredQueue>,
    client: Arc<SearchClient>,
    sent: Sent,
}

fn pipeline(fail_path: Option<&str>) -> Pipeline {
    let store = Arc::new(InMemoryJobStore::new());
    let queue = Arc::new(DeferredQueue::new(store.clone()));
    let sent: Sent = Arc::new(Mutex::new(Vec::new()));
    let transport = MockTransport {
        sent: sent.clone(),
        fail_path: fail_path.map(str::to_string),
    };
    let mappings = MappingRegistry::new()
        .with(Mapping::<Article>::builder("articles").field("title").build());
    let client = Arc::new(
        SearchClient::new(Box::new(transport), mappings).with_job_queue(queue.clone()),
    );

    Pipeline {
        store,
        queue,
        client,
        sent,
    }
}

fn worker(pipeline: &Pipeline, config: WorkerConfig) -> Worker {
    Worker::with_config(pipeline.queue.clone(), pipeline.client.clone(), config)
}

#[tokio::test]
async fn test_defer_then_drain_in_order() {
    let p = pipeline(None);

    for id in 1..=3 {
        p.client
            .defer(DeferredOperation::Index, &article(id))
            .await
            .unwrap();
    }
    p.client
        .defer(DeferredOperation::Delete, &article(9))
        .await
        .unwrap();

    // Nothing reaches the search service until a worker runs.
    assert!(p.sent.lock().unwrap().is_empty());
    assert_eq!(p.store.scheduled_jobs("search").await, 2);

    let worker = worker(&p, WorkerConfig::default());
    worker.register().await.unwrap();
    assert_eq!(worker.work_once().await.unwrap(), Some(3));
    assert_eq!(worker.work_once().await.unwrap(), Some(1));
    assert_eq!(worker.work_once().await.unwrap(), None);

    let sent = p.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![
            (HttpMethod::Put, "/articles/Article/1".to_string()),
            (HttpMethod::Put, "/articles/Article/2".to_string()),
            (HttpMethod::Put, "/articles/Article/3".to_string()),
            (HttpMethod::Delete, "/articles/Article/9".to_string()),
        ]
    );
    assert_eq!(worker.total_jobs(), 2);
    assert_eq!(worker.total_requests(), 4);
}

#[tokio::test]
async fn test_concurrent_enqueues_schedule_one_job() {
    let p = pipeline(None);

    let (first, second) = (article(1), article(2));
    let (a, b) = tokio::join!(
        p.client.defer(DeferredOperation::Index, &first),
        p.client.defer(DeferredOperation::Index, &second),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(p.store.scheduled_jobs("search").await, 1);
    assert_eq!(p.queue.pending(DeferredOperation::Index).await.unwrap(), 2);
}

#[tokio::test]
async fn test_enqueue_during_drain_schedules_next_job() {
    let p = pipeline(None);
    p.client
        .defer(DeferredOperation::Index, &article(1))
        .await
        .unwrap();

    // Reserving the job releases its lock, as when a worker picks it up.
    let job = p.store.reserve_job("search").await.unwrap().unwrap();
    assert_eq!(job.operation, DeferredOperation::Index);

    p.client
        .defer(DeferredOperation::Index, &article(2))
        .await
        .unwrap();
    assert_eq!(p.store.scheduled_jobs("search").await, 1);
}

#[tokio::test]
async fn test_drain_failure_keeps_remaining_requests() {
    let p = pipeline(Some("/articles/Article/2"));

    for id in 1..=3 {
        p.client
            .defer(DeferredOperation::Index, &article(id))
            .await
            .unwrap();
    }

    let worker = worker(&p, WorkerConfig::default());
    worker.register().await.unwrap();
    let err = worker.work_once().await.unwrap_err();
    assert!(matches!(err, DeferError::Dispatch(SearchIndexError::Transport(_))));

    // Article 1 was delivered, article 2 failed and is gone, article 3 waits.
    assert_eq!(p.sent.lock().unwrap().len(), 2);
    assert_eq!(p.queue.pending(DeferredOperation::Index).await.unwrap(), 1);

    // The failed job's lock was released, so the next enqueue schedules a drain.
    p.client
        .defer(DeferredOperation::Index, &article(4))
        .await
        .unwrap();
    assert_eq!(worker.work_once().await.unwrap(), Some(2));
    assert_eq!(p.queue.pending(DeferredOperation::Index).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unregistered_worker_cannot_take_jobs() {
    let p = pipeline(None);
    p.client
        .defer(DeferredOperation::Index, &article(1))
        .await
        .unwrap();

    let worker = worker(&p, WorkerConfig::default());
    assert!(matches!(
        worker.work_once().await,
        Err(DeferError::Store(_))
    ));

    worker.register().await.unwrap();
    let workers = p.store.workers().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].id, worker.id());
    assert!(!workers[0].is_working_on("search"));
}

#[tokio::test]
async fn test_run_drains_until_shutdown() {
    let p = pipeline(None);
    for id in 1..=2 {
        p.client
            .defer(DeferredOperation::Index, &article(id))
            .await
            .unwrap();
    }

    let worker = worker(
        &p,
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            operations: vec![],
        },
    );
    let shutdown = worker.shutdown_handle();
    let handle = tokio::spawn(async move { worker.run().await });

    let sent = p.sent.clone();
    timeout(Duration::from_secs(5), async {
        while sent.lock().unwrap().len() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker should drain the queue");

    // Work enqueued while the worker runs is picked up on a later poll.
    p.client
        .defer(DeferredOperation::Delete, &article(1))
        .await
        .unwrap();
    timeout(Duration::from_secs(5), async {
        while sent.lock().unwrap().len() < 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker should pick up new jobs");

    shutdown.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker should stop")
        .unwrap()
        .unwrap();

    assert!(p.store.workers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_recovers_requests_without_a_job() {
    let p = pipeline(None);
    p.store
        .push_request(
            &p.queue.request_key(DeferredOperation::Delete),
            r#"{"path":"/articles/Article/5","body":null}"#,
        )
        .await
        .unwrap();

    let worker = worker(
        &p,
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        },
    );
    let shutdown = worker.shutdown_handle();
    let handle = tokio::spawn(async move { worker.run().await });

    let sent = p.sent.clone();
    timeout(Duration::from_secs(5), async {
        while sent.lock().unwrap().is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker should recover the orphaned request");

    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(
        p.sent.lock().unwrap()[0],
        (HttpMethod::Delete, "/articles/Article/5".to_string())
    );
}
