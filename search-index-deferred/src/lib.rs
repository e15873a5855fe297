//! # Search Index Deferred
//!
//! Deferred write pipeline for the search index - index and delete requests
//! are queued in a durable store and delivered later by a worker.
//!
//! ## Architecture
//!
//! 1. **Queue**: Producers push serialized requests per operation and schedule one drain job per operation
//! 2. **Store**: Holds request queues, job locks, scheduled jobs and live workers
//! 3. **Worker**: Reserves drain jobs and replays queued requests through a dispatcher
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`queue`]: Enqueue with stale-lock cleanup, and the drain
//! - [`store`]: Job store trait with in-memory and PostgreSQL backends
//! - [`worker`]: The polling worker loop
//! - [`errors`]: Error types for the pipeline

pub mod config;
pub mod errors;
pub mod queue;
pub mod store;
pub mod worker;

pub use config::Dependencies;
pub use errors::DeferError;
pub use queue::{DeferredQueue, DeferredQueueConfig};
pub use store::{InMemoryJobStore, JobStore, PostgresJobStore, ScheduledJob, WorkerState};
pub use worker::{Worker, WorkerConfig};
