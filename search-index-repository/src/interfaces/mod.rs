//! Interface definitions for the search client's collaborators.
//!
//! The transport, the job queue used for deferred writes, and the dispatcher a
//! drain replays requests through are all traits so they can be swapped out
//! and mocked in tests.

mod job_queue;
mod request_dispatcher;
mod search_transport;

pub use job_queue::JobQueue;
pub use request_dispatcher::RequestDispatcher;
pub use search_transport::SearchTransport;
