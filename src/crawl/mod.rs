//! Discovery, the worker pool and the slow retry pass.

pub mod backoff;
pub mod discovery;
pub mod links;
pub mod pool;
pub mod queue;
pub mod slow_retry;
pub mod variants;
pub mod wait;
pub mod worker;

pub use discovery::PaginationDiscoverer;
pub use pool::{PoolOutcome, WorkerPool};
pub use queue::JobQueue;
pub use slow_retry::slow_retry_pass;
pub use variants::enumerate_variants;
