// Work dispatch: a growable queue of accepted connections and the worker pool draining it.

pub mod pool;
pub mod queue;


// Re-export main types
pub use pool::WorkerPool;
pub use queue::{Dequeued, WorkQueue};

/// Errors raised by the work queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to grow work queue to {capacity} slots")]
    Grow { capacity: usize },
}

/// Per-connection logic run by a worker.
#[async_trait::async_trait]
pub trait Handler<T>: Send + Sync {
    /// Serves one connection to completion. Failures are absorbed here.
    async fn handle(&self, conn: T);
}
