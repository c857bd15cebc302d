//! Fixed-size pool of workers draining a [`WorkQueue`].

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::queue::{Dequeued, WorkQueue};
use super::Handler;

/// N long-lived workers. Each one serves a single connection at a time,
/// so at most N connections are in flight.
pub struct WorkerPool<T> {
    queue: Arc<WorkQueue<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `size` workers consuming `queue` with `handler`.
    pub fn start(queue: Arc<WorkQueue<T>>, handler: Arc<dyn Handler<T>>, size: usize) -> Self {
        let workers = (0..size)
            .map(|id| tokio::task::spawn(worker_loop(id, queue.clone(), handler.clone())))
            .collect();

        info!(
            component = "workers",
            event = "started",
            size,
            "all workers started"
        );

        Self { queue, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool: first raise the stop flag and wake every parked worker,
    /// then wait for each worker to leave its loop. The order matters, since a
    /// worker parked on an empty queue only exits after being woken.
    pub async fn stop(self) {
        self.queue.close();
        let dropped = self.queue.len();

        for (id, worker) in self.workers.into_iter().enumerate() {
            if let Err(err) = worker.await {
                error!(
                    component = "workers",
                    event = "join_failed",
                    worker = id,
                    error = %err,
                    "failed to join worker"
                );
            }
        }

        info!(
            component = "workers",
            event = "stopped",
            dropped_pending = dropped,
            "worker pool stopped"
        );
    }
}

async fn worker_loop<T: Send + 'static>(
    id: usize,
    queue: Arc<WorkQueue<T>>,
    handler: Arc<dyn Handler<T>>,
) {
    info!(component = "workers", event = "worker_started", worker = id, "worker started");

    let mut handled: u64 = 0;
    while let Dequeued::Item(conn) = queue.dequeue().await {
        // A panicking handler must not take the worker down with it.
        let handler = handler.clone();
        let result = tokio::task::spawn(async move { handler.handle(conn).await }).await;
        if let Err(err) = result {
            error!(
                component = "workers",
                event = "handler_panicked",
                worker = id,
                error = %err,
                "connection handler panicked"
            );
        }
        handled += 1;
        debug!(component = "workers", event = "handled", worker = id, handled, "handled connection");
    }

    info!(component = "workers", event = "worker_exiting", worker = id, handled, "worker exiting");
}
