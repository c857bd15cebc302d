// Main proxy application implementation.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::CacheProxyController;
use crate::db::Storage;
use crate::time::{self, Clock, SystemClock};
use crate::upstream::Origin;
use crate::workers::{WorkQueue, WorkerPool};

use super::server::FrontEnd;

/// Encapsulates the entire proxy application state.
pub struct App {
    cfg: Config,
    clock: Arc<dyn Clock>,
    storage: Arc<Storage>,
    queue: Arc<WorkQueue<TcpStream>>,
    controller: Arc<CacheProxyController>,
    server: FrontEnd,
}

impl App {
    /// Creates the cache and the work queue and binds the listening socket.
    pub async fn new(cfg: Config, origin: Arc<dyn Origin>) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = Arc::new(Storage::new(
            cfg.cache_size(),
            cfg.max_key_len(),
            clock.clone(),
        ));
        let queue = Arc::new(WorkQueue::new(cfg.queue_capacity()));
        let controller = Arc::new(
            CacheProxyController::new(storage.clone(), origin, cfg.ttl())
                .with_client_timeout(cfg.client_timeout())
                .with_upstream_timeout(cfg.upstream_timeout()),
        );
        let server = FrontEnd::bind(cfg.port()).await?;

        Ok(Self {
            cfg,
            clock,
            storage,
            queue,
            controller,
            server,
        })
    }

    /// Address the proxy accepts connections on.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    /// Serves until `shutdown_token` is cancelled, then stops the workers.
    pub async fn run(self, shutdown_token: CancellationToken) -> Result<()> {
        let started = self.clock.now();
        let pool = WorkerPool::start(
            self.queue.clone(),
            self.controller.clone(),
            self.cfg.pool_size(),
        );
        let stats = self.spawn_stats_logger(shutdown_token.child_token());

        info!(
            component = "app",
            event = "started",
            addr = %self.local_addr(),
            workers = pool.size(),
            "application lifecycle"
        );

        let served = self.server.serve(&self.queue, shutdown_token.clone()).await;
        if let Err(err) = &served {
            error!(
                component = "app",
                scope = "server",
                event = "serve_failed",
                error = %err,
                "server failed to serve"
            );
            shutdown_token.cancel();
        }

        pool.stop().await;
        if let Some(stats) = stats {
            let _ = stats.await;
        }

        info!(
            component = "app",
            event = "stopped",
            uptime = ?time::since(self.clock.as_ref(), started),
            "application lifecycle"
        );

        served
    }

    fn spawn_stats_logger(&self, token: CancellationToken) -> Option<JoinHandle<()>> {
        let every = self.cfg.stats_interval();
        if every.is_zero() {
            return None;
        }
        let storage = self.storage.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => log_stats(&storage),
                }
            }
        }))
    }
}

fn log_stats(storage: &Storage) {
    let stats = storage.stats();
    info!(
        component = "app",
        event = "cache_stats",
        len = stats.len,
        capacity = storage.capacity(),
        hits = stats.hits,
        misses = stats.misses,
        inserts = stats.inserts,
        evictions = stats.evictions,
        reaped = stats.reaped,
        "cache stats"
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        for (pos, entry) in storage.snapshot().iter().enumerate() {
            debug!(
                component = "app",
                event = "cache_entry",
                pos,
                key = %entry.key,
                size = entry.size,
                expired = entry.expired,
                "cache entry"
            );
        }
    }
}
