// Cache proxy controller: serves one client connection per call.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::db::Storage;
use crate::http::{parse_get_target, parse_target, ParseError};
use crate::upstream::{with_deadline, DeadlineError, Origin, UpstreamError};
use crate::workers::Handler;

/// Bytes read from the client, and per origin read.
pub const BUFFER_SIZE: usize = 1024;

// Error types
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("client read failed: {0}")]
    ClientRead(DeadlineError),
    #[error("client closed without sending a request")]
    EmptyRequest,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("origin write failed: {0}")]
    OriginWrite(DeadlineError),
    #[error("origin read failed: {0}")]
    OriginRead(DeadlineError),
    #[error("client write failed: {0}")]
    ClientWrite(io::Error),
    #[error("failed to buffer {size} bytes of origin response")]
    Alloc { size: usize },
}

/// How a connection was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Answered from cache.
    Hit { bytes: usize },
    /// Fetched from the origin and relayed.
    Fetched { bytes: usize, cached: bool },
}

/// Stream the proxy talks to a client over.
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientStream for T {}

/// Handles proxy requests with read-through caching.
pub struct CacheProxyController {
    cache: Arc<Storage>,
    origin: Arc<dyn Origin>,
    ttl: Duration,
    client_timeout: Option<Duration>,
    upstream_timeout: Option<Duration>,
}

impl CacheProxyController {
    /// Creates a new cache proxy controller.
    pub fn new(cache: Arc<Storage>, origin: Arc<dyn Origin>, ttl: Duration) -> Self {
        Self {
            cache,
            origin,
            ttl,
            client_timeout: None,
            upstream_timeout: None,
        }
    }

    /// Bounds the initial client read.
    pub fn with_client_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Bounds every origin write and read.
    pub fn with_upstream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Runs one request/response cycle. The client is closed when this returns,
    /// whatever the result; so is the origin connection, if one was opened.
    pub async fn serve<S: ClientStream>(&self, mut client: S) -> Result<Outcome, ProxyError> {
        let mut buf = [0u8; BUFFER_SIZE];
        let n = with_deadline(self.client_timeout, "client read", client.read(&mut buf))
            .await
            .map_err(ProxyError::ClientRead)?;
        if n == 0 {
            return Err(ProxyError::EmptyRequest);
        }
        debug!(component = "proxy", event = "request_read", bytes = n, "received request from client");

        let target = parse_get_target(&buf[..n])?;
        info!(component = "proxy", event = "get_received", url = target, "GET request received");

        if let Some(entry) = self.cache.find(target) {
            client
                .write_all(&entry.payload)
                .await
                .map_err(ProxyError::ClientWrite)?;
            let _ = client.shutdown().await;
            info!(
                component = "proxy",
                event = "cache_hit_sent",
                url = target,
                bytes = entry.size(),
                "sent cached data to client"
            );
            return Ok(Outcome::Hit { bytes: entry.size() });
        }

        let origin_target = parse_target(target)?;
        let addr = self.origin.resolve(&origin_target.host).await?;
        info!(
            component = "proxy",
            event = "connecting",
            host = %origin_target.host,
            addr = %addr,
            "connecting to origin"
        );
        let mut upstream = self.origin.connect(addr).await?;

        with_deadline(
            self.upstream_timeout,
            "origin write",
            upstream.write_all(origin_target.request().as_bytes()),
        )
        .await
        .map_err(ProxyError::OriginWrite)?;

        let mut response = Vec::new();
        let mut relaying = true;
        let mut chunk = [0u8; BUFFER_SIZE];
        loop {
            let n = with_deadline(self.upstream_timeout, "origin read", upstream.read(&mut chunk))
                .await
                .map_err(ProxyError::OriginRead)?;
            if n == 0 {
                break;
            }
            response.try_reserve(n).map_err(|_| ProxyError::Alloc {
                size: response.len() + n,
            })?;
            response.extend_from_slice(&chunk[..n]);

            // A client that went away does not spoil the response for the cache.
            if relaying {
                if let Err(err) = client.write_all(&chunk[..n]).await {
                    warn!(
                        component = "proxy",
                        event = "relay_failed",
                        url = target,
                        error = %err,
                        "client write failed, draining origin for cache only"
                    );
                    relaying = false;
                }
            }
        }
        let _ = client.shutdown().await;

        let bytes = response.len();
        info!(
            component = "proxy",
            event = "origin_done",
            url = target,
            bytes,
            "received response from origin"
        );

        let cached = if bytes == 0 {
            false
        } else {
            match self.cache.add(target, &response, self.ttl) {
                Ok(()) => true,
                Err(err) => {
                    error!(
                        component = "proxy",
                        event = "cache_add_failed",
                        url = target,
                        error = %err,
                        "failed to cache response"
                    );
                    false
                }
            }
        };

        Ok(Outcome::Fetched { bytes, cached })
    }
}

#[async_trait::async_trait]
impl<S: ClientStream + 'static> Handler<S> for CacheProxyController {
    async fn handle(&self, conn: S) {
        match self.serve(conn).await {
            Ok(outcome) => {
                debug!(component = "proxy", event = "served", outcome = ?outcome, "closing connections");
            }
            Err(ProxyError::EmptyRequest) => {
                debug!(component = "proxy", event = "empty_request", "client sent nothing, closing");
            }
            Err(ProxyError::Parse(err)) => {
                info!(component = "proxy", event = "rejected", error = %err, "request rejected, closing connection");
            }
            Err(err @ ProxyError::Upstream(_)) => {
                error!(component = "proxy", event = "upstream_failed", error = %err, "origin unreachable, closing connection");
            }
            Err(err) => {
                warn!(component = "proxy", event = "aborted", error = %err, "connection aborted");
            }
        }
    }
}
