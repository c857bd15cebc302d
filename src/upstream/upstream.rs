// Package upstream defines the DNS/connect boundary towards origin servers.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Port every origin is contacted on.
pub const ORIGIN_PORT: u16 = 80;

/// Errors raised while reaching an origin.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to resolve host {host}: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("host {host} has no addresses")]
    NotFound { host: String },
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
}

/// Byte stream to an origin.
pub trait OriginStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> OriginStream for T {}

/// Origin defines how hosts are resolved and connected to.
#[async_trait::async_trait]
pub trait Origin: Send + Sync {
    /// Resolves `host` to the address to connect to.
    async fn resolve(&self, host: &str) -> Result<SocketAddr, UpstreamError>;

    /// Opens a connection to a resolved address.
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn OriginStream>, UpstreamError>;
}

/// Runs `fut`, failing with [`UpstreamError::Timeout`] when `deadline` is set and passes first.
pub async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    op: &'static str,
    fut: F,
) -> Result<T, DeadlineError>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| DeadlineError::Elapsed(UpstreamError::Timeout { op, after }))?
            .map_err(DeadlineError::Io),
        None => fut.await.map_err(DeadlineError::Io),
    }
}

/// Failure of an I/O operation run under [`with_deadline`].
#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Elapsed(UpstreamError),
}
