// Proxy front end: accepts client connections and hands them to the work queue.

use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::workers::WorkQueue;

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Listening socket of the proxy.
pub struct FrontEnd {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl FrontEnd {
    /// Binds the proxy on all interfaces. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind TCP listener on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound address")?;

        info!(
            component = "server",
            event = "listening",
            addr = %local_addr,
            "proxy server listening"
        );

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections into `queue` until `shutdown_token` is cancelled.
    /// Accept errors are skipped; a queue that cannot grow is fatal.
    pub async fn serve(
        &self,
        queue: &WorkQueue<TcpStream>,
        shutdown_token: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(
                            component = "server",
                            event = "accepted",
                            peer = %peer,
                            "accepted connection"
                        );
                        if let Err(err) = queue.enqueue(stream) {
                            error!(
                                component = "server",
                                event = "enqueue_failed",
                                error = %err,
                                "failed to queue connection"
                            );
                            return Err(err).context("work queue exhausted");
                        }
                    }
                    Err(err) => {
                        warn!(
                            component = "server",
                            event = "accept_failed",
                            error = %err,
                            "failed to accept connection"
                        );
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        info!(
            component = "server",
            event = "stopped",
            addr = %self.local_addr,
            "proxy server stopped accepting"
        );
        Ok(())
    }
}
