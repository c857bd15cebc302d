// TCP origin: DNS through the runtime resolver, plain TCP connections.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use super::upstream::{with_deadline, DeadlineError, Origin, OriginStream, UpstreamError, ORIGIN_PORT};

/// Reaches origins over TCP on a fixed port.
#[derive(Debug, Clone)]
pub struct TcpOrigin {
    port: u16,
    connect_timeout: Option<Duration>,
}

impl TcpOrigin {
    pub fn new(port: u16, connect_timeout: Option<Duration>) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for TcpOrigin {
    fn default() -> Self {
        Self::new(ORIGIN_PORT, None)
    }
}

#[async_trait::async_trait]
impl Origin for TcpOrigin {
    async fn resolve(&self, host: &str) -> Result<SocketAddr, UpstreamError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, self.port))
            .await
            .map_err(|source| UpstreamError::Resolve {
                host: host.to_owned(),
                source,
            })?
            .collect();

        // Prefer IPv4, fall back to whatever came first.
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| UpstreamError::NotFound {
                host: host.to_owned(),
            })?;

        debug!(component = "upstream", event = "resolved", host, addr = %addr, "host resolved");
        Ok(addr)
    }

    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn OriginStream>, UpstreamError> {
        let stream = with_deadline(self.connect_timeout, "connect", TcpStream::connect(addr))
            .await
            .map_err(|err| match err {
                DeadlineError::Io(source) => UpstreamError::Connect { addr, source },
                DeadlineError::Elapsed(err) => err,
            })?;
        Ok(Box::new(stream))
    }
}
