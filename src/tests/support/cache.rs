// Proxy bootstrap for integration tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::{self, Config, ConfigTrait};
use crate::db::Storage;
use crate::upstream::{Origin, TcpOrigin};

use super::common::{init_test_logger, WAIT};
use super::upstream::UpstreamServer;

/// A running proxy on an ephemeral port.
pub struct ProxyServer {
    addr: SocketAddr,
    storage: Arc<Storage>,
    shutdown_token: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl ProxyServer {
    /// Starts the proxy with `cfg`, reaching origins through `origin`.
    pub async fn start(cfg: Config, origin: Arc<dyn Origin>) -> Self {
        init_test_logger();
        let app = App::new(cfg, origin).await.unwrap();
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, app.local_addr().port()));
        let storage = app.storage();

        let shutdown_token = CancellationToken::new();
        let handle = tokio::spawn(app.run(shutdown_token.clone()));

        Self {
            addr,
            storage,
            shutdown_token,
            handle,
        }
    }

    /// Starts the proxy with the test config, forwarding every origin to `upstream`.
    pub async fn start_for(upstream: &UpstreamServer) -> Self {
        Self::start_with(config::new_test_config(), upstream).await
    }

    pub async fn start_with(mut cfg: Config, upstream: &UpstreamServer) -> Self {
        cfg.set_upstream_port(upstream.addr().port());
        let origin = TcpOrigin::new(cfg.upstream_port(), cfg.upstream_timeout());
        Self::start(cfg, Arc::new(origin)).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Cancels the proxy and waits for the accept loop and every worker to finish.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.shutdown_token.cancel();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("proxy did not stop in time")
            .expect("proxy task panicked")
    }
}
