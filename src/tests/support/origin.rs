// In-memory origin for controller tests: every connection is a duplex pipe
// served by a scripted task.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use crate::upstream::{Origin, OriginStream, UpstreamError};

use super::common::read_head;

/// Scripted origin recording what it was asked for.
#[derive(Default)]
pub struct FakeOrigin {
    chunks: Vec<Vec<u8>>,
    unknown_host: Option<String>,
    refuse: bool,
    stall: bool,
    connects: AtomicUsize,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeOrigin {
    /// Answers every connection with `chunks`, written one by one, then closes.
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            ..Default::default()
        }
    }

    /// Makes resolution of `host` fail.
    pub fn with_unknown_host(mut self, host: &str) -> Self {
        self.unknown_host = Some(host.to_owned());
        self
    }

    /// Makes every connect fail.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Reads the request but never answers.
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl Origin for FakeOrigin {
    async fn resolve(&self, host: &str) -> Result<SocketAddr, UpstreamError> {
        if self.unknown_host.as_deref() == Some(host) {
            return Err(UpstreamError::NotFound {
                host: host.to_owned(),
            });
        }
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, 80)))
    }

    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn OriginStream>, UpstreamError> {
        if self.refuse {
            return Err(UpstreamError::Connect {
                addr,
                source: std::io::ErrorKind::ConnectionRefused.into(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let (near, mut far) = tokio::io::duplex(64 * 1024);
        let chunks = self.chunks.clone();
        let requests = self.requests.clone();
        let stall = self.stall;
        tokio::spawn(async move {
            let head = read_head(&mut far).await;
            requests.lock().push(head);
            if stall {
                std::future::pending::<()>().await;
            }
            for chunk in chunks {
                if far.write_all(&chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::new(near))
    }
}
