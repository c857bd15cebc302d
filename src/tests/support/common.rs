// Common test utilities.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// How long any single test step may take before it counts as hung.
pub const WAIT: Duration = Duration::from_secs(10);

/// Routes log output through the test harness. Safe to call from every test.
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Reads until the end of an HTTP head (blank line) or EOF.
pub async fn read_head<R: AsyncRead + Unpin>(r: &mut R) -> Vec<u8> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match r.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    head
}

/// Builds the request line a browser configured with this proxy would send.
pub fn proxy_request(method: &str, target: &str) -> String {
    format!("{method} {target} HTTP/1.0\r\nUser-Agent: test\r\n\r\n")
}

/// Sends a raw request to the proxy and returns everything it answers before closing.
pub async fn raw_request(proxy: SocketAddr, request: &str) -> Vec<u8> {
    let fut = async {
        let mut stream = TcpStream::connect(proxy).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        // A reset after close still means "no more bytes" for these tests.
        let _ = stream.read_to_end(&mut out).await;
        out
    };
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("proxy did not close the connection in time")
}

/// GETs `target` through the proxy.
pub async fn proxy_get(proxy: SocketAddr, target: &str) -> Vec<u8> {
    raw_request(proxy, &proxy_request("GET", target)).await
}
