use super::{Config, Logs, ProxyBox, Server, Storage, Upstream, Workers};
use std::time::Duration;

/// Creates a new test configuration: an ephemeral port, a small pool and
/// cache, and stats logging switched off.
pub fn new_test_config() -> Config {
    Config {
        proxy: ProxyBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
                stats_interval: Some(Duration::ZERO),
            }),
            server: Some(Server {
                port: Some(0),
                client_timeout: Some(Duration::from_secs(5)),
            }),
            workers: Some(Workers {
                pool_size: Some(4),
                queue_capacity: Some(4),
            }),
            storage: Some(Storage {
                size: Some(16),
                ttl: Some(Duration::from_secs(3600)),
                max_key_len: Some(256),
            }),
            upstream: Some(Upstream {
                port: Some(80),
                timeout: Some(Duration::from_secs(5)),
            }),
        },
    }
}
