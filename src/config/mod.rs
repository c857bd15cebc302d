// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_POOL_SIZE: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_CACHE_SIZE: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Longest accepted cache TTL: 100 years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);
pub const DEFAULT_MAX_KEY_LEN: usize = 256;
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Proxy {
    #[serde(rename = "proxy")]
    pub proxy: ProxyBox,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProxyBox {
    #[serde(default)]
    pub env: String,
    pub logs: Option<Logs>,
    pub server: Option<Server>,
    pub workers: Option<Workers>,
    pub storage: Option<Storage>,
    pub upstream: Option<Upstream>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
    /// Zero disables the periodic cache stats line.
    #[serde(rename = "stats_interval", default, with = "humantime_serde")]
    pub stats_interval: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Server {
    pub port: Option<u16>,
    #[serde(rename = "client_timeout", default, with = "humantime_serde")]
    pub client_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Workers {
    /// Zero means one worker per CPU.
    #[serde(rename = "pool_size")]
    pub pool_size: Option<usize>,
    #[serde(rename = "queue_capacity")]
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Storage {
    pub size: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    #[serde(rename = "max_key_len")]
    pub max_key_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Upstream {
    pub port: Option<u16>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

// Config trait
pub trait ConfigTrait {
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_dev(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn log_level(&self) -> &str;
    fn stats_interval(&self) -> Duration;
    fn port(&self) -> u16;
    fn client_timeout(&self) -> Option<Duration>;
    fn pool_size(&self) -> usize;
    fn queue_capacity(&self) -> usize;
    fn cache_size(&self) -> usize;
    fn ttl(&self) -> Duration;
    fn max_key_len(&self) -> usize;
    fn upstream_port(&self) -> u16;
    fn upstream_timeout(&self) -> Option<Duration>;
}

// Config type alias for convenience
pub type Config = Proxy;

impl ConfigTrait for Config {
    fn is_prod(&self) -> bool {
        self.proxy.env == PROD
    }

    fn is_dev(&self) -> bool {
        self.proxy.env == DEV
    }

    fn is_test(&self) -> bool {
        self.proxy.env == TEST
    }

    fn log_level(&self) -> &str {
        self.proxy
            .logs
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    fn stats_interval(&self) -> Duration {
        self.proxy
            .logs
            .as_ref()
            .and_then(|l| l.stats_interval)
            .unwrap_or(DEFAULT_STATS_INTERVAL)
    }

    fn port(&self) -> u16 {
        self.proxy
            .server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }

    fn client_timeout(&self) -> Option<Duration> {
        self.proxy.server.as_ref().and_then(|s| s.client_timeout)
    }

    fn pool_size(&self) -> usize {
        match self.proxy.workers.as_ref().and_then(|w| w.pool_size) {
            Some(0) => num_cpus::get(),
            Some(n) => n,
            None => DEFAULT_POOL_SIZE,
        }
    }

    fn queue_capacity(&self) -> usize {
        self.proxy
            .workers
            .as_ref()
            .and_then(|w| w.queue_capacity)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    fn cache_size(&self) -> usize {
        self.proxy
            .storage
            .as_ref()
            .and_then(|s| s.size)
            .unwrap_or(DEFAULT_CACHE_SIZE)
    }

    fn ttl(&self) -> Duration {
        self.proxy
            .storage
            .as_ref()
            .and_then(|s| s.ttl)
            .unwrap_or(DEFAULT_TTL)
    }

    fn max_key_len(&self) -> usize {
        self.proxy
            .storage
            .as_ref()
            .and_then(|s| s.max_key_len)
            .unwrap_or(DEFAULT_MAX_KEY_LEN)
    }

    fn upstream_port(&self) -> u16 {
        self.proxy
            .upstream
            .as_ref()
            .and_then(|u| u.port)
            .unwrap_or(crate::upstream::ORIGIN_PORT)
    }

    fn upstream_timeout(&self) -> Option<Duration> {
        self.proxy.upstream.as_ref().and_then(|u| u.timeout)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("load config from {:?}", abs_path))
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Proxy = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects settings the proxy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity() == 0 {
            anyhow::bail!("workers.queue_capacity must be non-zero");
        }
        if self.cache_size() == 0 {
            anyhow::bail!("storage.size must be non-zero");
        }
        if self.ttl() > MAX_TTL {
            anyhow::bail!("storage.ttl must not exceed {:?}", MAX_TTL);
        }
        if self.max_key_len() == 0 {
            anyhow::bail!("storage.max_key_len must be non-zero");
        }
        if self.upstream_port() == 0 {
            anyhow::bail!("upstream.port must be non-zero");
        }
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) {
        self.proxy.server.get_or_insert_with(Server::default).port = Some(port);
    }

    pub fn set_pool_size(&mut self, size: usize) {
        self.proxy.workers.get_or_insert_with(Workers::default).pool_size = Some(size);
    }

    pub fn set_cache_size(&mut self, size: usize) {
        self.proxy.storage.get_or_insert_with(Storage::default).size = Some(size);
    }

    pub fn set_upstream_port(&mut self, port: u16) {
        self.proxy.upstream.get_or_insert_with(Upstream::default).port = Some(port);
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
