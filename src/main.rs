// Main entrypoint for the caching forward proxy.

use cacheproxy::app::App;
use cacheproxy::config::{Config, ConfigTrait};
use cacheproxy::shutdown::GracefulShutdown;
use cacheproxy::upstream::TcpOrigin;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const CONFIG_PATH: &str = "cfg/cacheproxy.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/cacheproxy.cfg.local.yaml";

/// Caching HTTP forward proxy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// Listening port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of workers, 0 for one per CPU (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of cache slots (overrides config)
    #[arg(long)]
    cache_size: Option<usize>,
}

/// Loads the configuration from YAML.
/// An explicit path must load; otherwise the local file wins over the
/// default one, and built-in defaults apply when neither exists.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, String)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path.display().to_string()));
    }

    for candidate in [CONFIG_PATH_LOCAL, CONFIG_PATH] {
        if Path::new(candidate).exists() {
            let cfg = Config::load(candidate)
                .with_context(|| format!("failed to load config from {}", candidate))?;
            return Ok((cfg, candidate.to_string()));
        }
    }

    Ok((Config::default(), "defaults".to_string()))
}

fn apply_overrides(cfg: &mut Config, args: &Args) -> Result<()> {
    if let Some(port) = args.port {
        cfg.set_port(port);
    }
    if let Some(workers) = args.workers {
        cfg.set_pool_size(workers);
    }
    if let Some(size) = args.cache_size {
        cfg.set_cache_size(size);
    }
    cfg.validate().context("invalid configuration")
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_level()));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_thread_ids(true))
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_thread_ids(true))
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let (mut cfg, source) = load_cfg(args.cfg.clone())?;
    apply_overrides(&mut cfg, &args)?;

    // Configure logger (must be done after config is loaded)
    configure_logger(&cfg);
    info!(
        component = "config",
        event = "load_success",
        source = %source,
        port = cfg.port(),
        workers = cfg.pool_size(),
        cache_size = cfg.cache_size(),
        "config loaded"
    );

    let mut graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown.set_graceful_timeout(Duration::from_secs(60));

    let origin = Arc::new(TcpOrigin::new(cfg.upstream_port(), cfg.upstream_timeout()));
    let app = App::new(cfg, origin).await.map_err(|e| {
        error!(
            component = "main",
            scope = "app",
            event = "start_failed",
            error = %e,
            "failed to start app"
        );
        e
    })?;

    // Register app for graceful shutdown
    graceful_shutdown.add(1);

    let app_token = shutdown_token.clone();
    let app_done = graceful_shutdown.clone();
    let app_task = tokio::task::spawn(async move {
        let res = app.run(app_token.clone()).await;
        // A failed app brings the whole process down.
        app_token.cancel();
        app_done.done();
        res
    });

    // Listen for OS signals or cancellation and wait for graceful shutdown
    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    app_task.await.context("app task failed")?
}
