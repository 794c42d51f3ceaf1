//! Static file server.
//!
//! This binary loads the configuration, wires the cache and request logger
//! together and serves until Ctrl-C.

use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use static_cache_server::timer::RuntimeScheduler;
use static_cache_server::{logging, Cli, FileCache, LogSink, RequestLogger, Server, ServerConfig};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init();

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => {
            warn!("no configuration file given, using defaults");
            ServerConfig::default()
        }
    };
    let config = cli.apply_overrides(config);
    info!("{}", config);

    if config.tls_configured() {
        warn!("TLS certificate configured but HTTPS is not built in; serving plain HTTP");
    }

    let scheduler = Arc::new(RuntimeScheduler::new(tokio::runtime::Handle::current()));
    let cache = FileCache::with_scheduler(config.cache_config(), scheduler);
    let logger = Arc::new(RequestLogger::start(LogSink::from_path(&config.log_path)));

    let server = Arc::new(
        Server::new(
            config.content_directory.clone(),
            cache.clone(),
            Arc::clone(&logger),
        )
        .with_read_timeout(config.request_timeout()),
    );
    let listener = Server::bind(config.listening_port).await?;

    let shutdown = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    server.serve(listener, shutdown).await?;

    if !logger.flush_async().await {
        warn!("request logger stopped before draining");
    }
    logger.shutdown();

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        size = stats.size,
        expirations = stats.expirations,
        "final cache stats"
    );
    Ok(())
}
