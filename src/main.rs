mod config;
mod filter;
mod metrics;
mod protocol;
mod relay;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use config::Config;
use filter::FilterInstance;
use metrics::metrics;

/// Global connection counter for generating unique session IDs
static CONNECTION_COUNTER: AtomicU32 = AtomicU32::new(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_or_default_config()?;

    let instance = Arc::new(FilterInstance::from_config("maxrows", &config.maxrows));

    info!(
        max_resultset_rows = config.maxrows.max_resultset_rows,
        max_resultset_size = config.maxrows.max_resultset_size,
        debug = config.maxrows.debug,
        "Resultset limits configured"
    );

    if config.metrics.enabled {
        let addr = config.metrics.listen_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(&addr).await {
                error!(error = %e, "Metrics server stopped");
            }
        });
    }

    let addr = format!("{}:{}", config.server.listen_addr, config.server.listen_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, backend = %config.backend.addr(), "maxrows proxy listening");

    let backend_config = Arc::new(config.backend);

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let session_id = CONNECTION_COUNTER.fetch_add(1, Ordering::SeqCst);
        let instance = instance.clone();
        let backend_config = backend_config.clone();

        info!(session_id = session_id, peer = %peer_addr, "New connection");

        tokio::spawn(async move {
            metrics().record_connection_accepted();

            let result = match relay::connect_backend(&backend_config).await {
                Ok(backend) => relay::run_session(session_id, instance, stream, backend).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => info!(session_id = session_id, "Session ended"),
                Err(e) => warn!(session_id = session_id, error = %e, "Session ended with error"),
            }

            metrics().record_connection_closed();
        });
    }
}

/// Config from `MAXROWS_CONFIG` if set, otherwise the first default path that
/// loads, otherwise built-in defaults
fn load_or_default_config() -> anyhow::Result<Config> {
    if let Ok(path) = std::env::var("MAXROWS_CONFIG") {
        let config = config::load_config(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?;
        info!(path = %path, "Loaded configuration");
        return Ok(config);
    }

    let config_paths = ["config/maxrows.toml", "maxrows.toml"];

    for path in config_paths {
        match config::load_config(path) {
            Ok(config) => {
                info!(path = path, "Loaded configuration");
                return Ok(config);
            }
            Err(e) => {
                warn!(path = path, error = %e, "Failed to load config");
            }
        }
    }

    info!("Using default configuration");
    Ok(Config::default())
}
