use clap::Parser;
use eth_tx_watcher::api::ApiServer;
use eth_tx_watcher::blockchain::{BlockMonitor, BlockMonitorConfig, IndexingEngine, RpcClient};
use eth_tx_watcher::config::AppConfig;
use eth_tx_watcher::error::{ConfigError, WatcherError};
use eth_tx_watcher::logging::{init_logging, LogContext};
use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "watcher")]
#[command(about = "Watches an Ethereum node and indexes transactions of subscribed addresses")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to CONFIG_FILE or ./config.toml)
    #[arg(long)]
    config: Option<String>,

    /// JSON-RPC endpoint, overrides the configured one
    #[arg(long)]
    endpoint: Option<String>,

    /// HTTP API port, overrides the configured one
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        // Config failures can happen before the logger is up
        eprintln!("Fatal: {}", e);
        LogContext::new("watcher", "main")
            .with_metadata("severity", json!(format!("{:?}", e.severity())))
            .error(&format!("Watcher exited: {}", e));
        return Err(e.into());
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(endpoint) = &args.endpoint {
        config.rpc.endpoint = endpoint.clone();
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<(), WatcherError> {
    let config = load_config(&args)?;

    init_logging(&config.logging);
    info!("Starting transaction watcher against {}", config.rpc.endpoint);

    let client = RpcClient::new_with_timeout(config.rpc.endpoint.clone(), config.rpc.timeout_seconds)?;

    // Without a starting cursor there is nothing to watch from
    let engine = Arc::new(IndexingEngine::start(client).await?);

    let monitor = Arc::new(BlockMonitor::new(
        Arc::clone(&engine),
        Some(BlockMonitorConfig {
            poll_interval: Duration::from_millis(config.watcher.poll_interval_ms),
        }),
    ));
    let monitor_handle = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.run().await })
    };

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = stop_tx.send(true);
    });

    let server = ApiServer::new(Arc::clone(&engine), config.api.host.clone(), config.api.port);
    let served = server
        .start(async move {
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
        })
        .await;

    monitor.shutdown();
    if let Err(e) = monitor_handle.await {
        error!("Block monitor task failed: {}", e);
    }

    served?;

    info!("Watcher stopped at block {}", engine.cursor());
    Ok(())
}
