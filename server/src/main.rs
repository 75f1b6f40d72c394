mod config;
mod inventory;
mod listener;
mod session;
mod shutdown;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, ServerConfig};
use dronedesk_shared::CommandTable;
use inventory::InventoryStore;
use listener::ControlListener;
use session::ReservationRegistry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter(&directives))
        .init();

    let config = ServerConfig::try_from(Cli::parse())?;
    info!("DroneDesk server starting");
    info!("  control: ws://{}", config.control_addr);
    info!("  inventory: http://{}", config.http_addr);

    run(config).await
}

/// INFO unless `RUST_LOG` says otherwise
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

async fn run(config: ServerConfig) -> Result<()> {
    let store = match &config.inventory_file {
        Some(path) => InventoryStore::open(path.clone())
            .await
            .with_context(|| format!("failed to open inventory {}", path.display()))?,
        None => InventoryStore::default(),
    };

    let registry = Arc::new(ReservationRegistry::new());
    let commands = Arc::new(CommandTable::standard());
    info!("Command table loaded: {} commands", commands.len());

    let control = ControlListener::bind(
        config.control_addr,
        config.listener.clone(),
        registry.clone(),
        commands,
    )
    .await?;

    let http = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind inventory listener on {}", config.http_addr))?;

    let mut lifecycle = control.subscribe();
    tokio::spawn(async move {
        while lifecycle.changed().await.is_ok() {
            let state = *lifecycle.borrow_and_update();
            info!("Control listener is {:?}", state);
        }
    });

    let stop = shutdown::Trigger::install();

    let http_stop = stop.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(http, inventory::router(Arc::new(store)))
            .with_graceful_shutdown(async move { http_stop.wait().await })
            .await
    });

    control.serve(stop.wait()).await?;

    match http_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Inventory server failed: {}", e),
        Err(e) => error!("Inventory server task failed: {}", e),
    }

    for (device, holder) in registry.snapshot() {
        error!("Drone {} still reserved by {} after shutdown", device, holder);
    }
    info!("Server shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn enabled_under(directives: &str, check: impl FnOnce() -> bool) -> bool {
        let subscriber = tracing_subscriber::registry().with(log_filter(directives));
        tracing::subscriber::with_default(subscriber, check)
    }

    fn debug_on() -> bool {
        tracing::enabled!(Level::DEBUG)
    }

    fn info_on() -> bool {
        tracing::enabled!(Level::INFO)
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert!(enabled_under("", info_on));
        assert!(!enabled_under("", debug_on));
    }

    #[test]
    fn test_log_filter_follows_rust_log() {
        assert!(enabled_under("debug", debug_on));
        assert!(!enabled_under("warn", info_on));
        assert!(enabled_under("dronedesk_server=debug", debug_on));
    }
}
