//! Command line and environment configuration

use crate::listener::ListenerConfig;
use anyhow::{Context, Result};
use clap::Parser;
use dronedesk_shared::defaults;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "dronedesk-server",
    author,
    version,
    about = "Arbitrates exclusive drone control among operators"
)]
pub struct Cli {
    /// Address of the WebSocket control listener.
    #[arg(long, env = "DRONEDESK_CONTROL_ADDR", default_value = defaults::CONTROL_ADDR)]
    pub control_addr: String,

    /// Address of the inventory HTTP listener.
    #[arg(long, env = "DRONEDESK_HTTP_ADDR", default_value = defaults::HTTP_ADDR)]
    pub http_addr: String,

    /// JSON file backing the drone inventory; in-memory when omitted.
    #[arg(long, env = "DRONEDESK_INVENTORY_FILE")]
    pub inventory_file: Option<PathBuf>,

    /// Maximum time clients have to complete the WebSocket handshake.
    #[arg(long, env = "DRONEDESK_HANDSHAKE_TIMEOUT_SECS", default_value_t = 5)]
    pub handshake_timeout_secs: u64,

    /// Time open connections get to close during shutdown.
    #[arg(long, env = "DRONEDESK_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub control_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub inventory_file: Option<PathBuf>,
    pub listener: ListenerConfig,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let control_addr: SocketAddr = cli
            .control_addr
            .parse()
            .with_context(|| format!("invalid control address: {}", cli.control_addr))?;
        let http_addr: SocketAddr = cli
            .http_addr
            .parse()
            .with_context(|| format!("invalid http address: {}", cli.http_addr))?;

        Ok(ServerConfig {
            control_addr,
            http_addr,
            inventory_file: cli.inventory_file,
            listener: ListenerConfig {
                handshake_timeout: Duration::from_secs(cli.handshake_timeout_secs),
                shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dronedesk-server"]).expect("parse failed");
        let config = ServerConfig::try_from(cli).expect("invalid config");

        assert_eq!(config.control_addr, "127.0.0.1:8765".parse::<SocketAddr>().unwrap());
        assert_eq!(config.http_addr, "127.0.0.1:8081".parse::<SocketAddr>().unwrap());
        assert!(config.inventory_file.is_none());
        assert_eq!(config.listener.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "dronedesk-server",
            "--control-addr",
            "0.0.0.0:9000",
            "--inventory-file",
            "/tmp/drones.json",
            "--shutdown-grace-secs",
            "1",
        ])
        .expect("parse failed");
        let config = ServerConfig::try_from(cli).expect("invalid config");

        assert_eq!(config.control_addr.port(), 9000);
        assert_eq!(
            config.inventory_file,
            Some(PathBuf::from("/tmp/drones.json"))
        );
        assert_eq!(config.listener.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_address() {
        let cli = Cli::try_parse_from(["dronedesk-server", "--http-addr", "nowhere"])
            .expect("parse failed");
        let err = ServerConfig::try_from(cli).unwrap_err();
        assert!(err.to_string().contains("invalid http address"));
    }
}
