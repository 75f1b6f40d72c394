//! Control protocol listener
//!
//! Accepts operator WebSocket connections and runs one handler task per
//! connection. Shutdown walks the listener through explicit lifecycle states:
//!
//! ```text
//! Running  --shutdown-->  Draining  --handlers gone-->  Closed
//! ```

use crate::session::{ConnectionHandler, ReservationRegistry, SessionGuard, WsChannel};
use anyhow::{Context, Result};
use dronedesk_shared::{CommandTable, ConnectionId};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Pause after a failed accept so persistent errors (EMFILE) don't spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of the control listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Accepting new connections
    Running,
    /// No longer accepting; open connections are being closed
    Draining,
    /// Every connection handler has finished
    Closed,
}

/// Listener tuning
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Time a client has to complete the WebSocket handshake
    pub handshake_timeout: Duration,
    /// Time open handlers get to finish after shutdown starts
    pub shutdown_grace: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Accepts operator connections and arbitrates their drone claims
pub struct ControlListener {
    listener: TcpListener,
    config: ListenerConfig,
    registry: Arc<ReservationRegistry>,
    commands: Arc<CommandTable>,
    state_tx: watch::Sender<ListenerState>,
    next_connection: AtomicU64,
}

impl ControlListener {
    /// Bind the control port
    pub async fn bind(
        addr: SocketAddr,
        config: ListenerConfig,
        registry: Arc<ReservationRegistry>,
        commands: Arc<CommandTable>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind control listener on {}", addr))?;
        let (state_tx, _) = watch::channel(ListenerState::Running);

        Ok(Self {
            listener,
            config,
            registry,
            commands,
            state_tx,
            next_connection: AtomicU64::new(0),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Watch the lifecycle state
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state_tx.subscribe()
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Accept connections until `shutdown` resolves, then drain and close
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = self.local_addr()?;
        info!("Control listener accepting connections on {}", local_addr);

        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection = self.next_connection_id();
                        handlers.spawn(serve_connection(
                            stream,
                            peer,
                            connection,
                            self.config.handshake_timeout,
                            self.registry.clone(),
                            self.commands.clone(),
                            self.state_tx.subscribe(),
                        ));
                    }
                    Err(e) => accept_failed(&e).await,
                },
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = finished {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        let Self {
            listener,
            config,
            state_tx,
            ..
        } = self;

        state_tx.send_replace(ListenerState::Draining);
        drop(listener);
        info!(
            "Control listener draining {} connection(s)",
            handlers.len()
        );

        let drained = timeout(config.shutdown_grace, async {
            while let Some(finished) = handlers.join_next().await {
                if let Err(e) = finished {
                    error!("Connection task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} connection(s) still open after {:?}, aborting",
                handlers.len(),
                config.shutdown_grace
            );
            handlers.shutdown().await;
        }

        state_tx.send_replace(ListenerState::Closed);
        info!("Control listener closed");
        Ok(())
    }
}

/// Upgrade one TCP stream to WebSocket and run the protocol on it
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connection: ConnectionId,
    handshake_timeout: Duration,
    registry: Arc<ReservationRegistry>,
    commands: Arc<CommandTable>,
    lifecycle: watch::Receiver<ListenerState>,
) {
    let socket = match timeout(handshake_timeout, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("WebSocket handshake with {} timed out", peer);
            return;
        }
    };

    let handler = ConnectionHandler::new(
        WsChannel::new(socket),
        peer,
        SessionGuard::new(connection, registry),
        commands,
        lifecycle,
    );

    // outcome is already logged by the handler
    let _ = handler.run().await;
}

async fn accept_failed(e: &std::io::Error) {
    warn!("Failed to accept connection: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
