//! Per-connection protocol handling

use super::channel::{ChannelError, ControlChannel};
use super::registry::ReservationRegistry;
use crate::listener::ListenerState;
use dronedesk_shared::{
    CommandTable, ConnectionId, DeviceId, Reply, SessionMachine, SessionState, Step,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Owns a connection's session and gives its drone back when dropped.
///
/// The handler releases explicitly on every normal exit path; the `Drop`
/// impl covers tasks that are aborted mid-await.
pub struct SessionGuard {
    machine: SessionMachine,
    registry: Arc<ReservationRegistry>,
}

impl SessionGuard {
    pub fn new(connection: ConnectionId, registry: Arc<ReservationRegistry>) -> Self {
        Self {
            machine: SessionMachine::new(connection),
            registry,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.machine.connection()
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    /// Run one inbound message through the state machine
    pub fn handle(&mut self, text: &str, commands: &CommandTable) -> Step {
        self.machine.handle(text, self.registry.as_ref(), commands)
    }

    /// Connection currently holding `device`
    pub fn holder_of(&self, device: &DeviceId) -> Option<ConnectionId> {
        self.registry.holder(device)
    }

    /// Give the reserved drone back; later calls are no-ops
    pub fn release(&mut self) -> Option<DeviceId> {
        self.machine.release(self.registry.as_ref())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(device) = self.release() {
            info!(
                "Drone {} released by {} on abort",
                device,
                self.machine.connection()
            );
        }
    }
}

/// How a connection ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The operator closed the stream
    PeerEnded,
    /// The listener started draining
    Shutdown,
}

enum Event {
    Drain,
    Received(Result<Option<String>, ChannelError>),
}

/// Drives the control protocol for one operator connection
pub struct ConnectionHandler<C> {
    channel: C,
    peer: SocketAddr,
    session: SessionGuard,
    commands: Arc<CommandTable>,
    lifecycle: watch::Receiver<ListenerState>,
}

impl<C: ControlChannel> ConnectionHandler<C> {
    pub fn new(
        channel: C,
        peer: SocketAddr,
        session: SessionGuard,
        commands: Arc<CommandTable>,
        lifecycle: watch::Receiver<ListenerState>,
    ) -> Self {
        Self {
            channel,
            peer,
            session,
            commands,
            lifecycle,
        }
    }

    /// Serve the connection until it ends, then release its drone.
    ///
    /// Cleanup runs whichever way the connection ended.
    pub async fn run(mut self) -> Result<Exit, ChannelError> {
        let connection = self.session.connection();
        info!("Operator connected: {} ({})", self.peer, connection);

        let outcome = self.serve().await;
        match &outcome {
            Ok(Exit::PeerEnded) => info!("Operator {} ({}) disconnected", self.peer, connection),
            Ok(Exit::Shutdown) => info!("Closed {} ({}) for shutdown", self.peer, connection),
            Err(e) if e.is_peer_closed() => {
                info!("Connection with {} ({}) closed: {}", self.peer, connection, e)
            }
            Err(e) => error!("Unhandled error for {} ({}): {}", self.peer, connection, e),
        }

        if let Some(device) = self.session.release() {
            info!("Drone {} released by {}", device, connection);
        }

        outcome
    }

    async fn serve(&mut self) -> Result<Exit, ChannelError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = draining(&mut self.lifecycle) => Event::Drain,
                received = self.channel.recv() => Event::Received(received),
            };

            let text = match event {
                Event::Drain => {
                    self.channel.close().await?;
                    return Ok(Exit::Shutdown);
                }
                Event::Received(received) => match received? {
                    Some(text) => text,
                    None => return Ok(Exit::PeerEnded),
                },
            };

            let step = self.session.handle(&text, &self.commands);
            self.log_step(&text, &step);
            self.channel.send(step.reply.to_text()).await?;
        }
    }

    fn log_step(&self, text: &str, step: &Step) {
        let connection = self.session.connection();

        if let Some(previous) = &step.released {
            info!("Drone {} released by {} on switch", previous, connection);
        }

        match &step.reply {
            Reply::Granted(device) => {
                info!("{} ({}) took control of {}", self.peer, connection, device)
            }
            Reply::Ack(_) => {
                if let SessionState::Reserved(device) = self.session.state() {
                    info!(
                        "{} ({}) sent command to {}: {}",
                        self.peer, connection, device, text
                    );
                }
            }
            Reply::HeldByOther(device) => debug!(
                "{} ({}) denied {}, held by {:?}",
                self.peer,
                connection,
                device,
                self.session.holder_of(device)
            ),
            rejected => debug!("{} ({}) rejected: {}", self.peer, connection, rejected),
        }
    }
}

/// Resolves once the listener leaves `Running` or goes away
async fn draining(lifecycle: &mut watch::Receiver<ListenerState>) {
    let _ = lifecycle
        .wait_for(|state| *state != ListenerState::Running)
        .await;
}
