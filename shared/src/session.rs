//! Operator Session State Machine
//!
//! Each connection owns one [`SessionMachine`]. It starts `Unselected`, moves
//! to `Reserved` once a claim is granted, and gives its reservation back when
//! the connection ends.

use crate::{
    command_table::CommandTable,
    message::{Inbound, ProtocolError, Reply},
    ConnectionId, DeviceId,
};

/// Result of trying to reserve a drone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The drone was free and now belongs to the caller
    Acquired,
    /// The caller already holds the drone; nothing changed
    AlreadyHeldBySelf,
    /// Another connection holds the drone; nothing changed
    AlreadyHeldByOther(ConnectionId),
}

/// Shared table of drone reservations.
///
/// Implementations must make `try_acquire` and `release` linearizable across
/// all callers: two concurrent acquisitions of the same free drone can never
/// both return [`ClaimOutcome::Acquired`].
pub trait Reservations {
    /// Reserve `device` for `holder` if nobody holds it
    fn try_acquire(&self, device: &DeviceId, holder: ConnectionId) -> ClaimOutcome;

    /// Drop the reservation of `device` if and only if `holder` owns it.
    ///
    /// Returns whether an entry was removed. Releasing a drone held by
    /// someone else, or by nobody, is a no-op.
    fn release(&self, device: &DeviceId, holder: ConnectionId) -> bool;
}

impl<T: Reservations + ?Sized> Reservations for std::sync::Arc<T> {
    fn try_acquire(&self, device: &DeviceId, holder: ConnectionId) -> ClaimOutcome {
        (**self).try_acquire(device, holder)
    }

    fn release(&self, device: &DeviceId, holder: ConnectionId) -> bool {
        (**self).release(device, holder)
    }
}

/// Per-connection session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No drone claimed yet
    #[default]
    Unselected,
    /// The connection controls this drone
    Reserved(DeviceId),
}

impl SessionState {
    /// The reserved drone, if any
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            SessionState::Unselected => None,
            SessionState::Reserved(device) => Some(device),
        }
    }
}

/// Outcome of processing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Reply to send back; there is always exactly one
    pub reply: Reply,
    /// Drone given back because the session moved to another one
    pub released: Option<DeviceId>,
}

impl Step {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            released: None,
        }
    }
}

/// The protocol state machine of one operator connection
#[derive(Debug)]
pub struct SessionMachine {
    connection: ConnectionId,
    state: SessionState,
}

impl SessionMachine {
    /// Create a session in the `Unselected` state
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            state: SessionState::Unselected,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Process one inbound text message
    pub fn handle<R>(&mut self, text: &str, reservations: &R, commands: &CommandTable) -> Step
    where
        R: Reservations + ?Sized,
    {
        match Inbound::parse(text) {
            Ok(Inbound::Claim(device)) => self.claim(device, reservations),
            Ok(Inbound::Command(token)) => match &self.state {
                SessionState::Reserved(_) => Step::reply(Reply::Ack(commands.lookup(token))),
                SessionState::Unselected => Step::reply(Reply::SelectFirst),
            },
            Err(ProtocolError::MissingDeviceId) => Step::reply(Reply::MalformedClaim),
        }
    }

    /// Claim a drone. A granted claim for a different drone gives the
    /// previously held one back, so a session never holds two drones.
    fn claim<R>(&mut self, device: DeviceId, reservations: &R) -> Step
    where
        R: Reservations + ?Sized,
    {
        match reservations.try_acquire(&device, self.connection) {
            ClaimOutcome::Acquired => {
                let previous = std::mem::replace(
                    &mut self.state,
                    SessionState::Reserved(device.clone()),
                );
                let released = match previous {
                    SessionState::Reserved(old) if old != device => {
                        reservations.release(&old, self.connection);
                        Some(old)
                    }
                    _ => None,
                };

                Step {
                    reply: Reply::Granted(device),
                    released,
                }
            }
            ClaimOutcome::AlreadyHeldBySelf => Step::reply(Reply::AlreadyHeldBySelf),
            ClaimOutcome::AlreadyHeldByOther(_) => Step::reply(Reply::HeldByOther(device)),
        }
    }

    /// Give back the reserved drone, if any, and return to `Unselected`.
    ///
    /// Safe to call any number of times; only the first call after a claim
    /// touches the registry.
    pub fn release<R>(&mut self, reservations: &R) -> Option<DeviceId>
    where
        R: Reservations + ?Sized,
    {
        match std::mem::take(&mut self.state) {
            SessionState::Reserved(device) => {
                reservations.release(&device, self.connection);
                Some(device)
            }
            SessionState::Unselected => None,
        }
    }
}
