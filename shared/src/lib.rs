//! DroneDesk Shared Protocol Types
//!
//! This crate provides the protocol vocabulary shared by the control server
//! and its tests: device and connection identities, the text message grammar,
//! the command table and the per-connection session state machine.

pub mod command_table;
pub mod message;
pub mod session;

use std::fmt;

pub use command_table::CommandTable;
pub use message::{Inbound, ProtocolError, Reply};
pub use session::{ClaimOutcome, Reservations, SessionMachine, SessionState, Step};

/// Externally assigned identifier of a controllable drone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a live operator connection.
///
/// Only ever compared for equality; two connections never share an id even
/// when they come from the same remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Default network endpoints
pub mod defaults {
    /// WebSocket control protocol listener
    pub const CONTROL_ADDR: &str = "127.0.0.1:8765";

    /// Inventory HTTP listener
    pub const HTTP_ADDR: &str = "127.0.0.1:8081";
}
