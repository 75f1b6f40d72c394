//! Operator session handling
//!
//! This module handles:
//! - The shared registry of drone reservations
//! - The transport seam between the protocol and WebSocket frames
//! - Running the control protocol for each operator connection
//! - Releasing reservations on every way a connection can end

mod channel;
mod handler;
mod registry;

pub use channel::WsChannel;
pub use handler::{ConnectionHandler, SessionGuard};
pub use registry::ReservationRegistry;
