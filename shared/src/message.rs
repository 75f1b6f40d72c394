//! Text message grammar for the control protocol
//!
//! Inbound messages are single text frames:
//! ```text
//! selected_drone <device-id>     claim a drone
//! <anything else>                command token for the claimed drone
//! ```
//!
//! Every inbound message gets exactly one [`Reply`].

use std::fmt;

use thiserror::Error;

use crate::DeviceId;

/// Keyword that starts a claim message
pub const CLAIM_KEYWORD: &str = "selected_drone";

/// Reply sent for a command token that is not in the command table
pub const UNRECOGNIZED_COMMAND: &str = "unrecognized command";

/// Errors raised while parsing an inbound message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("claim message is missing its device id")]
    MissingDeviceId,
}

/// A parsed inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Request to become the exclusive controller of a drone
    Claim(DeviceId),
    /// Anything that is not a claim, matched verbatim against the command table
    Command(&'a str),
}

impl<'a> Inbound<'a> {
    /// Parse a raw text message.
    ///
    /// A message is a claim when its first whitespace-separated token is
    /// [`CLAIM_KEYWORD`]; the second token is the device id and any further
    /// tokens are ignored.
    pub fn parse(text: &'a str) -> Result<Self, ProtocolError> {
        let mut tokens = text.split_whitespace();
        if tokens.next() != Some(CLAIM_KEYWORD) {
            return Ok(Inbound::Command(text));
        }

        tokens
            .next()
            .map(|id| Inbound::Claim(DeviceId::from(id)))
            .ok_or(ProtocolError::MissingDeviceId)
    }
}

/// Reply sent back to the operator for one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Claim succeeded, control is enabled
    Granted(DeviceId),
    /// The operator already holds the claimed drone
    AlreadyHeldBySelf,
    /// Another operator holds the claimed drone
    HeldByOther(DeviceId),
    /// Claim without a device id
    MalformedClaim,
    /// A command arrived before any drone was claimed
    SelectFirst,
    /// Acknowledgement text from the command table (or the sentinel)
    Ack(&'static str),
}

impl Reply {
    /// Render the reply as the text frame sent to the operator
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Granted(id) => write!(f, "claim granted, control enabled for {}", id),
            Reply::AlreadyHeldBySelf => f.write_str("you already control this device"),
            Reply::HeldByOther(id) => write!(f, "device {} is controlled by another operator", id),
            Reply::MalformedClaim => f.write_str("claim rejected: device id missing"),
            Reply::SelectFirst => f.write_str("select a device first"),
            Reply::Ack(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_claim() {
        let inbound = Inbound::parse("selected_drone Quadcopter_1").expect("parse failed");
        assert_eq!(inbound, Inbound::Claim(DeviceId::from("Quadcopter_1")));
    }

    #[test]
    fn test_parse_claim_ignores_extra_tokens() {
        let inbound = Inbound::parse("selected_drone  D1 please").expect("parse failed");
        assert_eq!(inbound, Inbound::Claim(DeviceId::from("D1")));
    }

    #[test]
    fn test_parse_claim_without_id() {
        assert_eq!(
            Inbound::parse("selected_drone"),
            Err(ProtocolError::MissingDeviceId)
        );
        assert_eq!(
            Inbound::parse("selected_drone   "),
            Err(ProtocolError::MissingDeviceId)
        );
    }

    #[test]
    fn test_keyword_must_be_a_whole_token() {
        let inbound = Inbound::parse("selected_droneD1").expect("parse failed");
        assert_eq!(inbound, Inbound::Command("selected_droneD1"));
    }

    #[test]
    fn test_parse_command_is_verbatim() {
        assert_eq!(Inbound::parse("takeoff"), Ok(Inbound::Command("takeoff")));
        assert_eq!(Inbound::parse(" takeoff"), Ok(Inbound::Command(" takeoff")));
        assert_eq!(Inbound::parse(""), Ok(Inbound::Command("")));
    }

    #[test]
    fn test_reply_texts() {
        let d1 = DeviceId::from("D1");
        assert_eq!(
            Reply::Granted(d1.clone()).to_text(),
            "claim granted, control enabled for D1"
        );
        assert_eq!(
            Reply::HeldByOther(d1).to_text(),
            "device D1 is controlled by another operator"
        );
        assert_eq!(
            Reply::AlreadyHeldBySelf.to_text(),
            "you already control this device"
        );
        assert_eq!(Reply::SelectFirst.to_text(), "select a device first");
        assert_eq!(Reply::Ack(UNRECOGNIZED_COMMAND).to_text(), "unrecognized command");
    }
}
