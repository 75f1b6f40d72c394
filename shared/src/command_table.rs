//! Command token to acknowledgement mapping
//!
//! Built once at startup and shared read-only by every connection.

use std::collections::HashMap;

use crate::message::UNRECOGNIZED_COMMAND;

/// Commands understood by every drone, with their acknowledgement text
pub const STANDARD_COMMANDS: &[(&str, &str)] = &[
    ("takeoff", "drone is taking off"),
    ("land", "drone is landing"),
    ("hover", "drone is hovering"),
    ("move_forward", "drone is moving forward"),
    ("move_back", "drone is moving back"),
    ("move_left", "drone is moving left"),
    ("move_right", "drone is moving right"),
    ("move_turns_around_left", "drone is turning left"),
    ("move_turns_around_right", "drone is turning right"),
    ("start_engines", "drone engines started"),
    ("return_base", "drone is returning to base"),
    ("cargo_dumping", "cargo dropped"),
];

/// Read-only command lookup table
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: HashMap<&'static str, &'static str>,
}

impl CommandTable {
    /// Build a table from (token, acknowledgement) pairs
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
        }
    }

    /// The standard drone command set
    pub fn standard() -> Self {
        Self::new(STANDARD_COMMANDS)
    }

    /// Look up a command token.
    ///
    /// Unknown tokens yield [`UNRECOGNIZED_COMMAND`] instead of failing.
    pub fn lookup(&self, token: &str) -> &'static str {
        self.entries
            .get(token)
            .copied()
            .unwrap_or(UNRECOGNIZED_COMMAND)
    }

    /// Whether the token is a defined command
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_commands() {
        let table = CommandTable::standard();
        assert_eq!(table.len(), STANDARD_COMMANDS.len());
        for (token, ack) in STANDARD_COMMANDS {
            assert_eq!(table.lookup(token), *ack);
        }
    }

    #[test]
    fn test_unknown_command_yields_sentinel() {
        let table = CommandTable::standard();
        assert_eq!(table.lookup("spin_dance"), UNRECOGNIZED_COMMAND);
        assert_eq!(table.lookup("TAKEOFF"), UNRECOGNIZED_COMMAND);
        assert_eq!(table.lookup("takeoff "), UNRECOGNIZED_COMMAND);
        assert!(!table.contains("spin_dance"));
    }

    #[test]
    fn test_lookup_is_stable_across_threads() {
        let table = std::sync::Arc::new(CommandTable::standard());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    (0..100).all(|_| {
                        table.lookup("land") == "drone is landing"
                            && table.lookup("nope") == UNRECOGNIZED_COMMAND
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().expect("thread panicked"));
        }
    }
}
