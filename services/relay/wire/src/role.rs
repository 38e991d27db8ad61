//! The two symmetric session roles and their announcement message.
//!
//! A session always holds exactly two peers. The peer that arrived first is
//! `First`, the other is `Second`; the server tells each peer which one it is
//! with a `ROLE:<NAME>` message sent once, immediately after pairing.

use std::fmt;

use crate::error::WireError;

/// Prefix of the role announcement message
pub const ANNOUNCEMENT_PREFIX: &str = "ROLE:";

/// One of the two symmetric identities assigned to the peers of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The peer that arrived first; holds initial send permission in
    /// turn-based relay
    First,
    /// The peer that arrived second
    Second,
}

impl Role {
    /// The opposite role
    pub fn other(self) -> Role {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    /// Wire-format name of this role
    pub fn label(self) -> &'static str {
        match self {
            Role::First => "FIRST",
            Role::Second => "SECOND",
        }
    }

    /// The announcement message sent to a peer assigned this role
    pub fn announcement(self) -> String {
        format!("{}{}", ANNOUNCEMENT_PREFIX, self.label())
    }

    /// Decode a role announcement, e.g. `ROLE:FIRST`
    pub fn parse_announcement(text: &str) -> Result<Role, WireError> {
        let name = text
            .strip_prefix(ANNOUNCEMENT_PREFIX)
            .ok_or(WireError::MissingPrefix)?;
        match name {
            "FIRST" => Ok(Role::First),
            "SECOND" => Ok(Role::Second),
            other => Err(WireError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
