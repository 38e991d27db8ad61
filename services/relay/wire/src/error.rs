//! Relay protocol error types.

use thiserror::Error;

/// Errors produced when decoding a role announcement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Announcement does not start with the `ROLE:` prefix
    #[error("announcement missing ROLE: prefix")]
    MissingPrefix,

    /// Role name is not one of the two defined roles
    #[error("unknown role name {0:?}")]
    UnknownRole(String),
}
