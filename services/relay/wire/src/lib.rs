//! Role identity and announcement codec for the relay protocol.
//!
//! The relay server assigns each peer of a session one of exactly two
//! symmetric roles and announces it with a single textual message before any
//! relay traffic flows. Everything else on the wire is opaque client payload
//! forwarded verbatim, so this crate is deliberately small: the role type,
//! the announcement format, and the errors a malformed announcement can
//! produce on the parsing side.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod role;

pub use error::WireError;
pub use role::{Role, ANNOUNCEMENT_PREFIX};
