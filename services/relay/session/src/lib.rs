//! TCP pairing loop, relay sessions, turn gating, and worker reclamation.
//!
//! This crate is the core of the relay server: it matches incoming
//! connections two at a time in strict arrival order, announces a role to
//! each peer, and relays opaque bytes between the pair until either stream
//! ends. Sessions run as independent tasks; a shared registry plus a reaper
//! task reclaim terminated workers without ever blocking the accept path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_session::{listen_tcp, run_pairing, run_reaper, SessionConfig, SessionRegistry};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> std::io::Result<()> {
//! let listener = listen_tcp("0.0.0.0:8080".parse().unwrap(), 10)?;
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
//! tokio::spawn(run_reaper(Arc::clone(&registry), reaper_rx));
//!
//! let (event_tx, mut event_rx) = mpsc::channel(64);
//! tokio::spawn(async move {
//!     while let Some(event) = event_rx.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//!
//! run_pairing(listener, SessionConfig::default(), registry, reaper_tx, event_tx).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gate;
pub mod pairing;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;

pub use gate::TurnGate;
pub use pairing::run_pairing;
pub use queue::WaitingQueue;
pub use registry::{run_reaper, Reclaim, SessionMeta, SessionRegistry};
pub use session::{CloseReason, RelayMode, RelaySession, SessionConfig, SessionEvent};
pub use transport::{connect_tcp, listen_tcp, Connection};
