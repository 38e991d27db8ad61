//! Relay sessions: the per-pair concurrency unit.
//!
//! A session owns exactly two connections. It announces a role to each peer,
//! then relays opaque bytes between them until either stream ends, under one
//! of two disciplines:
//!
//! - **Unordered**: a single task multiplexes both streams; whichever peer
//!   has data first is forwarded. Peers may send at any time.
//! - **Turn-based**: one task per role, coordinated by a [`TurnGate`]; a
//!   role may only forward while it holds permission, which transfers to
//!   the other role after each forwarded message.
//!
//! Message boundaries are exactly the boundaries of each read; the session
//! imposes no framing and never inspects payload.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{info, warn};
use uuid::Uuid;

use relay_wire::Role;

use crate::gate::TurnGate;
use crate::transport::Connection;

/// Relay discipline for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Either peer may send at any time; a multiplexed wait forwards
    /// whichever stream is ready first
    Unordered,
    /// Strict alternation: a peer may only send while it holds the turn
    /// gate's permission
    TurnBased,
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unordered" => Ok(RelayMode::Unordered),
            "turn-based" | "turn_based" => Ok(RelayMode::TurnBased),
            other => Err(format!(
                "unknown relay mode {other:?} (expected \"unordered\" or \"turn-based\")"
            )),
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Unordered => f.write_str("unordered"),
            RelayMode::TurnBased => f.write_str("turn-based"),
        }
    }
}

/// Configuration shared by all sessions of one server
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay discipline
    pub mode: RelayMode,
    /// Upper bound on the bytes read (and therefore forwarded) per relay step
    pub read_buffer_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::Unordered,
            read_buffer_bytes: 1024,
        }
    }
}

/// Why a session ended. The role names the connection at fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer's stream reached end-of-stream
    #[error("peer {0} closed its stream")]
    PeerDisconnect(Role),

    /// Reading from the peer failed abnormally
    #[error("read from peer {0} failed")]
    ReadError(Role),

    /// Writing to the peer failed
    #[error("write to peer {0} failed")]
    WriteError(Role),
}

/// Observability events emitted by the pairing loop and sessions
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Two peers were matched into a session
    Paired {
        /// Session identifier
        session: Uuid,
        /// Peer assigned the first role
        first: std::net::SocketAddr,
        /// Peer assigned the second role
        second: std::net::SocketAddr,
    },
    /// One message was forwarded
    Relayed {
        /// Session identifier
        session: Uuid,
        /// Role whose message was forwarded
        from: Role,
        /// Size of the forwarded message
        bytes: usize,
    },
    /// The session ended and both connections were closed
    Closed {
        /// Session identifier
        session: Uuid,
        /// Why the session ended
        reason: CloseReason,
    },
}

/// One active pairing: two connections, a relay discipline, and an identity
#[derive(Debug)]
pub struct RelaySession {
    id: Uuid,
    first: Connection,
    second: Connection,
    config: SessionConfig,
    events: mpsc::Sender<SessionEvent>,
}

impl RelaySession {
    /// Create a session for a matched pair. `first` must be the older
    /// arrival; it receives the first role and, in turn-based relay, the
    /// initial send permission.
    pub fn new(
        first: Connection,
        second: Connection,
        config: SessionConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first,
            second,
            config,
            events,
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the session to completion: announce roles, relay until either
    /// stream ends, close both connections, and emit the close event.
    pub async fn run(self) {
        let RelaySession {
            id,
            mut first,
            mut second,
            config,
            events,
        } = self;

        info!(
            session = %id,
            first = %first.peer_addr(),
            second = %second.peer_addr(),
            "session started"
        );

        let reason = match announce_roles(&mut first, &mut second).await {
            Err(reason) => reason,
            Ok(()) => match config.mode {
                RelayMode::Unordered => relay_unordered(first, second, &config, &events, id).await,
                RelayMode::TurnBased => {
                    relay_turn_based(first, second, &config, &events, id).await
                }
            },
        };

        // Every path above has dropped all stream halves by now, so both
        // connections are closed before the close event goes out.
        match reason {
            CloseReason::PeerDisconnect(_) => info!(session = %id, "session ended: {reason}"),
            _ => warn!(session = %id, "session ended: {reason}"),
        }
        events
            .send(SessionEvent::Closed {
                session: id,
                reason,
            })
            .await
            .ok();
    }
}

/// Send each peer its role before any relay traffic, in both modes
async fn announce_roles(
    first: &mut Connection,
    second: &mut Connection,
) -> Result<(), CloseReason> {
    if let Err(e) = first.announce(Role::First).await {
        warn!(peer = %first.peer_addr(), "role announcement failed: {e}");
        return Err(CloseReason::WriteError(Role::First));
    }
    if let Err(e) = second.announce(Role::Second).await {
        warn!(peer = %second.peer_addr(), "role announcement failed: {e}");
        return Err(CloseReason::WriteError(Role::Second));
    }
    Ok(())
}

/// Unordered relay: one task, readiness-multiplexed over both streams
async fn relay_unordered(
    first: Connection,
    second: Connection,
    config: &SessionConfig,
    events: &mpsc::Sender<SessionEvent>,
    session: Uuid,
) -> CloseReason {
    let (mut first_rd, mut first_wr) = first.into_split();
    let (mut second_rd, mut second_wr) = second.into_split();
    let mut first_buf = BytesMut::with_capacity(config.read_buffer_bytes);
    let mut second_buf = BytesMut::with_capacity(config.read_buffer_bytes);

    loop {
        tokio::select! {
            read = first_rd.read_buf(&mut first_buf) => {
                match forward(read, &first_buf, &mut second_wr, Role::First, session).await {
                    Ok(bytes) => {
                        events
                            .send(SessionEvent::Relayed { session, from: Role::First, bytes })
                            .await
                            .ok();
                        first_buf.clear();
                    }
                    Err(reason) => return reason,
                }
            }
            read = second_rd.read_buf(&mut second_buf) => {
                match forward(read, &second_buf, &mut first_wr, Role::Second, session).await {
                    Ok(bytes) => {
                        events
                            .send(SessionEvent::Relayed { session, from: Role::Second, bytes })
                            .await
                            .ok();
                        second_buf.clear();
                    }
                    Err(reason) => return reason,
                }
            }
        }
    }
}

/// Forward the outcome of one read to the other peer verbatim
async fn forward(
    read: std::io::Result<usize>,
    buf: &BytesMut,
    peer: &mut OwnedWriteHalf,
    from: Role,
    session: Uuid,
) -> Result<usize, CloseReason> {
    match read {
        Ok(0) => Err(CloseReason::PeerDisconnect(from)),
        Ok(bytes) => {
            if let Err(e) = peer.write_all(&buf[..]).await {
                warn!(session = %session, "relay write to peer of {from} failed: {e}");
                return Err(CloseReason::WriteError(from.other()));
            }
            Ok(bytes)
        }
        Err(e) => {
            warn!(session = %session, "read from {from} failed: {e}");
            Err(CloseReason::ReadError(from))
        }
    }
}

/// Turn-based relay: one task per role, coordinated by the turn gate.
/// Whichever role's loop exits first decides the close reason; the other
/// task is aborted and drained so both write halves are dropped before the
/// caller reports the session closed.
async fn relay_turn_based(
    first: Connection,
    second: Connection,
    config: &SessionConfig,
    events: &mpsc::Sender<SessionEvent>,
    session: Uuid,
) -> CloseReason {
    let gate = Arc::new(TurnGate::new(Role::First));
    let (first_rd, first_wr) = first.into_split();
    let (second_rd, second_wr) = second.into_split();

    let mut first_task = tokio::spawn(relay_role(
        Role::First,
        first_rd,
        second_wr,
        Arc::clone(&gate),
        config.read_buffer_bytes,
        events.clone(),
        session,
    ));
    let mut second_task = tokio::spawn(relay_role(
        Role::Second,
        second_rd,
        first_wr,
        gate,
        config.read_buffer_bytes,
        events.clone(),
        session,
    ));

    let (reason, remaining) = tokio::select! {
        finished = &mut first_task => (close_reason_of(finished, Role::First), second_task),
        finished = &mut second_task => (close_reason_of(finished, Role::Second), first_task),
    };
    remaining.abort();
    let _ = remaining.await;
    reason
}

fn close_reason_of(finished: Result<CloseReason, JoinError>, role: Role) -> CloseReason {
    match finished {
        Ok(reason) => reason,
        Err(e) => {
            warn!("relay task for {role} failed: {e}");
            CloseReason::ReadError(role)
        }
    }
}

/// One role's forwarding loop: acquire permission, read one message,
/// forward it, hand permission to the other role. End-of-stream or an error
/// terminates the loop without releasing permission further; the gate is
/// scoped to the session's lifetime only.
async fn relay_role(
    role: Role,
    mut rd: OwnedReadHalf,
    mut peer_wr: OwnedWriteHalf,
    gate: Arc<TurnGate>,
    read_buffer_bytes: usize,
    events: mpsc::Sender<SessionEvent>,
    session: Uuid,
) -> CloseReason {
    let mut buf = BytesMut::with_capacity(read_buffer_bytes);
    loop {
        gate.acquire(role).await;
        buf.clear();
        match rd.read_buf(&mut buf).await {
            Ok(0) => return CloseReason::PeerDisconnect(role),
            Ok(bytes) => {
                if let Err(e) = peer_wr.write_all(&buf[..]).await {
                    warn!(session = %session, "relay write to peer of {role} failed: {e}");
                    return CloseReason::WriteError(role.other());
                }
                events
                    .send(SessionEvent::Relayed { session, from: role, bytes })
                    .await
                    .ok();
                gate.release(role, role.other());
            }
            Err(e) => {
                warn!(session = %session, "read from {role} failed: {e}");
                return CloseReason::ReadError(role);
            }
        }
    }
}
