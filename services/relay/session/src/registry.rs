//! In-flight session registry and zombie reaping.
//!
//! The pairing loop registers every session it spawns, then hands the
//! worker's [`JoinHandle`] to a single continuously-running reaper task.
//! The reaper awaits each handle (a completion notification, not a poll
//! loop) and removes the registry entry once the worker has fully exited,
//! so session teardown never blocks the pairing loop or other sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Peer endpoints of an in-flight session, kept for observability
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Address of the peer holding the first role
    pub first: SocketAddr,
    /// Address of the peer holding the second role
    pub second: SocketAddr,
}

/// Process-wide set of in-flight relay sessions.
///
/// Entries are added by the pairing loop at spawn time and removed by the
/// reaper once the session worker has exited; the set converges to empty
/// when all sessions terminate.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: DashMap<Uuid, SessionMeta>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record a spawned session
    pub fn insert(&self, session: Uuid, meta: SessionMeta) {
        self.inner.insert(session, meta);
    }

    /// Remove a terminated session. Removing an identifier that is not
    /// registered is a no-op, never fatal.
    pub fn reclaim(&self, session: Uuid) -> bool {
        match self.inner.remove(&session) {
            Some(_) => true,
            None => {
                debug!(%session, "reclaim for unregistered session ignored");
                false
            }
        }
    }

    /// Number of sessions currently in flight
    pub fn active(&self) -> usize {
        self.inner.len()
    }

    /// Whether the given session is still registered
    pub fn contains(&self, session: Uuid) -> bool {
        self.inner.contains_key(&session)
    }
}

/// A session worker handed to the reaper for reclamation
#[derive(Debug)]
pub struct Reclaim {
    /// Identifier of the session the worker ran
    pub session: Uuid,
    /// Handle of the worker task
    pub worker: JoinHandle<()>,
}

/// Drain terminated session workers.
///
/// Runs until the sending side of `pending` is dropped. Tolerates zero, one,
/// or many concurrently terminating sessions; a worker that is still running
/// when its turn comes simply parks the reaper on that handle without
/// affecting the pairing loop or any session.
pub async fn run_reaper(
    registry: Arc<SessionRegistry>,
    mut pending: mpsc::UnboundedReceiver<Reclaim>,
) {
    while let Some(Reclaim { session, worker }) = pending.recv().await {
        if let Err(e) = worker.await {
            warn!(%session, "session worker did not exit cleanly: {e}");
        }
        registry.reclaim(session);
        debug!(%session, "session worker reclaimed");
    }
}
