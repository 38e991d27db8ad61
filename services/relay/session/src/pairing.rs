//! The accept-and-pair loop.
//!
//! Accepts connections indefinitely, parks lone arrivals in the waiting
//! queue, and launches a relay session whenever two are available. Once a
//! pair is handed to its session the loop retains no reference to either
//! connection.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::queue::WaitingQueue;
use crate::registry::{Reclaim, SessionMeta, SessionRegistry};
use crate::session::{RelaySession, SessionConfig, SessionEvent};
use crate::transport::Connection;

/// Run the pairing loop until the process exits.
///
/// Matching is strict arrival order: the older of the two dequeued
/// connections becomes the first role. A failed accept is logged and the
/// loop continues; it never terminates the server. There is no timeout on
/// how long a lone connection waits.
pub async fn run_pairing(
    listener: TcpListener,
    config: SessionConfig,
    registry: Arc<SessionRegistry>,
    reaper_tx: mpsc::UnboundedSender<Reclaim>,
    events: mpsc::Sender<SessionEvent>,
) {
    let queue = WaitingQueue::new();

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        info!(%peer, "client connected");

        let Some((first, second)) = queue.push(Connection::new(stream, peer)).await else {
            continue;
        };

        let first_addr = first.peer_addr();
        let second_addr = second.peer_addr();
        let session = RelaySession::new(first, second, config.clone(), events.clone());
        let id = session.id();

        // Register before spawning so the reaper can never observe an
        // unknown identifier for a session that is still starting up.
        registry.insert(
            id,
            SessionMeta {
                first: first_addr,
                second: second_addr,
            },
        );
        info!(session = %id, first = %first_addr, second = %second_addr, "session paired");
        events
            .send(SessionEvent::Paired {
                session: id,
                first: first_addr,
                second: second_addr,
            })
            .await
            .ok();

        let worker = tokio::spawn(session.run());
        if reaper_tx.send(Reclaim { session: id, worker }).is_err() {
            // Reaper gone (shutdown path); drop the entry ourselves so the
            // registry still converges.
            registry.reclaim(id);
        }
    }
}
