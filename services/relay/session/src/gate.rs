//! Turn gate: mutual exclusion with explicit hand-off between two roles.
//!
//! Exactly one role holds send permission at any instant after
//! initialization. Permission moves only through [`TurnGate::release`],
//! which the holding role calls after completing one full relay step.
//!
//! There is deliberately no timeout: a holder that never sends and never
//! disconnects stalls its own session, and the other role stays correctly
//! blocked on its turn. The only recovery is session termination driven by
//! disconnect detection on the stalled connection.

use relay_wire::Role;
use tokio::sync::watch;

/// Two-state permission gate for one relay session
#[derive(Debug)]
pub struct TurnGate {
    holder: watch::Sender<Role>,
}

impl TurnGate {
    /// Create a gate with `initial` holding permission
    pub fn new(initial: Role) -> Self {
        let (holder, _) = watch::channel(initial);
        Self { holder }
    }

    /// Wait until `role` holds permission
    pub async fn acquire(&self, role: Role) {
        let mut rx = self.holder.subscribe();
        // wait_for inspects the current value before sleeping, so a grant
        // that happened before this call is never missed
        let _ = rx.wait_for(|holder| *holder == role).await;
    }

    /// Atomically transfer permission from `from` to `to`
    pub fn release(&self, from: Role, to: Role) {
        debug_assert_eq!(*self.holder.borrow(), from);
        self.holder.send_replace(to);
    }

    /// The role currently holding permission
    pub fn current(&self) -> Role {
        *self.holder.borrow()
    }
}
