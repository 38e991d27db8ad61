//! FIFO holding area for connections not yet paired.

use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Ordered queue of waiting entries; first arrived, first matched.
///
/// An entry is in at most one of {queue, active session}: `push` either
/// keeps the entry waiting or hands back a complete pair, never both.
#[derive(Debug, Default)]
pub struct WaitingQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> WaitingQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an entry; if that makes two available, atomically remove and
    /// return the two oldest (oldest first).
    pub async fn push(&self, entry: T) -> Option<(T, T)> {
        let mut queue = self.inner.lock().await;
        queue.push_back(entry);
        if queue.len() < 2 {
            return None;
        }
        match (queue.pop_front(), queue.pop_front()) {
            (Some(oldest), Some(next)) => Some((oldest, next)),
            _ => None,
        }
    }

    /// Number of entries currently waiting
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no entry is waiting
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
