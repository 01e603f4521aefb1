//! Connection ids and in-flight accounting.
//!
//! Every accepted client gets an id for log correlation. The tracker counts
//! open connections so shutdown can wait for them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Identifier carried through every log line of one client exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Ids handed out by a [`ConnectionTracker`] are unique per tracker.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    open: AtomicU64,
    closed: Notify,
}

/// Issues ids and counts open connections.
///
/// Owned by the accept loop; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection. It stays counted until the guard drops.
    pub fn track(&self) -> ConnectionGuard {
        let id = ConnectionId(self.counters.issued.fetch_add(1, Ordering::Relaxed) + 1);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Wait until every connection has closed or `timeout` elapses.
    ///
    /// Returns whether the tracker drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let closed = self.counters.closed.notified();
                if self.active_count() == 0 {
                    return;
                }
                closed.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// One open connection. Dropping it closes the slot and wakes any drain.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.counters.open.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counters.closed.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let tracker = ConnectionTracker::new();
        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(first.id().as_u64(), 1);
        assert_eq!(second.id().as_u64(), 2);
        assert!(first.id() < second.id());
    }

    #[test]
    fn clones_share_counters() {
        let tracker = ConnectionTracker::new();
        let other = tracker.clone();
        let a = tracker.track();
        let b = other.track();
        assert_ne!(a.id(), b.id());
        assert_eq!(tracker.active_count(), 2);
    }

    #[test]
    fn guards_release_on_drop() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track();
        let b = tracker.track();
        drop(a);
        assert_eq!(tracker.active_count(), 1);
        drop(b);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.wait_for_drain(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn drain_waits_for_last_guard() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        assert!(!tracker.wait_for_drain(Duration::from_millis(50)).await);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(tracker.wait_for_drain(Duration::from_secs(2)).await);
    }

    #[test]
    fn display() {
        assert_eq!(ConnectionId::from_raw(7).to_string(), "#7");
    }
}
