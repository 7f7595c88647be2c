// Shared connection table
//
// The store the capture side writes into and the display engine reads from.
// Records keep first-seen order; that order is what the unsorted view shows.

use super::{
    ConnectionContainer, ConnectionKey, ConnectionView, LockedConnections, Snapshot, TcpState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// One tracked connection as owned by the table
#[derive(Debug, Clone)]
pub struct Connection {
    pub key: ConnectionKey,
    pub state: TcpState,
    /// Last time any activity was recorded for this connection
    pub last_activity: Instant,
    pub bytes_per_second: u64,
    pub total_bytes: u64,
}

impl Connection {
    pub fn new(key: ConnectionKey, state: TcpState, now: Instant) -> Self {
        Self {
            key,
            state,
            last_activity: now,
            bytes_per_second: 0,
            total_bytes: 0,
        }
    }

    /// Copy of this record with idle time measured at `now`
    pub fn view_at(&self, now: Instant) -> ConnectionView {
        ConnectionView {
            key: self.key,
            state: self.state,
            idle: now.saturating_duration_since(self.last_activity),
            bytes_per_second: self.bytes_per_second,
            total_bytes: self.total_bytes,
        }
    }
}

/// Table contents, only reachable through the table lock
#[derive(Debug, Default)]
pub struct TableInner {
    connections: Vec<Connection>,
}

impl TableInner {
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    #[allow(dead_code)]
    pub fn get(&self, key: &ConnectionKey) -> Option<&Connection> {
        self.connections.iter().find(|c| c.key == *key)
    }

    fn get_mut(&mut self, key: &ConnectionKey) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.key == *key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConnectionKey> {
        self.connections.iter().map(|c| &c.key)
    }

    /// Insert a new connection or record activity on an existing one.
    ///
    /// Activity is recorded (idle reset) only when the state changes or
    /// `active` is set.
    pub fn upsert(&mut self, key: ConnectionKey, state: TcpState, active: bool, now: Instant) {
        match self.get_mut(&key) {
            Some(conn) => {
                if conn.state != state || active {
                    conn.last_activity = now;
                }
                conn.state = state;
            }
            None => self.connections.push(Connection::new(key, state, now)),
        }
    }

    /// Set throughput figures supplied by the bandwidth side
    #[allow(dead_code)]
    pub fn update_throughput(&mut self, key: &ConnectionKey, bytes_per_second: u64, total_bytes: u64) {
        if let Some(conn) = self.get_mut(key) {
            conn.bytes_per_second = bytes_per_second;
            conn.total_bytes = total_bytes;
        }
    }

    /// Mark a connection as closed; its activity time is left alone so
    /// the closed timeout counts from its last real activity.
    pub fn mark_closed(&mut self, key: &ConnectionKey) {
        if let Some(conn) = self.get_mut(key) {
            if !conn.state.is_finished() {
                conn.state = TcpState::Closed;
                conn.bytes_per_second = 0;
            }
        }
    }

    fn evict_finished(&mut self, now: Instant, closed_timeout: Duration) -> usize {
        let before = self.connections.len();
        self.connections.retain(|c| {
            !(c.state.is_finished()
                && now.saturating_duration_since(c.last_activity) >= closed_timeout)
        });
        before - self.connections.len()
    }
}

impl LockedConnections for MutexGuard<'_, TableInner> {
    fn num_connections(&self) -> usize {
        self.len()
    }

    fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        Snapshot::new(self.connections.iter().map(|c| c.view_at(now)).collect())
    }
}

/// Thread-safe connection table with a switch for eviction
#[derive(Debug)]
pub struct ConnectionTable {
    inner: Mutex<TableInner>,
    purge_enabled: AtomicBool,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner::default()),
            purge_enabled: AtomicBool::new(true),
        }
    }

    /// Lock the table for a batch of reads or mutations
    pub fn guard(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn purge_enabled(&self) -> bool {
        self.purge_enabled.load(Ordering::Acquire)
    }

    /// Drop finished connections idle for at least `closed_timeout`.
    ///
    /// Does nothing while purging is suspended. Returns the number evicted.
    pub fn sweep(&self, now: Instant, closed_timeout: Duration) -> usize {
        let mut inner = self.guard();
        // Checked under the lock so a concurrent pause cannot interleave
        if !self.purge_enabled() {
            return 0;
        }
        let evicted = inner.evict_finished(now, closed_timeout);
        if evicted > 0 {
            debug!(evicted, remaining = inner.len(), "Evicted finished connections");
        }
        evicted
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionContainer for ConnectionTable {
    fn lock(&self) -> Box<dyn LockedConnections + '_> {
        Box::new(self.guard())
    }

    fn purge(&self, enable: bool) {
        let _inner = self.guard();
        self.purge_enabled.store(enable, Ordering::Release);
        debug!(enable, "Connection purging toggled");
    }
}
