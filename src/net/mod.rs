// Connection records and the container seam
//
// The display engine only ever reads connections. It does so through the
// `ConnectionContainer` trait: lock the container, ask for the count or a
// point-in-time `Snapshot`, release. Everything handed out of the lock is an
// owned copy.

pub mod procfs;
pub mod table;

use crate::app::SortMode;
use std::cmp::Reverse;
use std::net::IpAddr;
use std::time::Duration;

pub use table::ConnectionTable;

/// Lifecycle state of a tracked TCP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpState {
    /// SYN seen, waiting for SYN/ACK
    SynSent,
    /// SYN/ACK seen, waiting for the final ACK
    SynAckAck,
    Established,
    /// FIN exchange in progress
    Closing,
    Closed,
    Reset,
}

impl TcpState {
    /// Normalized label used in the table and in the export file
    pub fn label(self) -> &'static str {
        match self {
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynAckAck => "SYNACK_ACK",
            TcpState::Established => "ESTABLISHED",
            TcpState::Closing => "CLOSING",
            TcpState::Closed => "CLOSED",
            TcpState::Reset => "RESET",
        }
    }

    /// Closed and reset connections are candidates for eviction
    pub fn is_finished(self) -> bool {
        matches!(self, TcpState::Closed | TcpState::Reset)
    }
}

/// Identity of a connection: both endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub src_addr: IpAddr,
    pub src_port: u16,
    pub dst_addr: IpAddr,
    pub dst_port: u16,
}

impl ConnectionKey {
    pub fn new(src_addr: IpAddr, src_port: u16, dst_addr: IpAddr, dst_port: u16) -> Self {
        Self {
            src_addr,
            src_port,
            dst_addr,
            dst_port,
        }
    }
}

/// Read-only copy of one connection, taken while the container was locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionView {
    pub key: ConnectionKey,
    pub state: TcpState,
    /// Idle time at the instant the snapshot was taken
    pub idle: Duration,
    /// Instantaneous payload throughput
    pub bytes_per_second: u64,
    /// Payload bytes seen over the lifetime of the connection
    pub total_bytes: u64,
}

impl ConnectionView {
    pub fn idle_seconds(&self) -> u64 {
        self.idle.as_secs()
    }

    /// `addr:port` of the initiating side
    pub fn client(&self) -> String {
        format_endpoint(self.key.src_addr, self.key.src_port)
    }

    /// `addr:port` of the accepting side
    pub fn server(&self) -> String {
        format_endpoint(self.key.dst_addr, self.key.dst_port)
    }
}

fn format_endpoint(addr: IpAddr, port: u16) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{}:{}", v4, port),
        IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
    }
}

/// Point-in-time copy of the container's connections with a read cursor.
///
/// Obtained under the container lock, but owns its data: it may be kept
/// across render cycles (pause) and read without the lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<ConnectionView>,
    cursor: usize,
}

impl Snapshot {
    pub fn new(entries: Vec<ConnectionView>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move the cursor back to the first entry
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Return the entry under the cursor and advance
    pub fn next_entry(&mut self) -> Option<&ConnectionView> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    /// Reorder entries in place by the given metric and rewind.
    ///
    /// Rate and bytes sort highest first; idle sorts most idle first so
    /// stale connections surface at the top. The sort is stable.
    pub fn sort(&mut self, mode: SortMode) {
        match mode {
            SortMode::Unsorted => {}
            SortMode::ByRate => self.entries.sort_by_key(|c| Reverse(c.bytes_per_second)),
            SortMode::ByBytes => self.entries.sort_by_key(|c| Reverse(c.total_bytes)),
            SortMode::ByIdle => self.entries.sort_by_key(|c| Reverse(c.idle)),
        }
        self.rewind();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionView> {
        self.entries.iter()
    }

    /// Sum of every entry's throughput
    #[allow(dead_code)]
    pub fn total_bytes_per_second(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.bytes_per_second))
    }
}

/// Connections visible while the container lock is held
pub trait LockedConnections {
    fn num_connections(&self) -> usize;

    /// Copy the current connections into an owned snapshot
    fn snapshot(&self) -> Snapshot;
}

/// Thread-safe store of live connections, shared with the capture side.
///
/// The guard returned by `lock` holds the container lock until dropped.
pub trait ConnectionContainer: Send + Sync {
    fn lock(&self) -> Box<dyn LockedConnections + '_>;

    /// Enable or suspend aging/eviction of finished connections
    fn purge(&self, enable: bool);
}


#[cfg(test)]
mod tests {
    use super::test_support::view;
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_state_labels() {
        assert_eq!(TcpState::SynSent.label(), "SYN_SENT");
        assert_eq!(TcpState::SynAckAck.label(), "SYNACK_ACK");
        assert_eq!(TcpState::Established.label(), "ESTABLISHED");
        assert_eq!(TcpState::Closing.label(), "CLOSING");
        assert_eq!(TcpState::Closed.label(), "CLOSED");
        assert_eq!(TcpState::Reset.label(), "RESET");
    }

    #[test]
    fn test_endpoint_formatting() {
        let mut v = view(5000, 0, 0, 0);
        assert_eq!(v.client(), "10.0.0.1:5000");
        assert_eq!(v.server(), "192.168.1.1:443");

        v.key.dst_addr = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(v.server(), "[::1]:443");
    }

    #[test]
    fn test_cursor_rewind() {
        let mut snap = Snapshot::new(vec![view(1, 0, 0, 0), view(2, 0, 0, 0)]);
        assert_eq!(snap.next_entry().map(|c| c.key.src_port), Some(1));
        assert_eq!(snap.next_entry().map(|c| c.key.src_port), Some(2));
        assert!(snap.next_entry().is_none());

        snap.rewind();
        assert_eq!(snap.next_entry().map(|c| c.key.src_port), Some(1));
    }

    #[test]
    fn test_sort_orders() {
        let entries = vec![view(1, 10, 900, 5), view(2, 30, 100, 1), view(3, 20, 500, 9)];
        let ports = |s: &Snapshot| s.iter().map(|c| c.key.src_port).collect::<Vec<_>>();

        let mut snap = Snapshot::new(entries.clone());
        snap.sort(SortMode::Unsorted);
        assert_eq!(ports(&snap), vec![1, 2, 3]);

        snap.sort(SortMode::ByRate);
        assert_eq!(ports(&snap), vec![2, 3, 1]);

        snap.sort(SortMode::ByBytes);
        assert_eq!(ports(&snap), vec![1, 3, 2]);

        snap.sort(SortMode::ByIdle);
        assert_eq!(ports(&snap), vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_rewinds_cursor() {
        let mut snap = Snapshot::new(vec![view(1, 1, 0, 0), view(2, 2, 0, 0)]);
        snap.next_entry();
        snap.next_entry();
        snap.sort(SortMode::ByRate);
        assert_eq!(snap.next_entry().map(|c| c.key.src_port), Some(2));
    }

    fn arb_views() -> impl Strategy<Value = Vec<ConnectionView>> {
        prop::collection::vec(
            (any::<u16>(), 0u64..1 << 40, 0u64..1 << 50, 0u64..100_000)
                .prop_map(|(p, bps, total, idle)| view(p, bps, total, idle)),
            0..40,
        )
    }

    fn arb_mode() -> impl Strategy<Value = SortMode> {
        prop_oneof![
            Just(SortMode::Unsorted),
            Just(SortMode::ByRate),
            Just(SortMode::ByBytes),
            Just(SortMode::ByIdle),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Sorting never drops, duplicates or alters entries, so the
        /// throughput total is the same before and after.
        #[test]
        fn prop_sort_preserves_entries(entries in arb_views(), mode in arb_mode()) {
            let expected_total: u64 = entries.iter().map(|c| c.bytes_per_second).sum();

            let mut snap = Snapshot::new(entries.clone());
            snap.sort(mode);

            prop_assert_eq!(snap.len(), entries.len());
            prop_assert_eq!(snap.total_bytes_per_second(), expected_total);

            let mut before = entries;
            let mut after: Vec<ConnectionView> = snap.iter().cloned().collect();
            let order = |c: &ConnectionView| (c.key.src_port, c.bytes_per_second, c.total_bytes, c.idle);
            before.sort_by_key(order);
            after.sort_by_key(order);
            prop_assert_eq!(before, after);
        }
    }
}
