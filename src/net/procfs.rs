// Kernel socket table feed
//
// Polls /proc/net/tcp and /proc/net/tcp6 and mirrors the connections into
// the shared table. Read-only with respect to the system.
//
// The kernel table has no byte counters, so connections fed from here
// report zero throughput; activity is inferred from state and queue changes.

use super::{ConnectionKey, ConnectionTable, TcpState};
use crate::app::config::TrackerConfig;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROC_TCP: &str = "/proc/net/tcp";
const PROC_TCP6: &str = "/proc/net/tcp6";

/// One row of a kernel socket table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub key: ConnectionKey,
    /// `None` for listening sockets, which are not connections
    pub state: Option<TcpState>,
    pub tx_queue: u32,
    pub rx_queue: u32,
}

/// Map a kernel TCP state code to a connection state
fn state_from_hex(hex_str: &str) -> Option<TcpState> {
    match hex_str {
        "01" => Some(TcpState::Established),
        "02" => Some(TcpState::SynSent),
        "03" => Some(TcpState::SynAckAck),
        "04" | "05" | "06" | "08" | "09" | "0B" => Some(TcpState::Closing),
        "07" => Some(TcpState::Closed),
        // LISTEN and anything unknown
        _ => None,
    }
}

/// Parse a whole kernel table, skipping the header and malformed lines
pub fn parse_table(content: &str) -> Vec<SocketEntry> {
    content.lines().skip(1).filter_map(parse_tcp_line).collect()
}

/// Parse a single line of /proc/net/tcp or /proc/net/tcp6
fn parse_tcp_line(line: &str) -> Option<SocketEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    // sl  local_address rem_address   st tx_queue:rx_queue tr tm->when retrnsmt   uid  timeout inode
    // 0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345
    if parts.len() < 10 {
        return None;
    }

    let (src_addr, src_port) = parse_address(parts[1])?;
    let (dst_addr, dst_port) = parse_address(parts[2])?;
    let state = state_from_hex(parts[3]);

    let (tx, rx) = parts[4].split_once(':')?;
    let tx_queue = u32::from_str_radix(tx, 16).ok()?;
    let rx_queue = u32::from_str_radix(rx, 16).ok()?;

    Some(SocketEntry {
        key: ConnectionKey::new(src_addr, src_port, dst_addr, dst_port),
        state,
        tx_queue,
        rx_queue,
    })
}

/// Parse `HEXIP:HEXPORT`, e.g. "0100007F:1F90" = 127.0.0.1:8080
fn parse_address(addr_str: &str) -> Option<(IpAddr, u16)> {
    let (ip, port) = addr_str.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    let ip = match ip.len() {
        8 => IpAddr::V4(parse_hex_ipv4(ip)?),
        32 => IpAddr::V6(parse_hex_ipv6(ip)?),
        _ => return None,
    };

    Some((ip, port))
}

/// The kernel prints each 32-bit word in host (little-endian) order
fn parse_hex_word(hex: &str) -> Option<[u8; 4]> {
    u32::from_str_radix(hex, 16).ok().map(u32::to_le_bytes)
}

fn parse_hex_ipv4(hex_ip: &str) -> Option<Ipv4Addr> {
    parse_hex_word(hex_ip).map(Ipv4Addr::from)
}

fn parse_hex_ipv6(hex_ip: &str) -> Option<Ipv6Addr> {
    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word = hex_ip.get(i * 8..i * 8 + 8)?;
        chunk.copy_from_slice(&parse_hex_word(word)?);
    }
    Some(Ipv6Addr::from(octets))
}

/// Read both kernel tables; a missing tcp6 table is not an error
fn read_sockets() -> io::Result<Vec<SocketEntry>> {
    let content = fs::read_to_string(PROC_TCP)
        .map_err(|e| io::Error::new(e.kind(), format!("Cannot read {}: {}", PROC_TCP, e)))?;
    let mut entries = parse_table(&content);

    match fs::read_to_string(PROC_TCP6) {
        Ok(content) => entries.extend(parse_table(&content)),
        Err(e) => debug!(error = %e, "No IPv6 socket table"),
    }

    Ok(entries)
}

/// Mirrors kernel sockets into the table between polls
#[derive(Debug, Default)]
struct Mirror {
    /// Queue sizes seen at the previous poll, for activity detection
    queues: HashMap<ConnectionKey, (u32, u32)>,
}

impl Mirror {
    fn apply(&mut self, table: &ConnectionTable, entries: &[SocketEntry], now: Instant) {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut queues = HashMap::with_capacity(entries.len());
        let mut inner = table.guard();

        for entry in entries {
            let Some(state) = entry.state else { continue };
            let current = (entry.tx_queue, entry.rx_queue);
            let active = self.queues.get(&entry.key) != Some(&current);

            inner.upsert(entry.key, state, active, now);
            seen.insert(entry.key);
            queues.insert(entry.key, current);
        }

        let vanished: Vec<ConnectionKey> =
            inner.keys().filter(|k| !seen.contains(*k)).copied().collect();
        for key in &vanished {
            inner.mark_closed(key);
        }

        self.queues = queues;
    }
}

/// Background poller feeding a `ConnectionTable` from the kernel tables
pub struct ProcTracker {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProcTracker {
    /// Start the polling thread
    pub fn spawn(table: Arc<ConnectionTable>, config: TrackerConfig) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("proc-tracker".into())
            .spawn(move || run(&table, &config, &flag))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signal the poller and wait for it to exit
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Tracker thread panicked");
            }
        }
    }
}

impl Drop for ProcTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(table: &ConnectionTable, config: &TrackerConfig, shutdown: &AtomicBool) {
    info!(interval_ms = config.poll_interval.as_millis() as u64, "Tracker started");
    let mut mirror = Mirror::default();
    let mut failing = false;

    while !shutdown.load(Ordering::Relaxed) {
        match read_sockets() {
            Ok(entries) => {
                if failing {
                    info!("Kernel socket table readable again");
                    failing = false;
                }
                let now = Instant::now();
                mirror.apply(table, &entries, now);
                table.sweep(now, config.closed_timeout);
            }
            Err(e) => {
                if !failing {
                    warn!(error = %e, "Cannot poll kernel socket table");
                    failing = true;
                }
            }
        }

        sleep_unless_stopped(config.poll_interval, shutdown);
    }

    info!("Tracker stopped");
}

/// Sleep in short slices so `stop` does not wait a whole poll interval
fn sleep_unless_stopped(total: Duration, shutdown: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TCP: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 1 0000000000000000 100 0 0 10 0
   1: 0F02000A:C350 22D8B85D:01BB 01 00000010:00000000 01:00000014 00000000  1000        0 23456 1 0000000000000000 20 4 30 10 -1
   2: 0F02000A:C351 22D8B85D:0050 02 00000000:00000000 01:00000014 00000000  1000        0 34567 1 0000000000000000 20 4 30 10 -1
garbage line
";

    #[test]
    fn test_parse_hex_ipv4() {
        assert_eq!(parse_hex_ipv4("0100007F"), Some(Ipv4Addr::LOCALHOST));
        assert_eq!(parse_hex_ipv4("00000000"), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(parse_hex_ipv4("zz00007F"), None);
    }

    #[test]
    fn test_parse_hex_ipv6() {
        assert_eq!(
            parse_hex_ipv6("00000000000000000000000001000000"),
            Some(Ipv6Addr::LOCALHOST)
        );
        assert_eq!(parse_hex_ipv6("0000"), None);
    }

    #[test]
    fn test_parse_address() {
        let result = parse_address("0100007F:1F90");
        assert_eq!(result, Some((IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)));
        assert_eq!(parse_address("0100007F"), None);
        assert_eq!(parse_address("01007F:1F90"), None);
    }

    #[test]
    fn test_state_from_hex() {
        assert_eq!(state_from_hex("01"), Some(TcpState::Established));
        assert_eq!(state_from_hex("02"), Some(TcpState::SynSent));
        assert_eq!(state_from_hex("03"), Some(TcpState::SynAckAck));
        assert_eq!(state_from_hex("06"), Some(TcpState::Closing));
        assert_eq!(state_from_hex("07"), Some(TcpState::Closed));
        assert_eq!(state_from_hex("0A"), None);
    }

    #[test]
    fn test_parse_table() {
        let entries = parse_table(SAMPLE_TCP);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].state, None);

        let established = &entries[1];
        assert_eq!(established.state, Some(TcpState::Established));
        assert_eq!(established.key.src_addr, IpAddr::V4(Ipv4Addr::new(10, 0, 2, 15)));
        assert_eq!(established.key.src_port, 50000);
        assert_eq!(established.key.dst_addr, IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)));
        assert_eq!(established.key.dst_port, 443);
        assert_eq!((established.tx_queue, established.rx_queue), (16, 0));
    }

    #[test]
    fn test_mirror_skips_listeners_and_closes_vanished() {
        let table = ConnectionTable::new();
        let mut mirror = Mirror::default();
        let entries = parse_table(SAMPLE_TCP);
        let now = Instant::now();

        mirror.apply(&table, &entries, now);
        assert_eq!(table.guard().len(), 2);

        // Second poll: only the established connection remains
        mirror.apply(&table, &entries[1..2], now + Duration::from_secs(1));
        let inner = table.guard();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner.get(&entries[1].key).map(|c| c.state), Some(TcpState::Established));
        assert_eq!(inner.get(&entries[2].key).map(|c| c.state), Some(TcpState::Closed));
    }

    #[test]
    fn test_mirror_queue_change_counts_as_activity() {
        let table = ConnectionTable::new();
        let mut mirror = Mirror::default();
        let mut entries = parse_table(SAMPLE_TCP);
        let start = Instant::now();
        let later = start + Duration::from_secs(2);

        mirror.apply(&table, &entries, start);
        mirror.apply(&table, &entries, later);
        assert_eq!(table.guard().get(&entries[1].key).map(|c| c.last_activity), Some(start));

        entries[1].rx_queue = 64;
        mirror.apply(&table, &entries, later);
        assert_eq!(table.guard().get(&entries[1].key).map(|c| c.last_activity), Some(later));
    }

    #[test]
    fn test_tracker_stops_promptly() {
        let table = Arc::new(ConnectionTable::new());
        let config = TrackerConfig {
            poll_interval: Duration::from_secs(30),
            closed_timeout: Duration::from_secs(3),
        };
        let mut tracker = ProcTracker::spawn(table, config).expect("spawn tracker");

        let started = Instant::now();
        tracker.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
