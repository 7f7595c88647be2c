// Application configuration types
//
// This module contains configuration constants and structs for:
// - The display engine (tick rate, export target, minimum terminal size)
// - The kernel table tracker (poll interval, closed-connection timeout)

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default input poll timeout per render cycle in milliseconds
pub const DEFAULT_TICK_MS: u64 = 50;

/// Minimum tick in milliseconds
pub const MIN_TICK_MS: u64 = 1;

/// Maximum tick in milliseconds; longer would make input feel stuck
pub const MAX_TICK_MS: u64 = 1000;

/// Narrowest terminal the table layout fits into
pub const MIN_COLUMNS: u16 = 80;

/// Header row, one connection row and the status line
pub const MIN_ROWS: u16 = 3;

/// Export file written on every render cycle
pub const DEFAULT_EXPORT_PATH: &str = "data.json";

/// Default interval between kernel socket table polls in milliseconds
pub const DEFAULT_POLL_MS: u64 = 1000;

/// How long closed or reset connections stay listed, in seconds
pub const DEFAULT_CLOSED_TIMEOUT_SECS: u64 = 3;

// ============================================================================
// Configuration Structs
// ============================================================================

/// Display engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on how long one cycle waits for a key press
    pub tick: Duration,

    /// Where the JSON snapshot goes; `None` disables the export
    pub export_path: Option<PathBuf>,

    pub min_columns: u16,

    pub min_rows: u16,
}

impl EngineConfig {
    /// Create an EngineConfig with default values
    pub fn new() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            export_path: Some(PathBuf::from(DEFAULT_EXPORT_PATH)),
            min_columns: MIN_COLUMNS,
            min_rows: MIN_ROWS,
        }
    }

    /// Set the tick, clamped to `MIN_TICK_MS..=MAX_TICK_MS`
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick = Duration::from_millis(tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS));
        self
    }

    pub fn with_export_path(mut self, export_path: Option<PathBuf>) -> Self {
        self.export_path = export_path;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel socket table tracker settings
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,

    /// Closed and reset connections are evicted after this much idle time
    pub closed_timeout: Duration,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            closed_timeout: Duration::from_secs(DEFAULT_CLOSED_TIMEOUT_SECS),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
