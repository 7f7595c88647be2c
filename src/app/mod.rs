// Display state management
//
// This module contains the state owned by the render thread (scroll offset,
// sort mode, pause flag and the held snapshot) and re-exports the engine and
// configuration types.

pub mod config;
pub mod engine;
pub mod event;

pub use config::{EngineConfig, TrackerConfig};
pub use engine::{DisplayEngine, EngineState};
pub use event::Command;

use crate::net::{ConnectionContainer, LockedConnections, Snapshot};
use tracing::{debug, info};

/// Metric the connection table is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Container order (first seen first)
    #[default]
    Unsorted,
    /// Highest throughput first
    ByRate,
    /// Most bytes transferred first
    ByBytes,
    /// Most idle first
    ByIdle,
}

impl SortMode {
    /// Next mode in the fixed cycle Unsorted → Rate → Bytes → Idle → Unsorted
    pub fn next(self) -> Self {
        match self {
            SortMode::Unsorted => SortMode::ByRate,
            SortMode::ByRate => SortMode::ByBytes,
            SortMode::ByBytes => SortMode::ByIdle,
            SortMode::ByIdle => SortMode::Unsorted,
        }
    }

    /// Short name for the status line
    pub fn label(self) -> &'static str {
        match self {
            SortMode::Unsorted => "none",
            SortMode::ByRate => "rate",
            SortMode::ByBytes => "bytes",
            SortMode::ByIdle => "idle",
        }
    }
}

/// State of the render loop, owned by the render thread
#[derive(Debug, Default)]
pub struct DisplayState {
    /// Index of the first visible connection
    pub scroll_offset: usize,

    pub sort_mode: SortMode,

    pub paused: bool,

    /// Held across cycles only while paused
    snapshot: Option<Snapshot>,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a display command.
    ///
    /// `RequestShutdown` does not touch display state; the engine forwards
    /// it to the application.
    pub fn apply(&mut self, command: Command, container: &dyn ConnectionContainer) {
        match command {
            Command::ScrollDown => self.scroll_down(),
            Command::ScrollUp => self.scroll_up(),
            Command::CycleSort => self.cycle_sort(),
            Command::TogglePause => self.toggle_pause(container),
            Command::RequestShutdown => {}
        }
    }

    /// Move the window down; bounded later by `clamp_scroll`
    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn cycle_sort(&mut self) {
        self.sort_mode = self.sort_mode.next();
        debug!(sort = self.sort_mode.label(), "Sort mode changed");
    }

    /// Freeze or unfreeze the table.
    ///
    /// Pausing suspends eviction in the container so frozen rows stay
    /// meaningful. Unpausing re-enables it and drops the held snapshot.
    pub fn toggle_pause(&mut self, container: &dyn ConnectionContainer) {
        if self.paused {
            self.paused = false;
            container.purge(true);
            self.snapshot = None;
            info!("Display resumed");
        } else {
            self.paused = true;
            container.purge(false);
            info!("Display paused");
        }
    }

    /// Bound the scroll offset by the number of connections
    pub fn clamp_scroll(&mut self, count: usize) {
        self.scroll_offset = self.scroll_offset.min(count.saturating_sub(1));
    }

    /// Take the snapshot for this cycle: the held one while paused,
    /// otherwise a fresh copy from the locked container.
    pub fn acquire_snapshot(&mut self, locked: &dyn LockedConnections) -> Snapshot {
        self.snapshot.take().unwrap_or_else(|| locked.snapshot())
    }

    /// Hand the cycle's snapshot back. Kept only while paused, so an
    /// unpaused display never shows data older than one cycle.
    pub fn release_snapshot(&mut self, snapshot: Snapshot) {
        if self.paused {
            self.snapshot = Some(snapshot);
        }
    }

    #[allow(dead_code)]
    pub fn holds_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}
