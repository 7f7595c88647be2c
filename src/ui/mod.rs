// UI rendering module
//
// Turns a snapshot plus the display state into a `TableView` (pure, testable)
// and draws it: header + connection window on top, status line at the bottom.

mod connections;
pub mod format;
mod status_bar;

use crate::app::{DisplayState, SortMode};
use crate::net::{Snapshot, TcpState};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use connections::render_connections;
use status_bar::render_status_bar;

/// Rows taken by the table header and the status line
pub const CHROME_ROWS: u16 = 2;

/// One visible table row, copied out of the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub client: String,
    pub server: String,
    pub state: TcpState,
    pub idle_seconds: u64,
    pub bytes_per_second: u64,
}

/// Everything one frame shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    /// Visible window only
    pub rows: Vec<RowView>,
    /// Sum over the whole snapshot, not just the window
    pub total_bytes_per_second: u64,
    pub connection_count: usize,
    /// Snapshot index of the first row in `rows`
    pub first_visible: usize,
    pub sort_mode: SortMode,
    pub paused: bool,
}

impl TableView {
    /// Build the frame model.
    ///
    /// Sums throughput over every entry, sorts the snapshot by the current
    /// mode, then copies out the window starting at the scroll offset.
    pub fn build(snapshot: &mut Snapshot, state: &DisplayState, visible_rows: usize) -> Self {
        snapshot.rewind();
        let mut total: u64 = 0;
        while let Some(conn) = snapshot.next_entry() {
            total = total.saturating_add(conn.bytes_per_second);
        }
        snapshot.rewind();

        if state.sort_mode != SortMode::Unsorted {
            snapshot.sort(state.sort_mode);
        }

        let mut rows = Vec::with_capacity(visible_rows);
        let mut index = 0;
        while let Some(conn) = snapshot.next_entry() {
            if rows.len() == visible_rows {
                break;
            }
            if index >= state.scroll_offset {
                rows.push(RowView {
                    client: conn.client(),
                    server: conn.server(),
                    state: conn.state,
                    idle_seconds: conn.idle_seconds(),
                    bytes_per_second: conn.bytes_per_second,
                });
            }
            index += 1;
        }
        snapshot.rewind();

        Self {
            rows,
            total_bytes_per_second: total,
            connection_count: snapshot.len(),
            first_visible: state.scroll_offset,
            sort_mode: state.sort_mode,
            paused: state.paused,
        }
    }
}

/// Number of connection rows that fit in a terminal `height` rows tall
pub fn visible_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS) as usize
}

/// Main UI drawing function
pub fn draw(f: &mut Frame, view: &TableView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Header + connections
            Constraint::Length(1), // Status line
        ])
        .split(f.area());

    render_connections(f, chunks[0], view);
    render_status_bar(f, chunks[1], view);
}
