// Connection table rendering module
//
// Renders the header row and the visible window of connections with
// state-based coloring.

use super::format::format_bps;
use super::TableView;
use crate::theme::{state_color, BONE_WHITE, NEON_PURPLE, TOXIC_GREEN};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Cell, Row, Table},
    Frame,
};

const HEADER: [&str; 5] = ["Client", "Server", "State", "Idle", "Speed"];

fn column_widths() -> [Constraint; 5] {
    [
        Constraint::Fill(1),    // Client
        Constraint::Fill(1),    // Server
        Constraint::Length(11), // State ("ESTABLISHED")
        Constraint::Length(6),  // Idle
        Constraint::Length(10), // Speed
    ]
}

pub fn render_connections(f: &mut Frame, area: Rect, view: &TableView) {
    let header = Row::new(HEADER.iter().map(|h| Cell::from(*h))).style(
        Style::default()
            .fg(NEON_PURPLE)
            .add_modifier(Modifier::BOLD),
    );

    let rows = view.rows.iter().map(|row| {
        Row::new(vec![
            Cell::from(row.client.as_str()).style(Style::default().fg(BONE_WHITE)),
            Cell::from(row.server.as_str()).style(Style::default().fg(BONE_WHITE)),
            Cell::from(row.state.label()).style(Style::default().fg(state_color(row.state))),
            Cell::from(format!("{}s", row.idle_seconds)).style(Style::default().fg(BONE_WHITE)),
            Cell::from(format_bps(row.bytes_per_second)).style(Style::default().fg(TOXIC_GREEN)),
        ])
    });

    let table = Table::new(rows, column_widths())
        .header(header)
        .column_spacing(1);

    f.render_widget(table, area);
}
