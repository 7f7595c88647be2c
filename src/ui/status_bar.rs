// Status line rendering module
//
// Renders the bottom line: total throughput, window position, sort mode,
// pause indicator and as many key hints as fit.

use super::format::format_bps;
use super::TableView;
use crate::theme::{BONE_WHITE, NEON_PURPLE, PUMPKIN_ORANGE, TOXIC_GREEN};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

struct Hint {
    priority: u8,
    key: &'static str,
    desc: &'static str,
}

const HINTS: [Hint; 4] = [
    Hint {
        priority: 1,
        key: "q:",
        desc: "quit ",
    },
    Hint {
        priority: 1,
        key: "p:",
        desc: "pause ",
    },
    Hint {
        priority: 2,
        key: "s:",
        desc: "sort ",
    },
    Hint {
        priority: 2,
        key: "↑↓:",
        desc: "scroll ",
    },
];

/// "3-20 of 57", or a placeholder when nothing is tracked
pub fn window_label(view: &TableView) -> String {
    if view.connection_count == 0 {
        return "no connections".to_string();
    }
    if view.rows.is_empty() {
        return format!("- of {}", view.connection_count);
    }
    format!(
        "{}-{} of {}",
        view.first_visible + 1,
        view.first_visible + view.rows.len(),
        view.connection_count
    )
}

pub fn render_status_bar(f: &mut Frame, area: Rect, view: &TableView) {
    let mut spans = vec![
        Span::styled(" TOTAL ", Style::default().fg(BONE_WHITE)),
        Span::styled(
            format_bps(view.total_bytes_per_second),
            Style::default().fg(TOXIC_GREEN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" | {} | sort: {} ", window_label(view), view.sort_mode.label()),
            Style::default().fg(BONE_WHITE),
        ),
    ];
    if view.paused {
        spans.push(Span::styled(
            "PAUSED ",
            Style::default()
                .fg(PUMPKIN_ORANGE)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let mut used: usize = spans.iter().map(|s| s.content.width()).sum();
    let available = area.width as usize;

    // Hints by priority while they fit
    for priority in 1..=2 {
        for hint in HINTS.iter().filter(|h| h.priority == priority) {
            let hint_width = hint.key.width() + hint.desc.width();
            if used + hint_width <= available {
                spans.push(Span::styled(
                    hint.key,
                    Style::default().fg(NEON_PURPLE).add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::styled(hint.desc, Style::default().fg(BONE_WHITE)));
                used += hint_width;
            }
        }
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
