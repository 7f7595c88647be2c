// Theme module - Color palette
//
// Colors used by the table and status line. State colors follow the usual
// traffic-light reading: green alive, orange in transition, red finished.

use crate::net::TcpState;
use ratatui::style::Color;

/// Primary accent color - header, borders of the status line, key hints
/// RGB: (187, 154, 247)
pub const NEON_PURPLE: Color = Color::Rgb(187, 154, 247);

/// Transitional states, paused indicator
/// RGB: (255, 158, 100)
pub const PUMPKIN_ORANGE: Color = Color::Rgb(255, 158, 100);

/// Reset and closed connections
/// RGB: (247, 118, 142)
pub const BLOOD_RED: Color = Color::Rgb(247, 118, 142);

/// Established connections, throughput totals
/// RGB: (158, 206, 106)
pub const TOXIC_GREEN: Color = Color::Rgb(158, 206, 106);

/// General text
/// RGB: (169, 177, 214)
pub const BONE_WHITE: Color = Color::Rgb(169, 177, 214);

/// Color for a connection state label
pub fn state_color(state: TcpState) -> Color {
    match state {
        TcpState::Established => TOXIC_GREEN,
        TcpState::SynSent | TcpState::SynAckAck | TcpState::Closing => PUMPKIN_ORANGE,
        TcpState::Closed | TcpState::Reset => BLOOD_RED,
    }
}
