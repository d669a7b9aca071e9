//! Theme and Colors
//!
//! One accent per speaker plus a few state colors for the status bar.

use ratatui::style::{Color, Modifier, Style};

use dashboard_core::TurnState;

use crate::display::LineKind;

// ============================================================================
// Conversation Colors
// ============================================================================

/// User input green
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// Agent replies (text/accents)
pub const AGENT_CYAN: Color = Color::Rgb(120, 200, 230);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Edge fade when there is more content off-screen
pub const FADE_FAR: Color = Color::Rgb(80, 80, 80);

/// Edge fade, second row
pub const FADE_NEAR: Color = Color::Rgb(120, 120, 120);

// ============================================================================
// Status Colors
// ============================================================================

/// Streaming in progress
pub const BUSY_YELLOW: Color = Color::Rgb(255, 223, 128);

/// Daemon reachable / turn done
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 230, 120);

/// Style for a conversation line
#[must_use]
pub fn line_style(kind: LineKind) -> Style {
    match kind {
        LineKind::User => Style::default().fg(USER_GREEN),
        LineKind::Agent => Style::default().fg(AGENT_CYAN),
        LineKind::Streaming => Style::default().fg(AGENT_CYAN).add_modifier(Modifier::ITALIC),
        LineKind::System => Style::default().fg(DIM_GRAY),
        LineKind::Error => Style::default().fg(ERROR_RED),
        LineKind::Spacer => Style::default(),
    }
}

/// Style for the status bar in a given turn state
#[must_use]
pub fn status_style(state: TurnState) -> Style {
    match state {
        TurnState::Streaming => Style::default().fg(BUSY_YELLOW),
        TurnState::Failed => Style::default().fg(ERROR_RED),
        TurnState::Idle | TurnState::Completed | TurnState::Cancelled => {
            Style::default().fg(DIM_GRAY)
        }
    }
}
