//! Display State Types
//!
//! Turns a [`ChatState`] into plain lines for rendering. Nothing here
//! touches the terminal, so everything can be tested directly.
//!
//! - [`DisplayLine`]: one wrapped conversation line and how to color it
//! - [`StatusInfo`]: everything the status bar shows
//! - [`DaemonHealth`]: result of the startup health check

use std::time::Duration;

use unicode_width::UnicodeWidthChar;

use dashboard_core::{ChatRole, ChatState, TurnState, TurnStats};

/// Drawn after the streaming text
pub const STREAMING_CURSOR: char = '_';

/// What a line belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// User turn
    User,
    /// Completed agent turn
    Agent,
    /// Agent reply still streaming in
    Streaming,
    /// Local notice
    System,
    /// Inline error for the last turn
    Error,
    /// Blank separator between turns
    Spacer,
}

impl From<ChatRole> for LineKind {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => LineKind::User,
            ChatRole::Assistant => LineKind::Agent,
            ChatRole::System => LineKind::System,
        }
    }
}

/// A wrapped conversation line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayLine {
    /// Text, already wrapped to the view width
    pub text: String,
    /// What the line belongs to
    pub kind: LineKind,
}

impl DisplayLine {
    fn spacer() -> Self {
        Self {
            text: String::new(),
            kind: LineKind::Spacer,
        }
    }
}

fn push_wrapped(lines: &mut Vec<DisplayLine>, text: &str, kind: LineKind, width: usize) {
    for line in textwrap::wrap(text, width.max(1)) {
        lines.push(DisplayLine {
            text: line.into_owned(),
            kind,
        });
    }
    lines.push(DisplayLine::spacer());
}

/// Build every conversation line, oldest first
///
/// Completed turns are followed by the streaming reply (with a cursor) and
/// then the inline error, if either exists.
#[must_use]
pub fn conversation_lines(chat: &ChatState, width: usize) -> Vec<DisplayLine> {
    let mut lines = Vec::new();

    for turn in chat.transcript().turns() {
        let text = format!("{}{}", turn.role.prefix(), turn.content);
        push_wrapped(&mut lines, &text, turn.role.into(), width);
    }

    if let Some(partial) = chat.partial() {
        let text = format!(
            "{}{}{}",
            ChatRole::Assistant.prefix(),
            partial,
            STREAMING_CURSOR
        );
        push_wrapped(&mut lines, &text, LineKind::Streaming, width);
    }

    if let Some(error) = chat.last_error() {
        let text = format!("Error: {error} (Ctrl+L to dismiss)");
        push_wrapped(&mut lines, &text, LineKind::Error, width);
    }

    lines
}

/// Result of the startup health check
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DaemonHealth {
    /// Check still running
    #[default]
    Unknown,
    /// Daemon answered
    Up,
    /// Daemon did not answer
    Down,
}

impl DaemonHealth {
    /// Short label for the status bar
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "daemon ?",
            Self::Up => "daemon up",
            Self::Down => "daemon down",
        }
    }
}

impl From<bool> for DaemonHealth {
    fn from(healthy: bool) -> Self {
        if healthy {
            Self::Up
        } else {
            Self::Down
        }
    }
}

/// Everything the status bar shows
#[derive(Clone, Debug)]
pub struct StatusInfo<'a> {
    /// Current turn state
    pub state: TurnState,
    /// Cancel requested, not yet acknowledged
    pub cancelling: bool,
    /// Model for the next turn
    pub model: Option<&'a str>,
    /// Timing and tokens of the current or last turn
    pub stats: TurnStats,
    /// Daemon reachability
    pub daemon: DaemonHealth,
    /// Lines scrolled up from the bottom
    pub scroll_offset: usize,
    /// One-off hint replacing the key help
    pub hint: Option<&'a str>,
}

impl<'a> StatusInfo<'a> {
    /// Snapshot the chat state
    #[must_use]
    pub fn from_chat(chat: &'a ChatState) -> Self {
        Self {
            state: chat.turn_state(),
            cancelling: chat.is_cancelling(),
            model: chat.model(),
            stats: chat.stats(),
            daemon: DaemonHealth::Unknown,
            scroll_offset: 0,
            hint: None,
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

/// Render the status bar text
#[must_use]
pub fn status_line(info: &StatusInfo<'_>) -> String {
    let state = if info.cancelling {
        "cancelling"
    } else {
        info.state.label()
    };

    let mut parts = vec![
        state.to_string(),
        info.model.unwrap_or("no model").to_string(),
    ];
    if info.state != TurnState::Idle {
        parts.push(format_elapsed(info.stats.elapsed));
        parts.push(format!("{} tok", info.stats.tokens));
    }
    parts.push(info.daemon.label().to_string());

    let help = match info.hint {
        Some(hint) => hint,
        None if info.state == TurnState::Streaming => "Esc to cancel",
        None => "Enter send | Esc quit | PgUp/PgDn scroll",
    };
    parts.push(help.to_string());

    let mut status = format!(" {}", parts.join(" | "));
    if info.scroll_offset > 0 {
        status.push_str(&format!(" [^{} lines]", info.scroll_offset));
    }
    status
}

/// Cut `text` to at most `width` terminal columns
#[must_use]
pub fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
