//! Transcript and Turn State
//!
//! The ordered list of completed turns in a chat view. Turns are only ever
//! appended; an in-progress reply lives in the consumer's partial buffer
//! until its session ends.

use crate::messages::{ChatRole, ChatTurn};

/// Appended to a reply that was cut short by the user
pub const CANCELLED_MARKER: &str = "[cancelled]";

/// Lifecycle of the current turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnState {
    /// No turn has been started yet
    #[default]
    Idle,
    /// A reply is streaming in
    Streaming,
    /// The last reply finished normally
    Completed,
    /// The last reply ended with an error
    Failed,
    /// The last reply was cancelled
    Cancelled,
}

impl TurnState {
    /// Whether a new turn may be submitted
    #[must_use]
    pub fn accepts_input(self) -> bool {
        self != Self::Streaming
    }

    /// Short label for the status bar
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Ordered completed turns
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Context to send with a request
    ///
    /// The newest `max_turns` user/assistant turns, oldest first. System
    /// turns are local notices and never leave the client.
    #[must_use]
    pub fn history(&self, max_turns: usize) -> Vec<ChatTurn> {
        let mut recent: Vec<ChatTurn> = self
            .turns
            .iter()
            .rev()
            .filter(|t| t.role != ChatRole::System)
            .take(max_turns)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }
}

/// Partial reply text with the cancellation marker appended
#[must_use]
pub fn with_cancelled_marker(partial: &str) -> String {
    if partial.is_empty() {
        CANCELLED_MARKER.to_string()
    } else {
        format!("{partial} {CANCELLED_MARKER}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let mut transcript = Transcript::new();
        transcript.push(ChatTurn::user("one"));
        transcript.push(ChatTurn::assistant("two"));
        transcript.push(ChatTurn::system("switched model"));
        transcript.push(ChatTurn::user("three"));

        let history = transcript.history(2);
        assert_eq!(
            history,
            vec![ChatTurn::assistant("two"), ChatTurn::user("three")]
        );
        assert_eq!(transcript.history(100).len(), 3);
        assert!(transcript.history(0).is_empty());
    }

    #[test]
    fn test_cancelled_marker() {
        assert_eq!(with_cancelled_marker("Partial"), "Partial [cancelled]");
        assert_eq!(with_cancelled_marker(""), "[cancelled]");
    }

    #[test]
    fn test_turn_state() {
        assert_eq!(TurnState::default(), TurnState::Idle);
        assert!(!TurnState::Streaming.accepts_input());
        assert!(TurnState::Failed.accepts_input());
        assert_eq!(TurnState::Cancelled.label(), "cancelled");
    }
}
