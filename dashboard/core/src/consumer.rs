//! Cooperative Consumer
//!
//! [`ChatState`] is the single owner of a chat view: the transcript, the
//! turn state, and at most one active stream. It is driven from the UI
//! loop and never waits on anything.
//!
//! # Scheduling
//!
//! Each [`ChatState::poll`] performs exactly one non-blocking check of the
//! session and tells the caller when to come back:
//!
//! ```text
//! chunk folded       → Reschedule::Immediately
//! nothing yet        → Reschedule::After(poll_interval)
//! session finalized  → Reschedule::Stop
//! ```
//!
//! The caller turns that into a timer deadline and goes back to handling
//! input and drawing frames in between.

use std::ops::Add;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ModelInfo;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::messages::{ChatRequest, ChatTurn};
use crate::producer::StreamSource;
use crate::session::{SessionPoll, StreamSession};
use crate::transcript::{with_cancelled_marker, Transcript, TurnState};

/// When the consumer wants to be polled again
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reschedule {
    /// More data may already be waiting
    Immediately,
    /// Nothing was waiting; check again after this long
    After(Duration),
    /// No session is active
    Stop,
}

impl Reschedule {
    /// Absolute deadline for the next poll, if any
    pub fn deadline<I>(self, now: I) -> Option<I>
    where
        I: Add<Duration, Output = I>,
    {
        match self {
            Self::Immediately => Some(now),
            Self::After(delay) => Some(now + delay),
            Self::Stop => None,
        }
    }
}

/// Why a submission was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// A reply is still streaming in
    #[error("a reply is still streaming; cancel it first")]
    AlreadyStreaming,

    /// Nothing to send
    #[error("message is empty")]
    EmptyInput,

    /// No model has been configured or discovered
    #[error("no model available")]
    NoModelAvailable,
}

/// Timing and token count of the current or last turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnStats {
    /// Time since the session started
    pub elapsed: Duration,
    /// Tokens received
    pub tokens: u64,
}

impl TurnStats {
    fn of(session: &StreamSession) -> Self {
        Self {
            elapsed: session.elapsed(),
            tokens: session.token_count(),
        }
    }
}

/// The live session and the reply text received so far
struct ActiveStream {
    session: StreamSession,
    partial: String,
}

/// State of one chat view
pub struct ChatState {
    transcript: Transcript,
    turn_state: TurnState,
    active: Option<ActiveStream>,
    last_error: Option<ClientError>,
    stats: TurnStats,
    model: Option<String>,
    max_context_turns: usize,
    poll_interval: Duration,
}

impl ChatState {
    /// Create an idle chat view
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            transcript: Transcript::new(),
            turn_state: TurnState::Idle,
            active: None,
            last_error: None,
            stats: TurnStats::default(),
            model: config.model.clone().filter(|m| !m.trim().is_empty()),
            max_context_turns: config.max_context_turns,
            poll_interval: config.poll_interval,
        }
    }

    /// Send a user message and start streaming the reply
    ///
    /// Preconditions are checked before the transcript is touched. A
    /// session that cannot be opened ends the turn `Failed` right away.
    pub fn submit(
        &mut self,
        source: &impl StreamSource,
        text: &str,
    ) -> Result<Reschedule, SubmitError> {
        if self.is_streaming() {
            return Err(SubmitError::AlreadyStreaming);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        let Some(model) = self.model.clone() else {
            return Err(SubmitError::NoModelAvailable);
        };

        self.transcript.push(ChatTurn::user(text));
        self.last_error = None;
        self.stats = TurnStats::default();

        let request = ChatRequest::new(model, self.transcript.history(self.max_context_turns));
        debug!(
            model = %request.model,
            context = request.messages.len(),
            "Submitting chat turn"
        );

        match source.start(request) {
            Ok(session) => {
                self.active = Some(ActiveStream {
                    session,
                    partial: String::new(),
                });
                self.turn_state = TurnState::Streaming;
                Ok(Reschedule::Immediately)
            }
            Err(e) => {
                warn!(error = %e, "Could not start chat stream");
                self.last_error = Some(e);
                self.turn_state = TurnState::Failed;
                Ok(Reschedule::Stop)
            }
        }
    }

    /// Perform one non-blocking check of the active session
    pub fn poll(&mut self) -> Reschedule {
        let Some(mut active) = self.active.take() else {
            return Reschedule::Stop;
        };

        let result = active.session.poll();
        self.stats = TurnStats::of(&active.session);

        match result {
            SessionPoll::Chunk(chunk) => {
                active.partial.push_str(&chunk.delta_content);
                if chunk.is_final {
                    self.finalize(active, TurnState::Completed);
                    Reschedule::Stop
                } else {
                    self.active = Some(active);
                    Reschedule::Immediately
                }
            }
            SessionPoll::Pending => {
                self.active = Some(active);
                Reschedule::After(self.poll_interval)
            }
            SessionPoll::Completed | SessionPoll::Terminated => {
                self.finalize(active, TurnState::Completed);
                Reschedule::Stop
            }
            SessionPoll::Cancelled => {
                self.finalize(active, TurnState::Cancelled);
                Reschedule::Stop
            }
            SessionPoll::Failed(e) => {
                warn!(error = %e, "Chat turn failed");
                self.last_error = Some(e);
                self.finalize(active, TurnState::Failed);
                Reschedule::Stop
            }
        }
    }

    /// Move the partial reply into the transcript and drop the session
    fn finalize(&mut self, active: ActiveStream, state: TurnState) {
        let ActiveStream { session, partial } = active;

        match state {
            TurnState::Cancelled => {
                self.transcript
                    .push(ChatTurn::assistant(with_cancelled_marker(&partial)));
            }
            _ if !partial.is_empty() => self.transcript.push(ChatTurn::assistant(partial)),
            _ => {}
        }

        info!(
            state = state.label(),
            tokens = self.stats.tokens,
            elapsed_ms = u64::try_from(self.stats.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Chat turn finished"
        );
        self.turn_state = state;
        drop(session);
    }

    /// Ask the producer to stop
    ///
    /// Chunks already queued are folded first. If they end the turn (a final
    /// chunk, a closed stream, or an error) the cancel is a no-op and
    /// `false` is returned, as it is when nothing is streaming. Otherwise
    /// the turn becomes `Cancelled` on a later [`poll`](Self::poll), once
    /// the producer has let go of the connection.
    pub fn cancel(&mut self) -> bool {
        if self.turn_state != TurnState::Streaming {
            return false;
        }
        while self.poll() == Reschedule::Immediately {}

        match &self.active {
            Some(active) => {
                debug!(partial_len = active.partial.len(), "Cancelling chat turn");
                active.session.cancel()
            }
            None => {
                debug!(state = self.turn_state.label(), "Turn ended before cancel");
                false
            }
        }
    }

    /// Take the first advertised model when none is configured
    ///
    /// Returns the adopted name. A System turn records the choice.
    pub fn adopt_default_model(&mut self, models: &[ModelInfo]) -> Option<String> {
        if self.model.is_some() {
            return None;
        }
        let first = models.first()?;
        self.model = Some(first.name.clone());
        self.transcript
            .push(ChatTurn::system(format!("Using model {}", first.name)));
        info!(model = %first.name, "Adopted daemon default model");
        Some(first.name.clone())
    }

    /// Append a local notice
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.transcript.push(ChatTurn::system(text));
    }

    /// Completed turns
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Lifecycle of the current turn
    #[must_use]
    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    /// Whether a reply is streaming in
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a cancel has been requested but not yet acknowledged
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.session.is_cancel_requested())
    }

    /// Reply text received so far, while streaming
    #[must_use]
    pub fn partial(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.partial.as_str())
    }

    /// Error that ended the last turn
    #[must_use]
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Dismiss the last error
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Timing and token count, live while streaming
    #[must_use]
    pub fn stats(&self) -> TurnStats {
        self.active
            .as_ref()
            .map_or(self.stats, |a| TurnStats::of(&a.session))
    }

    /// Model used for the next turn
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Switch the model used for the next turn
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        self.model = if model.trim().is_empty() {
            None
        } else {
            Some(model)
        };
    }
}
