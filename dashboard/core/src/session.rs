//! Stream Session
//!
//! The two halves of one in-flight turn:
//!
//! - [`SessionSender`] lives in the producer task. It owns the write ends of
//!   the data channel (bounded `mpsc`) and the error slot (`oneshot`), so
//!   dropping it closes both exactly once.
//! - [`StreamSession`] lives with the UI. It owns the read ends, the
//!   cancellation token, and the accounting state (start time, token count).
//!   [`StreamSession::poll`] never waits.
//!
//! The only things crossing the task boundary are the two channels and the
//! token.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::messages::StreamChunk;

/// Create a connected sender/session pair
///
/// `capacity` bounds the data channel; a full channel makes
/// [`SessionSender::send`] wait, which is how a stalled UI slows the producer.
#[must_use]
pub fn session_channel(capacity: usize) -> (SessionSender, StreamSession) {
    let (data_tx, data_rx) = mpsc::channel(capacity.max(1));
    let (error_tx, error_rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    let sender = SessionSender {
        data: data_tx,
        error: error_tx,
        cancel: cancel.clone(),
        tokens: 0,
    };
    let session = StreamSession {
        data: data_rx,
        error: Some(error_rx),
        cancel,
        started_at: Instant::now(),
        token_count: 0,
        chunks_received: 0,
        terminated: false,
    };

    (sender, session)
}

/// Running token count after folding in one chunk
///
/// One per non-empty delta, raised to the daemon's own count when that is
/// larger. Never decreases.
fn accumulate_tokens(current: u64, chunk: &StreamChunk) -> u64 {
    let mut count = current;
    if !chunk.delta_content.is_empty() {
        count += 1;
    }
    if let Some(reported) = chunk.tokens_emitted {
        count = count.max(reported);
    }
    count
}

/// Producer end of a session
pub struct SessionSender {
    data: mpsc::Sender<StreamChunk>,
    error: oneshot::Sender<ClientError>,
    cancel: CancellationToken,
    tokens: u64,
}

impl SessionSender {
    /// Push a chunk, waiting for room if the channel is full
    ///
    /// Returns `false` when the session has been dropped.
    pub async fn send(&mut self, chunk: StreamChunk) -> bool {
        self.tokens = accumulate_tokens(self.tokens, &chunk);
        self.data.send(chunk).await.is_ok()
    }

    /// Report the terminal failure and close both channels
    pub fn fail(self, error: ClientError) {
        // Receiver may already be gone; nothing left to tell
        let _ = self.error.send(error);
    }

    /// Close both channels without an error
    pub fn finish(self) {}

    /// Token the UI triggers to cancel this turn
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the session end has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.data.is_closed()
    }

    /// Tokens pushed so far
    #[must_use]
    pub fn tokens(&self) -> u64 {
        self.tokens
    }
}

/// Result of one non-blocking check of a session
#[derive(Debug)]
pub enum SessionPoll {
    /// A chunk was waiting; `is_final` chunks also end the session
    Chunk(StreamChunk),
    /// The producer reported a failure; the session has ended
    Failed(ClientError),
    /// The data channel closed with no error; the session has ended
    Completed,
    /// A requested cancel has been acknowledged; the session has ended
    Cancelled,
    /// Nothing yet
    Pending,
    /// The session ended on an earlier poll
    Terminated,
}

impl SessionPoll {
    /// Whether this result ended the session
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Chunk(chunk) => chunk.is_final,
            Self::Failed(_) | Self::Completed | Self::Cancelled | Self::Terminated => true,
            Self::Pending => false,
        }
    }
}

enum ErrorSlot {
    Empty,
    Value(ClientError),
    Closed,
}

/// Consumer end of a session
pub struct StreamSession {
    data: mpsc::Receiver<StreamChunk>,
    error: Option<oneshot::Receiver<ClientError>>,
    cancel: CancellationToken,
    started_at: Instant,
    token_count: u64,
    chunks_received: usize,
    terminated: bool,
}

impl StreamSession {
    /// Perform exactly one non-blocking check of both channels
    ///
    /// Buffered chunks are delivered before a queued error or closure, so
    /// order matches what the producer pushed. Once a cancel has been
    /// requested no more chunks are delivered; the next poll that sees the
    /// producer gone returns [`SessionPoll::Cancelled`].
    pub fn poll(&mut self) -> SessionPoll {
        if self.terminated {
            return SessionPoll::Terminated;
        }

        if self.cancel.is_cancelled() {
            return match self.try_error() {
                ErrorSlot::Empty => SessionPoll::Pending,
                ErrorSlot::Value(_) | ErrorSlot::Closed => self.end(SessionPoll::Cancelled),
            };
        }

        match self.data.try_recv() {
            Ok(chunk) => {
                self.token_count = accumulate_tokens(self.token_count, &chunk);
                self.chunks_received += 1;
                self.terminated = chunk.is_final;
                SessionPoll::Chunk(chunk)
            }
            Err(mpsc::error::TryRecvError::Empty) => match self.try_error() {
                ErrorSlot::Value(e) => self.fail(e),
                // The producer is between dropping its two senders
                ErrorSlot::Empty | ErrorSlot::Closed => SessionPoll::Pending,
            },
            Err(mpsc::error::TryRecvError::Disconnected) => match self.try_error() {
                ErrorSlot::Value(e) => self.fail(e),
                ErrorSlot::Empty | ErrorSlot::Closed => self.end(SessionPoll::Completed),
            },
        }
    }

    /// Request cancellation; returns `false` if the session already ended
    pub fn cancel(&self) -> bool {
        if self.terminated {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Whether a cancel has been requested
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a terminal result has been returned
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Time since the session was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Running token count
    #[must_use]
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// Chunks delivered so far
    #[must_use]
    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    fn fail(&mut self, error: ClientError) -> SessionPoll {
        if error.is_cancelled() {
            self.end(SessionPoll::Cancelled)
        } else {
            self.end(SessionPoll::Failed(error))
        }
    }

    fn end(&mut self, result: SessionPoll) -> SessionPoll {
        self.terminated = true;
        self.data.close();
        result
    }

    fn try_error(&mut self) -> ErrorSlot {
        let Some(rx) = self.error.as_mut() else {
            return ErrorSlot::Closed;
        };
        match rx.try_recv() {
            Ok(error) => {
                self.error = None;
                ErrorSlot::Value(error)
            }
            Err(oneshot::error::TryRecvError::Empty) => ErrorSlot::Empty,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.error = None;
                ErrorSlot::Closed
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Tear down the producer's connection if it is still reading
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_arrive_in_order_then_completed() {
        let (mut tx, mut session) = session_channel(8);
        assert!(tx.send(StreamChunk::delta("a")).await);
        assert!(tx.send(StreamChunk::delta("b")).await);
        tx.finish();

        assert!(matches!(session.poll(), SessionPoll::Chunk(c) if c.delta_content == "a"));
        assert!(matches!(session.poll(), SessionPoll::Chunk(c) if c.delta_content == "b"));
        assert!(matches!(session.poll(), SessionPoll::Completed));
        assert!(matches!(session.poll(), SessionPoll::Terminated));
        assert_eq!(session.chunks_received(), 2);
    }

    #[tokio::test]
    async fn test_empty_channel_is_pending() {
        let (_tx, mut session) = session_channel(8);
        assert!(matches!(session.poll(), SessionPoll::Pending));
        assert!(!session.is_terminated());
    }

    #[tokio::test]
    async fn test_buffered_chunks_precede_error() {
        let (mut tx, mut session) = session_channel(8);
        tx.send(StreamChunk::delta("partial")).await;
        tx.fail(ClientError::Decode("bad line".into()));

        assert!(matches!(session.poll(), SessionPoll::Chunk(_)));
        assert!(matches!(
            session.poll(),
            SessionPoll::Failed(ClientError::Decode(_))
        ));
        assert!(session.is_terminated());
    }

    #[tokio::test]
    async fn test_final_chunk_terminates() {
        let (mut tx, mut session) = session_channel(8);
        tx.send(StreamChunk::done(Some(3))).await;
        tx.send(StreamChunk::delta("ignored")).await;

        let first = session.poll();
        assert!(first.is_terminal());
        assert!(matches!(session.poll(), SessionPoll::Terminated));
        assert!(!session.cancel());
    }

    #[tokio::test]
    async fn test_cancel_waits_for_producer_then_reports_cancelled() {
        let (mut tx, mut session) = session_channel(8);
        tx.send(StreamChunk::delta("queued")).await;

        assert!(session.cancel());
        assert!(tx.cancellation().is_cancelled());
        assert!(matches!(session.poll(), SessionPoll::Pending));

        tx.fail(ClientError::Cancelled);
        assert!(matches!(session.poll(), SessionPoll::Cancelled));
    }

    #[tokio::test]
    async fn test_producer_reported_cancel_maps_to_cancelled() {
        let (tx, mut session) = session_channel(8);
        tx.fail(ClientError::Cancelled);
        assert!(matches!(session.poll(), SessionPoll::Cancelled));
    }

    #[tokio::test]
    async fn test_token_count_is_monotonic() {
        let (mut tx, mut session) = session_channel(8);
        tx.send(StreamChunk::delta("a")).await;
        tx.send(StreamChunk {
            delta_content: String::new(),
            is_final: false,
            tokens_emitted: Some(10),
        })
        .await;
        tx.send(StreamChunk {
            delta_content: "b".into(),
            is_final: false,
            tokens_emitted: Some(4),
        })
        .await;
        assert_eq!(tx.tokens(), 11);
        tx.finish();

        let mut last = 0;
        while let SessionPoll::Chunk(_) = session.poll() {
            assert!(session.token_count() >= last);
            last = session.token_count();
        }
        assert_eq!(session.token_count(), 11);
    }

    #[tokio::test]
    async fn test_dropping_session_cancels_producer() {
        let (tx, session) = session_channel(1);
        let token = tx.cancellation();
        drop(session);
        assert!(token.is_cancelled());
        assert!(tx.is_closed());
    }
}
