//! Dashboard Core - Headless Streaming Chat for agentdash
//!
//! This crate holds everything the agentdash dashboard needs to talk to the
//! agent daemon, completely independent of any terminal framework. The TUI
//! drives it; tests drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── UI loop (single task) ────────────────────────────┐
//! │                                                                                │
//! │   ChatState::submit ──► ChatStreamer::start ──┐      ChatState::poll (tick)    │
//! │          ▲                                    │              ▲                 │
//! │          │ keystrokes                         │              │ try_recv only   │
//! └──────────┼────────────────────────────────────┼──────────────┼─────────────────┘
//!            │                                    ▼              │
//!            │                       ┌──── producer task ────┐   │
//!            │   CancellationToken ─►│ POST /api/chat        │   │
//!            └───────────────────────│ StreamDecoder::next() │───┘ mpsc (chunks)
//!                                    │                       │     oneshot (error)
//!                                    └───────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatStreamer`]: issues chat requests and spawns the producer task
//! - [`StreamDecoder`]: NDJSON body → [`StreamChunk`] sequence
//! - [`StreamSession`]: the consumer end of one in-flight turn
//! - [`ChatState`]: the cooperative consumer and transcript owner
//! - [`ApiClient`]: `{ok, result, error}` envelope client for REST endpoints
//! - [`ClientConfig`]: layered configuration (file, env, CLI)
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui or crossterm.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod messages;
pub mod producer;
pub mod session;
pub mod transcript;

pub use api::{ApiClient, ApiEnvelope, ModelInfo};
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use consumer::{ChatState, Reschedule, SubmitError, TurnStats};
pub use decoder::{check_content_type, LineBuffer, StreamDecoder, MAX_RECORD_BYTES};
pub use error::ClientError;
pub use messages::{ChatRequest, ChatRole, ChatTurn, StreamChunk, WireMessage, WireRecord};
pub use producer::{ChatStreamer, StreamSource};
pub use session::{session_channel, SessionPoll, SessionSender, StreamSession};
pub use transcript::{with_cancelled_marker, Transcript, TurnState, CANCELLED_MARKER};
