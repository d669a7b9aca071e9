//! Message Types
//!
//! Wire shapes for the daemon's chat endpoint and the in-memory turn types
//! built from them.
//!
//! # Wire Format
//!
//! Request:
//!
//! ```json
//! {"model": "m1", "messages": [{"role": "user", "content": "hi"}], "stream": true}
//! ```
//!
//! Response, one record per line:
//!
//! ```json
//! {"message": {"role": "assistant", "content": "He"}, "done": false}
//! {"message": null, "done": true, "eval_count": 2}
//! ```

use serde::{Deserialize, Serialize};

/// Who sent a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// User input
    User,
    /// Agent reply
    Assistant,
    /// Local notice
    System,
}

impl ChatRole {
    /// Prefix used when rendering a turn
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "You: ",
            Self::Assistant => "Agent: ",
            Self::System => "",
        }
    }
}

/// One completed message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who sent it
    pub role: ChatRole,
    /// Text content
    pub content: String,
}

impl ChatTurn {
    /// Create a turn
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// Body of a `POST /api/chat`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered prior turns, newest last
    pub messages: Vec<ChatTurn>,
    /// Whether the daemon should stream the reply
    pub stream: bool,
}

impl ChatRequest {
    /// Create a streaming request
    pub fn new(model: impl Into<String>, messages: Vec<ChatTurn>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }

    /// Set streaming mode
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Message object inside a wire record
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WireMessage {
    /// Role as sent by the daemon
    #[serde(default)]
    pub role: Option<String>,
    /// Content delta
    #[serde(default)]
    pub content: String,
}

/// One line of the streamed response (also the whole non-streaming response)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WireRecord {
    /// Content delta, absent on bookkeeping records
    #[serde(default)]
    pub message: Option<WireMessage>,
    /// Terminal record marker
    #[serde(default)]
    pub done: bool,
    /// Tokens generated so far, usually only on the final record
    #[serde(default)]
    pub eval_count: Option<u64>,
}

/// One decoded unit of an in-progress reply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text to append (may be empty)
    pub delta_content: String,
    /// Whether this is the last chunk of the reply
    pub is_final: bool,
    /// Daemon-reported token count, if carried
    pub tokens_emitted: Option<u64>,
}

impl StreamChunk {
    /// A content-only chunk
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta_content: text.into(),
            ..Default::default()
        }
    }

    /// A terminal chunk
    #[must_use]
    pub fn done(tokens_emitted: Option<u64>) -> Self {
        Self {
            delta_content: String::new(),
            is_final: true,
            tokens_emitted,
        }
    }
}

impl From<WireRecord> for StreamChunk {
    fn from(record: WireRecord) -> Self {
        Self {
            delta_content: record.message.map(|m| m.content).unwrap_or_default(),
            is_final: record.done,
            tokens_emitted: record.eval_count,
        }
    }
}
