//! Stream Producer
//!
//! Owns the outbound side of a chat turn. [`ChatStreamer::start`] opens one
//! `POST /api/chat` inside one spawned task and hands back the
//! [`StreamSession`] the UI polls.
//!
//! # Task Lifecycle
//!
//! ```text
//! start() ──spawn──► select! {
//!                      token.cancelled()  ──► report Cancelled
//!                      pump():
//!                        send request
//!                        non-2xx        ──► report Status (bounded body)
//!                        decoder.next() ──► chunk ──► session (awaits when full)
//!                                       ──► end / final ──► finish
//!                                       ──► error ──► report
//!                    }
//!                    SessionSender dropped: both channels closed
//! ```
//!
//! Losing the `select!` race drops the in-flight request future, which closes
//! the socket. Nothing is retried; a retry is a new session.

use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::api::build_http_client;
use crate::config::ClientConfig;
use crate::decoder::{check_content_type, StreamDecoder};
use crate::error::ClientError;
use crate::messages::{ChatRequest, ChatTurn, WireRecord};
use crate::session::{session_channel, SessionSender, StreamSession};

/// Anything that can open a streaming turn
///
/// [`ChatStreamer`] is the production implementation; consumers are written
/// against this trait so they can be driven by scripted sessions.
pub trait StreamSource {
    /// Open a session for `request`
    fn start(&self, request: ChatRequest) -> Result<StreamSession, ClientError>;
}

/// Issues chat requests against the daemon
#[derive(Clone)]
pub struct ChatStreamer {
    base_url: String,
    http_client: reqwest::Client,
    channel_capacity: usize,
    error_body_limit: usize,
    request_timeout: std::time::Duration,
}

impl ChatStreamer {
    /// Create a streamer from configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client: build_http_client(config.connect_timeout)?,
            channel_capacity: config.channel_capacity,
            error_body_limit: config.error_body_limit,
            request_timeout: config.request_timeout,
        })
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Serialize a request; shared by the streaming and one-shot paths
    fn build_request(&self, request: &ChatRequest) -> reqwest::RequestBuilder {
        let accept = if request.stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        self.http_client
            .post(self.chat_url())
            .header(ACCEPT, accept)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
    }

    /// Start streaming a reply
    ///
    /// Must be called from within a tokio runtime. Fails only on local
    /// preconditions; every network outcome arrives through the session.
    pub fn start(&self, request: ChatRequest) -> Result<StreamSession, ClientError> {
        if request.model.trim().is_empty() {
            return Err(ClientError::NoModelAvailable);
        }

        let request = request.with_stream(true);
        let (sender, session) = session_channel(self.channel_capacity);

        let streamer = self.clone();
        tokio::spawn(async move { streamer.produce(request, sender).await });

        Ok(session)
    }

    /// Body of the producer task
    async fn produce(self, request: ChatRequest, mut sender: SessionSender) {
        let cancel = sender.cancellation();
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Starting chat stream"
        );

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.pump(&request, &mut sender) => result,
        };

        match outcome {
            Ok(()) => {
                debug!(tokens = sender.tokens(), "Chat stream finished");
                sender.finish();
            }
            Err(ClientError::Cancelled) => {
                debug!(tokens = sender.tokens(), "Chat stream cancelled");
                sender.fail(ClientError::Cancelled);
            }
            Err(e) => {
                warn!(error = %e, "Chat stream failed");
                sender.fail(e);
            }
        }
    }

    /// Send the request and forward decoded chunks until the stream ends
    async fn pump(
        &self,
        request: &ChatRequest,
        sender: &mut SessionSender,
    ) -> Result<(), ClientError> {
        let response = self.build_request(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_bounded(response, self.error_body_limit).await;
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        check_content_type(content_type.as_deref())?;

        let mut decoder = StreamDecoder::new(response.bytes_stream());
        while let Some(item) = decoder.next().await {
            let chunk = item?;
            let is_final = chunk.is_final;

            if !sender.send(chunk).await {
                debug!("Session dropped, stopping stream");
                return Ok(());
            }
            if is_final {
                break;
            }
        }

        Ok(())
    }

    /// Send a request and wait for the complete reply
    pub async fn send(&self, request: ChatRequest) -> Result<ChatTurn, ClientError> {
        if request.model.trim().is_empty() {
            return Err(ClientError::NoModelAvailable);
        }

        let request = request.with_stream(false);
        let response = self
            .build_request(&request)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_bounded(response, self.error_body_limit).await;
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let record: WireRecord = serde_json::from_slice(&bytes)?;

        Ok(ChatTurn::assistant(
            record.message.map(|m| m.content).unwrap_or_default(),
        ))
    }
}

impl StreamSource for ChatStreamer {
    fn start(&self, request: ChatRequest) -> Result<StreamSession, ClientError> {
        ChatStreamer::start(self, request)
    }
}

/// Read at most `limit` bytes of an error body
async fn read_bounded(response: reqwest::Response, limit: usize) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(Ok(bytes)) = stream.next().await {
        body.extend_from_slice(&bytes);
        if body.len() >= limit {
            break;
        }
    }

    truncate_on_char_boundary(&String::from_utf8_lossy(&body), limit)
}

fn truncate_on_char_boundary(text: &str, limit: usize) -> String {
    let mut end = limit.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim().to_string()
}
