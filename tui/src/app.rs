//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize, frame tick)
//! - [`ChatState`] for the conversation and the active stream
//! - Startup probe of the daemon (health, model list)
//!
//! # Event Loop
//!
//! One `tokio::select!` per iteration, biased in this order:
//!
//! 1. terminal events, so typing and cancel are never starved
//! 2. startup probe results
//! 3. the chat poll deadline derived from the last [`Reschedule`]
//! 4. the frame tick, which keeps the elapsed timer moving
//!
//! Nothing in the loop waits on the network; the chat poll is a single
//! `try_recv`.

use std::time::Duration;

use anyhow::Context;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use dashboard_core::{
    ApiClient, ChatState, ChatStreamer, ClientConfig, ClientError, ModelInfo, Reschedule,
    SubmitError,
};

use crate::display::{
    conversation_lines, fit_width, status_line, DaemonHealth, StatusInfo, STREAMING_CURSOR,
};
use crate::theme::{status_style, DIM_GRAY, USER_GREEN};
use crate::widgets::{ConversationState, ConversationView};

/// Input box height (lines) for text wrapping
const INPUT_HEIGHT: u16 = 5;

/// Redraw interval while nothing else happens
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Results of the background daemon probe
#[derive(Debug)]
enum StartupUpdate {
    Health(bool),
    Models(Result<Vec<ModelInfo>, ClientError>),
}

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    /// Daemon base URL, for notices
    base_url: String,

    // === Chat ===
    /// Conversation and active stream
    chat: ChatState,
    /// Opens chat streams
    streamer: ChatStreamer,
    /// When to poll the chat next (`None` = idle)
    next_poll: Option<Instant>,

    // === Daemon Probe ===
    startup_rx: mpsc::Receiver<StartupUpdate>,
    daemon: DaemonHealth,

    // === Input State ===
    /// User input buffer
    input_buffer: String,
    /// Conversation scroll position
    conversation: ConversationState,
    /// One-off status bar hint
    hint: Option<String>,
}

impl App {
    /// Create a new App and start probing the daemon
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let streamer = ChatStreamer::new(config).context("failed to build chat client")?;
        let api = ApiClient::new(config).context("failed to build daemon client")?;

        let (startup_tx, startup_rx) = mpsc::channel(4);
        tokio::spawn(probe_daemon(api, startup_tx));

        Ok(Self {
            running: true,
            base_url: config.base_url.clone(),
            chat: ChatState::new(config),
            streamer,
            next_poll: None,
            startup_rx,
            daemon: DaemonHealth::Unknown,
            input_buffer: String::new(),
            conversation: ConversationState::default(),
            hint: None,
        })
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();
        let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.running {
            terminal.draw(|frame| self.draw(frame))?;

            tokio::select! {
                biased;

                // Check for terminal events - highest priority
                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_event(&event),
                    Some(Err(e)) => return Err(e).context("terminal event stream failed"),
                    None => self.running = false,
                },

                Some(update) = self.startup_rx.recv() => self.apply_startup(update),

                () = wait_until(self.next_poll) => self.poll_chat(),

                _ = frame_tick.tick() => {}
            }
        }

        Ok(())
    }

    /// One cooperative check of the active stream
    fn poll_chat(&mut self) {
        let reschedule: Reschedule = self.chat.poll();
        self.next_poll = reschedule.deadline(Instant::now());
    }

    fn apply_startup(&mut self, update: StartupUpdate) {
        match update {
            StartupUpdate::Health(healthy) => {
                self.daemon = healthy.into();
                if !healthy {
                    self.chat
                        .push_notice(format!("Daemon not reachable at {}", self.base_url));
                }
            }
            StartupUpdate::Models(Ok(models)) => {
                if self.chat.adopt_default_model(&models).is_none() && self.chat.model().is_none()
                {
                    self.chat
                        .push_notice("Daemon reported no models; pass --model to choose one");
                }
            }
            StartupUpdate::Models(Err(e)) => {
                warn!(error = %e, "Could not list models");
                if self.chat.model().is_none() {
                    self.chat.push_notice(format!("Could not list models: {e}"));
                }
            }
        }
    }

    fn handle_event(&mut self, event: &Event) {
        // Only handle Press events (not Release or Repeat); resize redraws anyway
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                self.handle_key(*key);
            }
        }
    }

    /// Handle keyboard input
    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            // Cancel, or quit when idle
            KeyCode::Esc => self.cancel_or_quit(),
            KeyCode::Char('c') if ctrl => self.cancel_or_quit(),

            // Dismiss the inline error
            KeyCode::Char('l') if ctrl => {
                self.chat.clear_error();
                self.hint = None;
            }

            // Submit message
            KeyCode::Enter => self.submit(),

            // Typing
            KeyCode::Char(c) if !ctrl => {
                self.input_buffer.push(c);
                self.hint = None;
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = self.conversation.page();
                self.conversation.scroll_up(page);
            }
            KeyCode::PageDown => {
                let page = self.conversation.page();
                self.conversation.scroll_down(page);
            }
            KeyCode::End if ctrl => self.conversation.scroll_to_bottom(),

            _ => {}
        }
    }

    fn submit(&mut self) {
        match self.chat.submit(&self.streamer, &self.input_buffer) {
            Ok(reschedule) => {
                self.input_buffer.clear();
                self.hint = None;
                self.conversation.scroll_to_bottom();
                self.next_poll = reschedule.deadline(Instant::now());
            }
            Err(SubmitError::EmptyInput) => {}
            Err(SubmitError::AlreadyStreaming) => {
                self.hint = Some("Reply still streaming; Esc to cancel".to_string());
            }
            Err(SubmitError::NoModelAvailable) => {
                self.hint = Some("No model available; pass --model or set AGENTDASH_MODEL".to_string());
            }
        }
    }

    fn cancel_or_quit(&mut self) {
        if self.chat.is_streaming() {
            if self.chat.cancel() {
                // Look for the producer's acknowledgement right away
                self.next_poll = Some(Instant::now());
            }
        } else {
            info!("Quitting");
            self.running = false;
        }
    }

    /// Render the UI
    fn draw(&mut self, frame: &mut Frame<'_>) {
        let [conversation_area, input_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let lines = conversation_lines(&self.chat, conversation_area.width.saturating_sub(1) as usize);
        frame.render_stateful_widget(
            ConversationView::new(&lines),
            conversation_area,
            &mut self.conversation,
        );

        render_input(frame.buffer_mut(), input_area, &self.input_buffer);

        let mut status = StatusInfo::from_chat(&self.chat);
        status.daemon = self.daemon;
        status.scroll_offset = self.conversation.scroll_offset;
        status.hint = self.hint.as_deref();
        let text = fit_width(&status_line(&status), status_area.width as usize);
        frame.buffer_mut().set_string(
            status_area.x,
            status_area.y,
            &text,
            status_style(status.state),
        );
    }
}

/// Separator line followed by the wrapped input, newest text visible
fn render_input(buf: &mut Buffer, area: Rect, input: &str) {
    if area.height == 0 {
        return;
    }

    let separator = "-".repeat(area.width as usize);
    buf.set_string(area.x, area.y, &separator, Style::default().fg(DIM_GRAY));

    let text_height = area.height.saturating_sub(1) as usize;
    let text_width = area.width.saturating_sub(1) as usize;
    if text_width < 5 || text_height < 1 {
        return;
    }

    let full_input = format!("You: {input}{STREAMING_CURSOR}");
    let wrapped = textwrap::wrap(&full_input, text_width);
    let skip = wrapped.len().saturating_sub(text_height);

    for (i, line) in wrapped.iter().skip(skip).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let y = area.y + 1 + i as u16;
        buf.set_string(area.x, y, line, Style::default().fg(USER_GREEN));
    }

    if skip > 0 {
        buf.set_string(
            area.x + area.width.saturating_sub(3),
            area.y,
            "^",
            Style::default().fg(DIM_GRAY),
        );
    }
}

/// Sleep until `deadline`, or forever when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Check the daemon once, then fetch its models
async fn probe_daemon(api: ApiClient, tx: mpsc::Sender<StartupUpdate>) {
    let healthy = api.health().await;
    info!(url = api.base_url(), healthy, "Daemon health checked");
    if tx.send(StartupUpdate::Health(healthy)).await.is_err() || !healthy {
        return;
    }

    let models = api.list_models().await;
    // App may already have quit
    let _ = tx.send(StartupUpdate::Models(models)).await;
}
