//! agentdash TUI - Terminal dashboard for a local agent daemon
//!
//! A full-screen chat view over `dashboard-core`. The terminal loop stays
//! responsive while a reply streams in because it only ever polls.
//!
//! # Architecture
//!
//! - **App**: event loop, key handling, layout
//! - **Display**: chat state → wrapped lines and status text
//! - **Widgets**: bottom-anchored conversation view
//! - **Theme**: colors per speaker and turn state

pub mod app;
pub mod display;
pub mod theme;
pub mod widgets;

pub use app::App;
