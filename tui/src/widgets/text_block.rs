//! Conversation Widget
//!
//! A borderless, bottom-anchored view over wrapped [`DisplayLine`]s. The
//! newest line sits at the bottom; scrolling moves back in history.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::StatefulWidget;

use crate::display::{fit_width, DisplayLine};
use crate::theme::{line_style, FADE_FAR, FADE_NEAR};

/// Scroll position of the conversation view
#[derive(Debug, Default)]
pub struct ConversationState {
    /// Lines scrolled up from the bottom (0 = latest)
    pub scroll_offset: usize,
    /// Total content lines at last render
    pub total_lines: usize,
    /// Visible rows at last render
    pub viewport: usize,
}

impl ConversationState {
    /// Move back in history by `lines`
    pub fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport);
        self.scroll_offset = (self.scroll_offset + lines).min(max_scroll);
    }

    /// Move towards the latest line by `lines`
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Jump to the latest line
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Half the visible height, at least one line
    #[must_use]
    pub fn page(&self) -> usize {
        (self.viewport / 2).max(1)
    }
}

/// Bottom-anchored conversation view
pub struct ConversationView<'a> {
    lines: &'a [DisplayLine],
}

impl<'a> ConversationView<'a> {
    /// View over already-wrapped lines
    #[must_use]
    pub fn new(lines: &'a [DisplayLine]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for ConversationView<'_> {
    type State = ConversationState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let height = area.height as usize;
        state.total_lines = self.lines.len();
        state.viewport = height;

        // Clamp scroll
        let max_scroll = state.total_lines.saturating_sub(height);
        state.scroll_offset = state.scroll_offset.min(max_scroll);

        let visible_end = state.total_lines - state.scroll_offset;
        let visible_start = visible_end.saturating_sub(height);
        let has_content_above = visible_start > 0;
        let has_content_below = state.scroll_offset > 0;

        for (i, line) in self.lines[visible_start..visible_end].iter().enumerate() {
            // Fade the two edge rows that have more content past them
            let style = if has_content_above && i < 2 {
                Style::default().fg(if i == 0 { FADE_FAR } else { FADE_NEAR })
            } else if has_content_below && i + 2 >= height {
                Style::default().fg(if i + 1 == height { FADE_FAR } else { FADE_NEAR })
            } else {
                line_style(line.kind)
            };

            #[allow(clippy::cast_possible_truncation)]
            let y = area.y + i as u16;
            let text = fit_width(&line.text, area.width as usize);
            buf.set_string(area.x, y, &text, style);
        }
    }
}
