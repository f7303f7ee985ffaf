//! # InputBox Component
//!
//! The query field at the bottom of the screen.
//!
//! ## Responsibilities
//!
//! - Capture text input
//! - Handle editing (backspace, delete, cursor and word movement, paste)
//! - Handle submission (Enter), refusing it while the affordance is unavailable
//! - Show whether a query can be sent right now
//!
//! ## State Management
//!
//! The buffer is internal state. `affordance` and `dimmed` are props synced
//! from `App`/`TuiState` every frame. Cursor position and scroll state are
//! encapsulated in `CursorState`.

mod cursor;
mod text_wrap;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Paragraph};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

use cursor::CursorState;
use text_wrap::{
    MAX_VISIBLE_LINES, VERTICAL_OVERHEAD, inner_width, next_char_boundary, prev_char_boundary,
    wrap_line_count, wrap_options,
};

const PLACEHOLDER: &str = "Ask a question about your data…";

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// User submitted the text (Enter pressed while the affordance is ready)
    Submit(String),
    /// Buffer or cursor changed
    ContentChanged,
}

/// Whether the user can send a query, as derived from `App`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Ready,
    /// A query is in flight.
    Waiting,
    /// No connection to the server.
    Offline,
}

impl Affordance {
    fn label(self) -> &'static str {
        match self {
            Affordance::Ready => "Ask (Enter to send)",
            Affordance::Waiting => "Ask (waiting for answer…)",
            Affordance::Offline => "Ask (offline)",
        }
    }
}

/// Text input component.
///
/// # Props
///
/// - `affordance`: whether Submit is currently accepted
/// - `dimmed`: true while the user is navigating messages (Cursor mode)
///
/// # State
///
/// - `buffer`: Current text being typed
/// - `cursor`: Cursor position, scroll offset, and cached width (see `CursorState`)
pub struct InputBox {
    /// Text buffer (Internal State)
    pub buffer: String,
    /// Submission availability (Prop)
    pub affordance: Affordance,
    /// Rendered without a cursor when true (Prop)
    pub dimmed: bool,
    cursor: CursorState,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            affordance: Affordance::Offline,
            dimmed: false,
            cursor: CursorState::new(),
        }
    }

    /// Calculate required height for current buffer content, clamped to viewport limits.
    /// Returns value in range [1 + VERTICAL_OVERHEAD, MAX_VISIBLE_LINES + VERTICAL_OVERHEAD].
    pub fn calculate_height(&self, content_width: u16) -> u16 {
        let width = inner_width(content_width);
        let content_lines = wrap_line_count(&self.buffer, width);
        content_lines.min(MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    /// The wrapped lines currently scrolled into view.
    fn visible_text(&self, content_width: u16) -> String {
        if self.cursor.scroll_offset == 0 {
            return self.buffer.clone();
        }

        let width = inner_width(content_width);
        if width == 0 {
            return String::new();
        }

        let lines = textwrap::wrap(&self.buffer, wrap_options(width));
        let start = usize::from(self.cursor.scroll_offset).min(lines.len());
        let end = (start + usize::from(MAX_VISIBLE_LINES)).min(lines.len());
        lines[start..end].join("\n")
    }

    fn border_style(&self) -> Style {
        let style = match self.affordance {
            Affordance::Ready => Style::default().fg(Color::Green),
            Affordance::Waiting => Style::default().fg(Color::Yellow),
            Affordance::Offline => Style::default().fg(Color::Red),
        };
        if self.dimmed {
            style.add_modifier(Modifier::DIM)
        } else {
            style
        }
    }

    /// Render scrollbar when content exceeds visible area
    fn render_scrollbar(&self, frame: &mut Frame, area: Rect) {
        use ratatui::widgets::{Scrollbar, ScrollbarOrientation, ScrollbarState};

        let width = inner_width(area.width);
        let total_lines = wrap_line_count(&self.buffer, width);
        if total_lines <= MAX_VISIBLE_LINES {
            return;
        }

        // ScrollbarState content_length is max scrollable position, not total items
        let max_scroll = total_lines.saturating_sub(MAX_VISIBLE_LINES);
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(usize::from(max_scroll))
            .position(usize::from(self.cursor.scroll_offset));

        let scrollbar_area = Rect {
            x: area.x + area.width.saturating_sub(1),
            y: area.y + 1,
            width: 1,
            height: area.height.saturating_sub(2),
        };

        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn changed(moved: bool) -> Option<InputEvent> {
        moved.then_some(InputEvent::ContentChanged)
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.cursor.last_content_width = area.width;
        self.cursor.update_scroll_offset(&self.buffer, area.width);

        let border_style = self.border_style();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(Span::styled(self.affordance.label(), border_style));

        let input = if self.buffer.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                PLACEHOLDER,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )))
        } else {
            Paragraph::new(self.visible_text(area.width)).style(Style::default().fg(Color::White))
        };
        frame.render_widget(input.block(block), area);
        self.render_scrollbar(frame, area);

        if !self.dimmed {
            frame.set_cursor_position(self.cursor.screen_pos(&self.buffer, area));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor.pos, *c);
                self.cursor.pos += c.len_utf8();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                // Terminals paste CRLF line endings
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                self.buffer.insert_str(self.cursor.pos, &text);
                self.cursor.pos += text.len();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace => {
                if self.cursor.pos == 0 {
                    return None;
                }
                let prev = prev_char_boundary(&self.buffer, self.cursor.pos);
                self.buffer.drain(prev..self.cursor.pos);
                self.cursor.pos = prev;
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Delete => {
                if self.cursor.pos >= self.buffer.len() {
                    return None;
                }
                let next = next_char_boundary(&self.buffer, self.cursor.pos);
                self.buffer.drain(self.cursor.pos..next);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorLeft => Self::changed(self.cursor.left(&self.buffer)),
            TuiEvent::CursorRight => Self::changed(self.cursor.right(&self.buffer)),
            TuiEvent::CursorWordLeft => Self::changed(self.cursor.word_left(&self.buffer)),
            TuiEvent::CursorWordRight => Self::changed(self.cursor.word_right(&self.buffer)),
            TuiEvent::CursorHome => Self::changed(self.cursor.home(&self.buffer)),
            TuiEvent::CursorEnd => Self::changed(self.cursor.end(&self.buffer)),
            TuiEvent::CursorUp => Self::changed(self.cursor.move_vertically(&self.buffer, -1)),
            TuiEvent::CursorDown => Self::changed(self.cursor.move_vertically(&self.buffer, 1)),
            TuiEvent::Submit => {
                // Unavailable: keep the draft so it can be sent later
                if self.affordance != Affordance::Ready || self.buffer.trim().is_empty() {
                    return None;
                }
                let text = std::mem::take(&mut self.buffer);
                self.cursor.reset();
                Some(InputEvent::Submit(text))
            }
            _ => None,
        }
    }
}
