//! Cursor position tracking and navigation for the InputBox.
//!
//! `CursorState` owns the cursor byte offset, scroll offset, and cached width.
//! Navigation methods take `buffer: &str` explicitly since the text itself is
//! owned by `InputBox`. Each returns whether the cursor moved.

use ratatui::layout::Rect;
use unicode_width::UnicodeWidthStr;

use super::text_wrap::{
    BORDER_OFFSET, MAX_VISIBLE_LINES, inner_width, next_char_boundary, next_word_boundary,
    prev_char_boundary, prev_word_boundary, wrap_line_count, wrap_options,
};

pub(super) struct CursorState {
    /// Byte offset in buffer (0..=buffer.len())
    pub pos: usize,
    /// Line offset for internal scrolling (0 when content fits in viewport)
    pub scroll_offset: u16,
    /// Content width from last render (used for vertical movement)
    pub last_content_width: u16,
}

impl CursorState {
    const DEFAULT_WIDTH: u16 = 80;

    pub fn new() -> Self {
        Self {
            pos: 0,
            scroll_offset: 0,
            last_content_width: Self::DEFAULT_WIDTH,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.scroll_offset = 0;
    }

    fn jump(&mut self, target: usize) -> bool {
        let moved = target != self.pos;
        self.pos = target;
        moved
    }

    pub fn left(&mut self, buffer: &str) -> bool {
        self.pos > 0 && self.jump(prev_char_boundary(buffer, self.pos))
    }

    pub fn right(&mut self, buffer: &str) -> bool {
        self.pos < buffer.len() && self.jump(next_char_boundary(buffer, self.pos))
    }

    pub fn word_left(&mut self, buffer: &str) -> bool {
        self.jump(prev_word_boundary(buffer, self.pos))
    }

    pub fn word_right(&mut self, buffer: &str) -> bool {
        self.jump(next_word_boundary(buffer, self.pos))
    }

    /// Start of the current logical line.
    pub fn home(&mut self, buffer: &str) -> bool {
        let line_start = buffer[..self.pos].rfind('\n').map_or(0, |i| i + 1);
        self.jump(line_start)
    }

    /// End of the current logical line.
    pub fn end(&mut self, buffer: &str) -> bool {
        let line_end = buffer[self.pos..]
            .find('\n')
            .map_or(buffer.len(), |i| self.pos + i);
        self.jump(line_end)
    }

    /// Move one wrapped line up (`direction < 0`) or down, keeping the column
    /// where the target line is long enough.
    pub fn move_vertically(&mut self, buffer: &str, direction: i16) -> bool {
        let width = inner_width(self.last_content_width);
        if width == 0 || buffer.is_empty() {
            return false;
        }

        let lines = textwrap::wrap(buffer, wrap_options(width));
        if lines.is_empty() {
            return false;
        }

        // Bytes a wrapped line spans in the buffer, including a trailing newline
        let line_byte_span = |line: &str, offset: usize| -> usize {
            let has_newline = offset + line.len() < buffer.len()
                && buffer.as_bytes()[offset + line.len()] == b'\n';
            line.len() + usize::from(has_newline)
        };

        let mut byte_offset = 0;
        let mut current_line_idx = 0;
        let mut column_in_line = 0;
        for (idx, line) in lines.iter().enumerate() {
            if byte_offset + line.len() >= self.pos {
                current_line_idx = idx;
                column_in_line = self.pos - byte_offset;
                break;
            }
            byte_offset += line_byte_span(line, byte_offset);
        }

        let target_line_idx = if direction < 0 {
            match current_line_idx.checked_sub(1) {
                Some(idx) => idx,
                None => return false,
            }
        } else {
            if current_line_idx + 1 >= lines.len() {
                return false;
            }
            current_line_idx + 1
        };

        let mut target_line_start = 0;
        for line in lines.iter().take(target_line_idx) {
            target_line_start += line_byte_span(line, target_line_start);
        }

        let target_line = &lines[target_line_idx];
        let mut target_column = column_in_line.min(target_line.len());
        while !target_line.is_char_boundary(target_column) {
            target_column -= 1;
        }
        self.jump(target_line_start + target_column)
    }

    /// Which wrapped line (0-based) the cursor is on.
    pub fn calculate_line(&self, buffer: &str, content_width: u16) -> u16 {
        let width = inner_width(content_width);
        if width == 0 {
            return 0;
        }

        let before = &buffer[..self.pos];
        let lines = textwrap::wrap(before, wrap_options(width));
        let mut cursor_line = u16::try_from(lines.len().saturating_sub(1)).unwrap_or(u16::MAX);

        // Right after a newline textwrap didn't represent
        if before.ends_with('\n') && !lines.last().is_some_and(|l| l.is_empty()) {
            cursor_line = cursor_line.saturating_add(1);
        }
        cursor_line
    }

    /// Keep the cursor line inside the visible window.
    pub fn update_scroll_offset(&mut self, buffer: &str, content_width: u16) {
        let width = inner_width(content_width);
        if wrap_line_count(buffer, width) <= MAX_VISIBLE_LINES {
            self.scroll_offset = 0;
            return;
        }

        let cursor_line = self.calculate_line(buffer, content_width);
        if cursor_line < self.scroll_offset {
            self.scroll_offset = cursor_line;
        } else if cursor_line >= self.scroll_offset + MAX_VISIBLE_LINES {
            self.scroll_offset = cursor_line.saturating_sub(MAX_VISIBLE_LINES - 1);
        }
    }

    /// Screen (column, row) of the cursor inside `area`.
    pub fn screen_pos(&self, buffer: &str, area: Rect) -> (u16, u16) {
        let width = inner_width(area.width);
        if width == 0 {
            return (area.x + BORDER_OFFSET, area.y + BORDER_OFFSET);
        }

        let options = wrap_options(width);
        let before = &buffer[..self.pos];
        let cursor_line = self.calculate_line(buffer, area.width);

        // Measure from the last newline: textwrap trims trailing spaces, so the
        // wrapped segment alone would misplace a cursor after a space.
        let logical_start = before.rfind('\n').map_or(0, |i| i + 1);
        let logical = &before[logical_start..];
        let segments = textwrap::wrap(logical, options);
        let consumed: usize = segments
            .iter()
            .take(segments.len().saturating_sub(1))
            .map(|seg| seg.width())
            .sum();
        let cursor_col = u16::try_from(logical.width().saturating_sub(consumed)).unwrap_or(width);

        let visible_line = cursor_line.saturating_sub(self.scroll_offset);
        (
            area.x + BORDER_OFFSET + cursor_col.min(width),
            area.y + BORDER_OFFSET + visible_line,
        )
    }
}
