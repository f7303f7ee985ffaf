//! Wrapping and boundary helpers shared by `InputBox` and `CursorState`.
//!
//! Stateless. Widths are terminal columns, positions are byte offsets.

/// Border (2) + padding (2) consumed horizontally by the bordered block
pub(super) const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders consumed vertically
pub(super) const VERTICAL_OVERHEAD: u16 = 2;
/// Maximum visible content lines before internal scrolling kicks in
pub(super) const MAX_VISIBLE_LINES: u16 = 5;
/// Offset from area edge to content (border width)
pub(super) const BORDER_OFFSET: u16 = 1;

pub(super) fn wrap_options(inner_width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(inner_width as usize)
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Columns left for text once borders and padding are taken. 0 if too narrow.
pub(super) fn inner_width(content_width: u16) -> u16 {
    content_width.saturating_sub(HORIZONTAL_OVERHEAD)
}

/// Number of wrapped lines `text` occupies. Never less than 1.
///
/// textwrap drops a trailing empty line after a final `\n`, but the cursor
/// can sit there, so it is counted.
pub(super) fn wrap_line_count(text: &str, width: u16) -> u16 {
    if width == 0 || text.is_empty() {
        return 1;
    }

    let lines = textwrap::wrap(text, wrap_options(width));
    let mut count = u16::try_from(lines.len()).unwrap_or(u16::MAX).max(1);
    if text.ends_with('\n') && !lines.last().is_some_and(|l| l.is_empty()) {
        count = count.saturating_add(1);
    }
    count
}

pub(super) fn prev_char_boundary(text: &str, pos: usize) -> usize {
    text[..pos]
        .char_indices()
        .next_back()
        .map_or(0, |(i, _)| i)
}

pub(super) fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .char_indices()
        .nth(1)
        .map_or(text.len(), |(i, _)| pos + i)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start of the word before `pos`, readline `backward-word` style:
/// skip separators, then the word itself.
pub(super) fn prev_word_boundary(text: &str, pos: usize) -> usize {
    let mut chars = text[..pos].char_indices().rev().peekable();
    while chars.next_if(|&(_, c)| !is_word_char(c)).is_some() {}

    let mut boundary = 0;
    for (i, c) in chars {
        if !is_word_char(c) {
            boundary = i + c.len_utf8();
            break;
        }
        boundary = i;
    }
    boundary
}

/// End of the word after `pos`, readline `forward-word` style.
pub(super) fn next_word_boundary(text: &str, pos: usize) -> usize {
    let mut chars = text[pos..].char_indices().peekable();
    while chars.next_if(|&(_, c)| !is_word_char(c)).is_some() {}
    while chars.next_if(|&(_, c)| is_word_char(c)).is_some() {}
    chars.peek().map_or(text.len(), |&(i, _)| pos + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_line_count_basics() {
        assert_eq!(wrap_line_count("", 80), 1);
        assert_eq!(wrap_line_count("hello", 0), 1);
        assert_eq!(wrap_line_count("how many rows in orders?", 80), 1);
        assert_eq!(wrap_line_count("a\nb\nc", 80), 3);
    }

    #[test]
    fn wrap_line_count_breaks_long_words() {
        assert_eq!(wrap_line_count("SELECTCOUNT", 5), 3);
    }

    #[test]
    fn wrap_line_count_counts_line_after_trailing_newline() {
        assert_eq!(wrap_line_count("select\n", 80), 2);
        assert_eq!(wrap_line_count("aaaaaaaaaa\n", 5), 3);
    }

    #[test]
    fn char_boundaries_respect_multibyte() {
        let s = "a🔥é";
        assert_eq!(prev_char_boundary(s, s.len()), 5);
        assert_eq!(prev_char_boundary(s, 5), 1);
        assert_eq!(next_char_boundary(s, 0), 1);
        assert_eq!(next_char_boundary(s, 1), 5);
        assert_eq!(next_char_boundary(s, 5), s.len());
    }

    #[test]
    fn prev_word_skips_separators_then_word() {
        let q = "total sales, by region";
        assert_eq!(prev_word_boundary(q, q.len()), 16);
        assert_eq!(prev_word_boundary(q, 16), 13);
        assert_eq!(prev_word_boundary(q, 13), 6);
        assert_eq!(prev_word_boundary(q, 0), 0);
    }

    #[test]
    fn prev_word_treats_underscore_as_word() {
        assert_eq!(prev_word_boundary("sum of unit_price", 17), 7);
    }

    #[test]
    fn next_word_skips_separators_then_word() {
        let q = "total sales, by region";
        assert_eq!(next_word_boundary(q, 0), 5);
        assert_eq!(next_word_boundary(q, 5), 11);
        assert_eq!(next_word_boundary(q, 11), 15);
        assert_eq!(next_word_boundary(q, q.len()), q.len());
    }

    #[test]
    fn word_boundaries_handle_unicode() {
        let q = "café latte";
        assert_eq!(next_word_boundary(q, 0), 5);
        assert_eq!(prev_word_boundary(q, q.len()), 6);
    }
}
