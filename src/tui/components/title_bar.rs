//! # TitleBar Component
//!
//! One-line header: app name and server on the left, connection state on
//! the right.
//!
//! ```text
//! Sift · http://localhost:5001                        ↓ New  ● connected
//! ```
//!
//! Purely presentational. All props come from the parent each frame:
//! - `server_url`, `connected`, `waiting`: core `App` state
//! - `has_unseen_content`: TUI scroll state
//!
//! On narrow terminals the server URL is truncated first; the connection
//! indicator always stays visible.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::tui::component::Component;

const APP_NAME: &str = "Sift";
const SEPARATOR: &str = " · ";
const UNSEEN: &str = "↓ New  ";
const ELLIPSIS: &str = "…";

pub struct TitleBar<'a> {
    pub server_url: &'a str,
    pub connected: bool,
    /// A query is in flight.
    pub waiting: bool,
    /// Content below the current scroll position.
    pub has_unseen_content: bool,
}

impl<'a> TitleBar<'a> {
    pub fn new(server_url: &'a str, connected: bool, waiting: bool, has_unseen_content: bool) -> Self {
        Self {
            server_url,
            connected,
            waiting,
            has_unseen_content,
        }
    }

    fn status(&self) -> Span<'static> {
        match (self.connected, self.waiting) {
            (false, _) => Span::styled("○ offline", Style::default().fg(Color::Red)),
            (true, true) => Span::styled("◌ working", Style::default().fg(Color::Yellow)),
            (true, false) => Span::styled("● connected", Style::default().fg(Color::Green)),
        }
    }

    /// The full line for a terminal `width` columns wide.
    pub fn line(&self, width: u16) -> Line<'static> {
        let status = self.status();
        let unseen = if self.has_unseen_content { UNSEEN } else { "" };
        let right_width = status.content.width() + unseen.width();

        let fixed = APP_NAME.width() + SEPARATOR.width() + right_width + 1;
        let url_budget = usize::from(width).saturating_sub(fixed);
        let url = truncate(self.server_url, url_budget);

        let left_width = APP_NAME.width() + SEPARATOR.width() + url.width();
        let gap = usize::from(width).saturating_sub(left_width + right_width);

        let dim = Style::default().fg(Color::DarkGray);
        Line::from(vec![
            Span::styled(APP_NAME, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(SEPARATOR, dim),
            Span::styled(url, dim),
            Span::raw(" ".repeat(gap)),
            Span::styled(unseen, Style::default().fg(Color::Cyan)),
            status,
        ])
    }
}

/// Cut `text` to at most `max` columns, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let budget = max - ELLIPSIS.width();
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ELLIPSIS);
    out
}

impl<'a> Component for TitleBar<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(self.line(area.width), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(title_bar: &mut TitleBar<'_>, width: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, 1)).unwrap();
        terminal.draw(|f| title_bar.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn shows_name_server_and_connection() {
        let mut bar = TitleBar::new("http://localhost:5001", true, false, false);
        let text = draw(&mut bar, 80);
        assert!(text.starts_with("Sift · http://localhost:5001"));
        assert!(text.trim_end().ends_with("● connected"));
        assert!(!text.contains("↓ New"));
    }

    #[test]
    fn offline_and_working_states() {
        let mut bar = TitleBar::new("http://localhost:5001", false, true, false);
        assert!(draw(&mut bar, 80).contains("○ offline"));

        bar.connected = true;
        assert!(draw(&mut bar, 80).contains("◌ working"));
    }

    #[test]
    fn unseen_indicator() {
        let mut bar = TitleBar::new("http://localhost:5001", true, false, true);
        assert!(draw(&mut bar, 80).contains("↓ New"));
    }

    #[test]
    fn narrow_terminal_truncates_url_but_keeps_status() {
        let bar = TitleBar::new("http://analytics.internal.example.com:5001", true, false, false);
        let line = bar.line(40);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains('…'));
        assert!(text.ends_with("● connected"));
        assert!(text.width() <= 40);
    }

    #[test]
    fn truncate_respects_wide_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("データベース", 5), "デー…");
        assert_eq!(truncate("abc", 0), "");
    }
}
