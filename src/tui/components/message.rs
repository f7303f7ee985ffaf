use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::core::stage::{AssistantMessage, ContentRegion};
use crate::core::transcript::{MessageBody, MessageRecord};
use crate::tui::component::Component;
use crate::tui::components::status_panel::StatusPanel;
use crate::tui::markdown;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
pub const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
pub const VERTICAL_OVERHEAD: u16 = 2;

/// Pulse intensity threshold above which the border transitions from normal to BOLD.
const PULSE_BOLD_THRESHOLD: f32 = 0.6;
/// Pulse intensity threshold above which the border transitions from DIM to normal.
const PULSE_NORMAL_THRESHOLD: f32 = 0.2;

const USER_COLOR: Color = Color::Green;
const ASSISTANT_COLOR: Color = Color::Blue;

const ERROR_NOTICE: &str = "An error occurred. See the agent status above for details.";
const NO_ANSWER_NOTICE: &str = "The agent finished without producing an answer.";

/// Renders one transcript record inside a rounded, titled border.
///
/// User records are shown verbatim. Assistant records are the status panel
/// (once revealed) followed by the content region: a three-dot placeholder
/// while waiting, the markdown answer, or a notice.
///
/// Transient: built each frame by `MessageList` from the record plus the
/// presentation state it tracks (selection, hover, expansion override).
#[derive(Clone, Copy)]
pub struct MessageView<'a> {
    pub record: &'a MessageRecord,
    /// Whether the status panel is open. `MessageList` resolves user overrides.
    pub status_expanded: bool,
    pub is_hovered: bool,
    pub is_selected: bool,
    /// Border breathing for the in-flight message (0.0 to 1.0).
    pub pulse_intensity: f32,
    pub spinner_frame: usize,
}

impl<'a> MessageView<'a> {
    pub fn new(record: &'a MessageRecord) -> Self {
        let status_expanded = record
            .as_assistant()
            .is_some_and(|msg| msg.status.expanded);
        Self {
            record,
            status_expanded,
            is_hovered: false,
            is_selected: false,
            pulse_intensity: 0.0,
            spinner_frame: 0,
        }
    }

    /// Rendered height at `width`, borders included.
    ///
    /// Measured with the same wrapping paragraph that `render` draws, so the
    /// scroll layout never disagrees with what lands on screen.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            // Terminal too narrow for borders + padding.
            return 1;
        }
        let lines = self.paragraph().line_count(content_width);
        u16::try_from(lines).unwrap_or(u16::MAX).max(1) + VERTICAL_OVERHEAD
    }

    pub fn text(&self) -> Text<'static> {
        match &self.record.body {
            MessageBody::User(text) => {
                Text::styled(text.trim_end().to_string(), Style::default().fg(USER_COLOR))
            }
            MessageBody::Assistant(msg) => self.assistant_text(msg),
        }
    }

    fn assistant_text(&self, msg: &AssistantMessage) -> Text<'static> {
        let mut lines: Vec<Line<'static>> = Vec::new();

        if msg.status.visible {
            lines.extend(StatusPanel::new(&msg.status, &msg.log, self.status_expanded).lines());
            lines.push(Line::default());
        }

        match &msg.content {
            ContentRegion::Placeholder => lines.push(thinking_dots(self.spinner_frame)),
            ContentRegion::Answer(answer) => {
                let rendered = markdown::render(answer, ASSISTANT_COLOR);
                // The renderer opens paragraphs with an empty line; keep the body tight.
                let skip = rendered
                    .lines
                    .iter()
                    .take_while(|l| l.spans.is_empty())
                    .count();
                lines.extend(rendered.lines.into_iter().skip(skip));
            }
            ContentRegion::Error => lines.push(Line::from(Span::styled(
                ERROR_NOTICE,
                Style::default().fg(Color::Red),
            ))),
            ContentRegion::NoAnswer => lines.push(Line::from(Span::styled(
                NO_ANSWER_NOTICE,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ))),
        }

        Text::from(lines)
    }

    fn paragraph(&self) -> Paragraph<'static> {
        Paragraph::new(self.text()).wrap(Wrap { trim: false })
    }

    fn title(&self) -> (&'static str, Color) {
        match self.record.body {
            MessageBody::User(_) => ("you", USER_COLOR),
            MessageBody::Assistant(_) => ("agent", ASSISTANT_COLOR),
        }
    }
}

/// Three dots filling up in turn: `·  `, `·· `, `···`.
fn thinking_dots(frame: usize) -> Line<'static> {
    let filled = frame % 3 + 1;
    Line::from(Span::styled(
        format!("{:<3}", "·".repeat(filled)),
        Style::default().fg(Color::DarkGray),
    ))
}

impl<'a> Widget for MessageView<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (role, color) = self.title();
        let style = Style::default().fg(color);

        // Selection overrides hover: cyan border for selected, bright for hover, dim otherwise
        let mut border_style = if self.is_selected {
            Style::default().fg(Color::Cyan)
        } else if self.is_hovered {
            style
        } else {
            style.add_modifier(Modifier::DIM)
        };

        // Three-phase breathing: DIM → normal → BOLD
        if self.pulse_intensity > PULSE_BOLD_THRESHOLD {
            border_style = border_style
                .remove_modifier(Modifier::DIM)
                .add_modifier(Modifier::BOLD);
        } else if self.pulse_intensity > PULSE_NORMAL_THRESHOLD {
            border_style = border_style.remove_modifier(Modifier::DIM);
        }

        let timestamp = self.record.created_at.format("%H:%M").to_string();
        let block = Block::bordered()
            .title(role)
            .title(Line::from(timestamp).right_aligned())
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);
        self.paragraph().render(inner_area, buf);
    }
}

impl<'a> Component for MessageView<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{AgentError, QueryComplete, StageUpdate};
    use crate::core::transcript::Transcript;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn user(text: &str) -> MessageRecord {
        let mut t = Transcript::new();
        t.append_user(text);
        t.records()[0].clone()
    }

    fn assistant(configure: impl FnOnce(&mut AssistantMessage)) -> MessageRecord {
        let mut t = Transcript::new();
        t.append_pending_assistant().unwrap();
        if let Some(msg) = t.pending_mut() {
            configure(msg);
        }
        t.records()[0].clone()
    }

    fn stage(payload: serde_json::Value) -> StageUpdate {
        serde_json::from_value(payload).unwrap()
    }

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn draw(view: MessageView<'_>, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| f.render_widget(view, f.area()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    // ==========================================================================
    // Content
    // ==========================================================================

    #[test]
    fn user_text_is_literal() {
        let record = user("**not bold** <b>nor this</b>");
        let text = MessageView::new(&record).text();
        assert_eq!(plain(&text), vec!["**not bold** <b>nor this</b>"]);
    }

    #[test]
    fn pending_message_shows_only_placeholder() {
        let record = assistant(|_| {});
        let view = MessageView {
            spinner_frame: 1,
            ..MessageView::new(&record)
        };
        assert_eq!(plain(&view.text()), vec!["·· "]);
    }

    #[test]
    fn revealed_status_precedes_content() {
        let record = assistant(|m| m.apply(&stage(json!({"stage": "router", "decision": "sql"}))));
        let text = plain(&MessageView::new(&record).text());
        assert_eq!(text[0], "▾ ⚙ Agent Status · Routing... Decision: sql");
        assert_eq!(text[1], "");
        assert_eq!(text[2], "·  ");
    }

    #[test]
    fn answer_is_rendered_as_markdown() {
        let record = assistant(|m| {
            m.apply(&stage(json!({"stage": "synthesis", "status": "complete", "answer": "Total is **42**"})));
            m.complete(&QueryComplete::default());
        });
        let view = MessageView::new(&record);
        let text = view.text();
        // Collapsed after completion.
        assert!(plain(&text)[0].starts_with("▸ "));
        let bold = text
            .lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .find(|s| s.content == "42")
            .unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn error_shows_notice_after_expanded_log() {
        let record = assistant(|m| m.fail(&AgentError::new("LLM timeout")));
        let text = plain(&MessageView::new(&record).text());
        assert_eq!(text[0], "▾ ⚙ Agent Status · Error!");
        assert_eq!(text[1], "  LLM timeout");
        assert_eq!(text.last().unwrap(), ERROR_NOTICE);
    }

    #[test]
    fn completion_without_answer_shows_no_answer_notice() {
        let record = assistant(|m| m.complete(&QueryComplete::default()));
        let text = plain(&MessageView::new(&record).text());
        assert_eq!(text, vec![NO_ANSWER_NOTICE]);
    }

    #[test]
    fn expansion_override_hides_log() {
        let record = assistant(|m| {
            m.apply(&stage(json!({"stage": "planner", "code": "print(1)"})));
        });
        let open = MessageView::new(&record);
        let closed = MessageView {
            status_expanded: false,
            ..open
        };
        assert!(open.text().lines.len() > closed.text().lines.len());
        assert!(plain(&closed.text())[0].starts_with("▸ "));
    }

    // ==========================================================================
    // Height
    // ==========================================================================

    #[test]
    fn calculate_height_single_line() {
        let record = user("Hello");
        assert_eq!(
            MessageView::new(&record).calculate_height(80),
            1 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_wraps() {
        let record = user("Hello world");
        // width 9 → content width 5: "Hello" | "world"
        assert_eq!(
            MessageView::new(&record).calculate_height(9),
            2 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_counts_explicit_newlines() {
        let record = user("a\nb\nc");
        assert_eq!(
            MessageView::new(&record).calculate_height(80),
            3 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_degenerate_width() {
        let record = user("Hello");
        assert_eq!(MessageView::new(&record).calculate_height(HORIZONTAL_OVERHEAD), 1);
    }

    #[test]
    fn calculate_height_grows_with_log() {
        let record = assistant(|m| {
            m.apply(&stage(json!({"stage": "execution", "attempt": 1, "max_retries": 3, "status": "running"})));
        });
        let before = MessageView::new(&record).calculate_height(60);
        let record = assistant(|m| {
            m.apply(&stage(json!({"stage": "execution", "attempt": 1, "max_retries": 3, "status": "failed", "output": "oops"})));
        });
        let after = MessageView::new(&record).calculate_height(60);
        assert!(after > before);
    }

    // ==========================================================================
    // Rendering
    // ==========================================================================

    #[test]
    fn render_shows_role_and_content() {
        let record = user("what is 2+2");
        let screen = draw(MessageView::new(&record), 40, 3);
        assert!(screen.contains("you"));
        assert!(screen.contains("what is 2+2"));
    }

    #[test]
    fn render_assistant_shows_summary() {
        let record = assistant(|m| m.apply(&stage(json!({"stage": "planner"}))));
        let view = MessageView::new(&record);
        let height = view.calculate_height(60);
        let screen = draw(view, 60, height);
        assert!(screen.contains("agent"));
        assert!(screen.contains("Generating Code..."));
    }
}
