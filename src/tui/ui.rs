//! Frame layout and top-level drawing.
//!
//! ```text
//! ┌ title bar (1) ─────────────────────────┐
//! │ notice (0 when absent)                 │
//! │ transcript (fills)                     │
//! │ input box (3..=7)                      │
//! └────────────────────────────────────────┘
//! ```

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};

use crate::core::state::{App, Notice};
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, TitleBar};

/// Cap so a long agent error can't push the transcript off screen.
const MAX_NOTICE_LINES: u16 = 3;

struct Areas {
    title: Rect,
    notice: Rect,
    main: Rect,
    input: Rect,
}

fn layout_areas(frame_area: Rect, notice_height: u16, input_height: u16) -> Areas {
    use Constraint::{Length, Min};
    let layout = Layout::vertical([Length(1), Length(notice_height), Min(0), Length(input_height)]);
    let [title, notice, main, input] = layout.areas(frame_area);
    Areas {
        title,
        notice,
        main,
        input,
    }
}

fn notice_paragraph(notice: &Notice) -> Paragraph<'static> {
    let style = match notice {
        Notice::Connectivity => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Notice::AgentError(_) => Style::default().fg(Color::Red),
    };
    Paragraph::new(Line::from(Span::styled(format!(" ⚠ {notice}"), style)))
        .wrap(Wrap { trim: false })
}

/// Rows the notice banner takes at `width`. 0 when there is no notice.
pub fn notice_height(app: &App, width: u16) -> u16 {
    app.notice.as_ref().map_or(0, |notice| {
        let lines = notice_paragraph(notice).line_count(width);
        u16::try_from(lines)
            .unwrap_or(MAX_NOTICE_LINES)
            .clamp(1, MAX_NOTICE_LINES)
    })
}

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, spinner_frame: usize) {
    let frame_area = frame.area();
    let input_height = tui.input_box.calculate_height(frame_area.width);
    let areas = layout_areas(frame_area, notice_height(app, frame_area.width), input_height);

    TitleBar::new(
        &app.server_url,
        app.connected,
        app.is_waiting(),
        tui.message_list.has_unseen_content(),
    )
    .render(frame, areas.title);

    if let Some(notice) = &app.notice {
        frame.render_widget(notice_paragraph(notice), areas.notice);
    }

    if app.transcript.is_empty() {
        draw_empty_state(frame, areas.main);
    } else {
        MessageList::new(
            &mut tui.message_list,
            &app.transcript,
            tui.pulse_value,
            spinner_frame,
        )
        .render(frame, areas.main);
    }

    tui.input_box.render(frame, areas.input);
}

fn draw_empty_state(frame: &mut Frame, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let hint = Text::from(vec![
        Line::from(Span::styled(
            "Ask a question about your data to get started.",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Enter send · Shift+Enter newline · Esc browse · Ctrl+C quit",
            dim,
        )),
    ]);
    let height = u16::try_from(hint.lines.len()).unwrap_or(0);
    let top = area.y + area.height.saturating_sub(height) / 2;
    let centered = Rect::new(area.x, top, area.width, height.min(area.height));
    frame.render_widget(
        Paragraph::new(hint)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        centered,
    );
}

/// Which transcript record sits at screen row `screen_y`, and the row within
/// it (0 is the top border).
pub fn hit_test_message(
    screen_y: u16,
    frame_area: Rect,
    scroll_offset_y: u16,
    prefix_heights: &[u16],
    notice_height: u16,
    input_height: u16,
) -> Option<(usize, u16)> {
    let main = layout_areas(frame_area, notice_height, input_height).main;
    if screen_y < main.y || screen_y >= main.y + main.height {
        return None;
    }

    let content_y = (screen_y - main.y).saturating_add(scroll_offset_y);
    let index = prefix_heights.partition_point(|&end| end <= content_y);
    if index >= prefix_heights.len() {
        return None;
    }
    let top = index.checked_sub(1).map_or(0, |i| prefix_heights[i]);
    Some((index, content_y - top))
}
