//! # StatusPanel Component
//!
//! The collapsible "Agent Status" region at the top of an assistant message.
//!
//! ```text
//! ▾ ⚙ Agent Status · Executing... (Attempt 2/3)
//!   Generated Code:
//!     df = pd.read_csv("sales.csv")
//!
//!   Attempt 1 Failed:
//!     NameError: name 'pd' is not defined
//!
//!   Generated Code:
//!     import pandas as pd
//!     df = pd.read_csv("sales.csv")
//!
//!   Attempt 2 Output:
//!     4
//! ```
//!
//! Produces lines rather than rendering itself so `MessageView` can measure
//! and wrap the whole message as one paragraph.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::stage::{DetailLog, LogEntry, StatusRegion, Summary};
use crate::tui::markdown::highlight_code;

const INDENT: &str = "  ";
const DEEP_INDENT: &str = "    ";
const PLAN_LANGUAGE: &str = "python";

const fn label_style() -> Style {
    Style::new().fg(Color::White).add_modifier(Modifier::BOLD)
}
const fn error_style() -> Style {
    Style::new().fg(Color::Red)
}
const fn output_style() -> Style {
    Style::new().fg(Color::Gray)
}

pub struct StatusPanel<'a> {
    pub status: &'a StatusRegion,
    pub log: &'a DetailLog,
    /// Effective expansion (record default or the user's override).
    pub expanded: bool,
}

impl<'a> StatusPanel<'a> {
    pub fn new(status: &'a StatusRegion, log: &'a DetailLog, expanded: bool) -> Self {
        Self {
            status,
            log,
            expanded,
        }
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![self.header()];
        if self.expanded {
            for section in self.sections() {
                lines.extend(section);
            }
        }
        lines
    }

    fn header(&self) -> Line<'static> {
        let arrow = if self.expanded { "▾ " } else { "▸ " };
        let dim = Style::default().fg(Color::DarkGray);
        Line::from(vec![
            Span::styled(arrow, dim),
            Span::styled("⚙ Agent Status", Style::default().fg(Color::Yellow)),
            Span::styled(" · ", dim),
            Span::styled(self.status.summary.to_string(), summary_style(&self.status.summary)),
        ])
    }

    /// One block of lines per log entry, in log order, separated by blank lines.
    fn sections(&self) -> Vec<Vec<Line<'static>>> {
        let mut sections = Vec::new();

        for entry in self.log.entries() {
            let section = match entry {
                LogEntry::Plan(code) => {
                    let mut s = vec![label("Generated Code:", label_style())];
                    s.extend(indented(highlight_code(
                        code,
                        PLAN_LANGUAGE,
                        Style::default().fg(Color::White),
                    )));
                    s
                }
                LogEntry::AttemptSucceeded { attempt, output } => {
                    let mut s = vec![label(
                        format!("Attempt {} Output:", attempt_label(*attempt)),
                        label_style(),
                    )];
                    s.extend(block(output, output_style(), DEEP_INDENT));
                    s
                }
                LogEntry::AttemptFailed { attempt, output } => {
                    let mut s = vec![label(
                        format!("Attempt {} Failed:", attempt_label(*attempt)),
                        error_style().add_modifier(Modifier::BOLD),
                    )];
                    s.extend(block(output, output_style(), DEEP_INDENT));
                    s
                }
                LogEntry::Performance(timings) => {
                    let mut s = vec![label("Performance Log:", label_style())];
                    s.extend(timings.iter().map(|(name, secs)| {
                        Line::from(Span::styled(
                            format!("{DEEP_INDENT}{name}: {secs:.2}s"),
                            output_style(),
                        ))
                    }));
                    s
                }
                LogEntry::Error(detail) => block(detail, error_style(), INDENT),
            };
            sections.push(section);
        }

        // Blank line between sections
        for section in sections.iter_mut().skip(1) {
            section.insert(0, Line::default());
        }
        sections
    }
}

fn summary_style(summary: &Summary) -> Style {
    match summary {
        Summary::Error => error_style().add_modifier(Modifier::BOLD),
        Summary::Synthesized => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::Yellow),
    }
}

fn attempt_label(attempt: Option<u32>) -> String {
    attempt.map_or_else(|| "?".to_string(), |n| n.to_string())
}

fn label(text: impl Into<String>, style: Style) -> Line<'static> {
    Line::from(vec![Span::raw(INDENT), Span::styled(text.into(), style)])
}

fn indented(lines: Vec<Line<'static>>) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .map(|mut line| {
            line.spans.insert(0, Span::raw(DEEP_INDENT));
            line
        })
        .collect()
}

/// Preformatted text, one line per source line, tabs expanded.
fn block(text: &str, style: Style, indent: &'static str) -> Vec<Line<'static>> {
    text.trim_end()
        .lines()
        .map(|l| {
            Line::from(vec![
                Span::raw(indent),
                Span::styled(l.replace('\t', "    "), style),
            ])
        })
        .collect()
}
