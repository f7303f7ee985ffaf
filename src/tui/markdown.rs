//! Markdown → ratatui `Text` renderer.
//!
//! Converts `pulldown_cmark` events into styled `Line`/`Span` values for the
//! agent's synthesized answers: headings, emphasis, inline code, fenced code
//! (syntect), lists, blockquotes, links and GFM tables. Raw HTML is dropped.
//!
//! [`highlight_code`] is also used directly for the generated-code section of
//! the status panel.

use std::sync::LazyLock;

use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use unicode_width::UnicodeWidthStr;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const THEME_NAME: &str = "base16-ocean.dark";
const TAB: &str = "    ";

fn theme() -> Option<&'static Theme> {
    THEME_SET.themes.get(THEME_NAME)
}

/// Highlight `code` as `lang`, one `Line` per source line. Falls back to
/// `plain` when the language is unknown.
pub fn highlight_code(code: &str, lang: &str, plain: Style) -> Vec<Line<'static>> {
    let syntax = (!lang.is_empty())
        .then(|| SYNTAX_SET.find_syntax_by_token(lang))
        .flatten();
    match (syntax, theme()) {
        (Some(syntax), Some(theme)) => {
            let mut hl = HighlightLines::new(syntax, theme);
            LinesWithEndings::from(code)
                .map(|line| highlight_line(&mut hl, line, plain))
                .collect()
        }
        _ => code
            .lines()
            .map(|line| Line::from(Span::styled(line.replace('\t', TAB), plain)))
            .collect(),
    }
}

fn highlight_line(hl: &mut HighlightLines<'_>, line: &str, plain: Style) -> Line<'static> {
    match hl.highlight_line(line, &SYNTAX_SET) {
        Ok(ranges) => Line::from(
            ranges
                .into_iter()
                .filter_map(|(style, frag)| {
                    let content = frag.trim_end_matches(['\n', '\r']).replace('\t', TAB);
                    if content.is_empty() {
                        return None;
                    }
                    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                    Some(Span::styled(content, Style::default().fg(fg)))
                })
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            log::debug!("Highlighting failed, using plain style: {}", e);
            Line::from(Span::styled(
                line.trim_end_matches(['\n', '\r']).replace('\t', TAB),
                plain,
            ))
        }
    }
}

/// Parse markdown into styled `Text`. Output is owned (`'static`).
pub fn render(content: &str, base_fg: Color) -> Text<'static> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_TABLES);

    let mut w = Writer::new(base_fg);
    for event in Parser::new_ext(content, opts) {
        w.handle(event);
    }
    w.text
}

// ── Writer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TableBuilder {
    alignments: Vec<Alignment>,
    rows: Vec<Vec<Vec<Span<'static>>>>,
    header_rows: usize,
}

impl TableBuilder {
    fn start_row(&mut self) {
        self.rows.push(Vec::new());
    }

    fn start_cell(&mut self) {
        if let Some(row) = self.rows.last_mut() {
            row.push(Vec::new());
        }
    }

    fn push_span(&mut self, span: Span<'static>) {
        if let Some(cell) = self.rows.last_mut().and_then(|row| row.last_mut()) {
            cell.push(span);
        }
    }

    fn into_lines(self) -> Vec<Line<'static>> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let width_of = |cell: &Vec<Span<'static>>| -> usize {
            cell.iter().map(|s| s.content.width()).sum()
        };
        let mut widths = vec![0usize; columns];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(width_of(cell));
            }
        }

        let sep = Style::default().fg(Color::DarkGray);
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        for (r, row) in self.rows.into_iter().enumerate() {
            let mut spans = Vec::new();
            for (i, width) in widths.iter().copied().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" │ ", sep));
                }
                let cell = row.get(i).cloned().unwrap_or_default();
                let gap = width.saturating_sub(width_of(&cell));
                let (left, right) = match self.alignments.get(i) {
                    Some(Alignment::Right) => (gap, 0),
                    Some(Alignment::Center) => (gap / 2, gap - gap / 2),
                    _ => (0, gap),
                };
                if left > 0 {
                    spans.push(Span::raw(" ".repeat(left)));
                }
                spans.extend(cell);
                if right > 0 && i + 1 < columns {
                    spans.push(Span::raw(" ".repeat(right)));
                }
            }
            lines.push(Line::from(spans));

            if r + 1 == self.header_rows {
                let rule = widths
                    .iter()
                    .map(|w| "─".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("─┼─");
                lines.push(Line::from(Span::styled(rule, sep)));
            }
        }
        lines
    }
}

struct Writer {
    text: Text<'static>,
    base_fg: Color,
    /// Inline styles compose via `patch`, so nested bold+italic works.
    styles: Vec<Style>,
    /// Per-line prefixes (blockquote and code block rails).
    line_prefixes: Vec<Span<'static>>,
    /// None = unordered, Some(n) = ordered at index n.
    list_indices: Vec<Option<u64>>,
    /// Language and accumulated source of the open fenced block.
    code: Option<(String, String)>,
    table: Option<TableBuilder>,
    link_url: Option<String>,
    needs_newline: bool,
}

impl Writer {
    fn new(base_fg: Color) -> Self {
        Self {
            text: Text::default(),
            base_fg,
            styles: vec![],
            line_prefixes: vec![],
            list_indices: vec![],
            code: None,
            table: None,
            link_url: None,
            needs_newline: false,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.base_fg))
    }

    fn push_style(&mut self, overlay: Style) {
        self.styles.push(self.style().patch(overlay));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn push_line(&mut self, line: Line<'static>) {
        let mut out = line;
        for pfx in self.line_prefixes.iter().rev().cloned() {
            out.spans.insert(0, pfx);
        }
        self.text.lines.push(out);
    }

    fn push_span(&mut self, span: Span<'static>) {
        if let Some(table) = self.table.as_mut() {
            table.push_span(span);
            return;
        }
        if let Some(line) = self.text.lines.last_mut() {
            line.push_span(span);
        } else {
            self.push_line(Line::from(vec![span]));
        }
    }

    fn blank_line_if_needed(&mut self) {
        if self.needs_newline {
            self.push_line(Line::default());
            self.needs_newline = false;
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(t) => self.text(t),
            Event::Code(c) => {
                let style = Style::default().fg(Color::White).bg(Color::DarkGray);
                self.push_span(Span::styled(c.to_string(), style));
            }
            Event::SoftBreak => self.push_span(Span::raw(" ")),
            Event::HardBreak => self.push_line(Line::default()),
            Event::Rule => {
                self.blank_line_if_needed();
                self.push_line(Line::from(Span::styled(
                    "─".repeat(40),
                    Style::default().fg(Color::DarkGray),
                )));
                self.needs_newline = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_span(Span::raw(if checked { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.blank_line_if_needed();
                self.push_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.blank_line_if_needed();
                let hs = heading_style(self.base_fg, level);
                self.push_line(Line::from(Span::styled(
                    format!("{} ", "#".repeat(level as usize)),
                    hs,
                )));
                self.push_style(hs);
            }
            Tag::BlockQuote(_) => {
                self.blank_line_if_needed();
                self.line_prefixes
                    .push(Span::styled("│ ", Style::default().fg(Color::DarkGray)));
                self.push_style(
                    Style::default()
                        .fg(self.base_fg)
                        .add_modifier(Modifier::DIM | Modifier::ITALIC),
                );
            }
            Tag::CodeBlock(kind) => {
                self.blank_line_if_needed();
                let lang = match kind {
                    CodeBlockKind::Fenced(l) => l.split_whitespace().next().unwrap_or("").to_owned(),
                    CodeBlockKind::Indented => String::new(),
                };
                let bs = Style::default().fg(Color::DarkGray);
                let top = if lang.is_empty() {
                    Line::from(Span::styled("╭──", bs))
                } else {
                    Line::from(vec![
                        Span::styled("╭── ", bs),
                        Span::styled(lang.clone(), bs.add_modifier(Modifier::BOLD)),
                        Span::styled(" ──", bs),
                    ])
                };
                self.push_line(top);
                self.code = Some((lang, String::new()));
            }
            Tag::List(start) => {
                if self.list_indices.is_empty() {
                    self.blank_line_if_needed();
                }
                self.list_indices.push(start);
            }
            Tag::Item => {
                self.push_line(Line::default());
                let indent = "  ".repeat(self.list_indices.len().saturating_sub(1));
                if let Some(idx) = self.list_indices.last_mut() {
                    let marker = match idx {
                        None => format!("{indent}• "),
                        Some(n) => {
                            let s = format!("{indent}{n}. ");
                            *n += 1;
                            s
                        }
                    };
                    self.push_span(Span::styled(marker, Style::default().fg(Color::DarkGray)));
                }
            }
            Tag::Table(alignments) => {
                self.blank_line_if_needed();
                self.table = Some(TableBuilder {
                    alignments,
                    ..Default::default()
                });
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.start_row();
                }
                self.push_style(Style::default().add_modifier(Modifier::BOLD));
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.start_row();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.start_cell();
                }
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.push_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                );
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.needs_newline = true,
            TagEnd::Heading(_) => {
                self.pop_style();
                self.needs_newline = true;
            }
            TagEnd::BlockQuote(_) => {
                self.line_prefixes.pop();
                self.pop_style();
                self.needs_newline = true;
            }
            TagEnd::CodeBlock => {
                let bs = Style::default().fg(Color::DarkGray);
                if let Some((lang, source)) = self.code.take() {
                    let rail = Span::styled("│ ", bs);
                    for mut line in highlight_code(&source, &lang, Style::default().fg(Color::White)) {
                        line.spans.insert(0, rail.clone());
                        self.push_line(line);
                    }
                }
                self.push_line(Line::from(Span::styled("╰──", bs)));
                self.needs_newline = true;
            }
            TagEnd::List(_) => {
                self.list_indices.pop();
                self.needs_newline = true;
            }
            TagEnd::TableHead => {
                self.pop_style();
                if let Some(table) = self.table.as_mut() {
                    table.header_rows = table.rows.len();
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    for line in table.into_lines() {
                        self.push_line(line);
                    }
                }
                self.needs_newline = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link_url.take() {
                    self.push_span(Span::raw(" ("));
                    self.push_span(Span::styled(
                        url,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::UNDERLINED),
                    ));
                    self.push_span(Span::raw(")"));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, cow: CowStr<'_>) {
        if let Some((_, source)) = self.code.as_mut() {
            source.push_str(&cow);
            return;
        }
        // ratatui renders \t as zero-width
        let text = cow.replace('\t', TAB);
        let style = self.style();
        self.push_span(Span::styled(text, style));
    }
}

fn heading_style(base_fg: Color, level: HeadingLevel) -> Style {
    let modifier = match level {
        HeadingLevel::H1 => Modifier::BOLD | Modifier::UNDERLINED,
        HeadingLevel::H2 => Modifier::BOLD,
        _ => Modifier::BOLD | Modifier::ITALIC,
    };
    Style::default().fg(base_fg).add_modifier(modifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn heading_text_inherits_heading_style() {
        let text = render("## Result", Color::Blue);
        let line = &text.lines[0];
        assert!(line.spans.len() >= 2, "expected >= 2 spans, got {:?}", line);
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].style.fg, Some(Color::Blue));
    }

    #[test]
    fn bold_text_is_bold() {
        let text = render("The answer is **4**.", Color::Blue);
        let span = text.lines[0].spans.iter().find(|s| s.content == "4").unwrap();
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn plain_text_uses_base_color() {
        let text = render("hello", Color::Green);
        assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn code_block_has_rails() {
        let lines = plain(&render("```\nline1\n\tline2\n```", Color::Blue));
        assert!(lines[0].starts_with('╭'), "got {:?}", lines[0]);
        assert_eq!(lines[1], "│ line1");
        assert_eq!(lines[2], "│     line2");
        assert!(lines.last().unwrap().starts_with('╰'));
    }

    #[test]
    fn fenced_python_is_highlighted() {
        let text = render("```python\nx = 1\n```", Color::Blue);
        let body = &text.lines[1];
        assert!(
            body.spans.iter().any(|s| matches!(s.style.fg, Some(Color::Rgb(..)))),
            "expected syntect colors, got {:?}",
            body
        );
    }

    #[test]
    fn table_columns_align() {
        let md = "| city | sales |\n|------|------:|\n| Rome | 5 |\n| Oslo | 120 |";
        let lines = plain(&render(md, Color::Blue));
        assert_eq!(lines[0], "city │ sales");
        assert_eq!(lines[1], "─────┼──────");
        assert_eq!(lines[2], "Rome │     5");
        assert_eq!(lines[3], "Oslo │   120");
    }

    #[test]
    fn raw_html_is_dropped() {
        let lines = plain(&render("<script>alert(1)</script>\n\nok", Color::Blue));
        assert!(lines.iter().all(|l| !l.contains("script")));
        assert!(lines.iter().any(|l| l == "ok"));
    }

    #[test]
    fn highlight_code_unknown_language_is_plain() {
        let style = Style::default().fg(Color::White);
        let lines = highlight_code("a\nb", "no-such-lang", style);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].style, style);
    }

    #[test]
    fn highlight_code_python_keeps_line_count() {
        let lines = highlight_code("import pandas as pd\n\ndf = pd.read_csv('x')\n", "python", Style::default());
        assert_eq!(lines.len(), 3);
    }
}
