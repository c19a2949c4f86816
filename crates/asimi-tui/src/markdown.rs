// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Markdown → ratatui rendering for assistant messages.
//!
//! The renderer is created lazily on the first size change and reused for
//! the rest of the session; wrapping re-runs per render, so a resize only
//! costs a re-wrap, never a renderer rebuild.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

pub struct MarkdownRenderer {
    width: u16,
}

impl MarkdownRenderer {
    pub fn new(width: u16) -> Self {
        Self { width: width.max(10) }
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width.max(10);
    }

    /// Render markdown text into styled, wrapped lines.  `<thinking>` blocks
    /// are split out and boxed in italics.
    pub fn render(&self, text: &str) -> Vec<Line<'static>> {
        let mut out = Vec::new();
        for segment in split_thinking(text) {
            match segment {
                Segment::Thinking(inner) => {
                    out.push(Line::from(Span::styled(
                        "┌─ thinking ─",
                        Style::default().fg(Color::DarkGray),
                    )));
                    for line in wrap(&inner, self.width.saturating_sub(2) as usize) {
                        out.push(Line::from(Span::styled(
                            format!("│ {line}"),
                            Style::default()
                                .fg(Color::DarkGray)
                                .add_modifier(Modifier::ITALIC),
                        )));
                    }
                    out.push(Line::from(Span::styled(
                        "└─",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                Segment::Markdown(inner) => out.extend(self.render_markdown(&inner)),
            }
        }
        out
    }

    fn render_markdown(&self, text: &str) -> Vec<Line<'static>> {
        let parser = Parser::new_ext(text, Options::empty());
        let mut lines: Vec<Line<'static>> = Vec::new();
        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut style = Style::default();
        let mut in_code_block = false;
        let mut list_depth: usize = 0;

        let flush =
            |spans: &mut Vec<Span<'static>>, lines: &mut Vec<Line<'static>>, width: u16| {
                if spans.is_empty() {
                    return;
                }
                let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
                let style = spans.first().map(|s| s.style).unwrap_or_default();
                for wrapped in wrap(&text, width as usize) {
                    lines.push(Line::from(Span::styled(wrapped, style)));
                }
                spans.clear();
            };

        for event in parser {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    style = Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan);
                }
                Event::End(TagEnd::Heading(_)) => {
                    flush(&mut spans, &mut lines, self.width);
                    style = Style::default();
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    flush(&mut spans, &mut lines, self.width);
                    in_code_block = true;
                    let lang = match kind {
                        CodeBlockKind::Fenced(l) if !l.is_empty() => l.into_string(),
                        _ => String::new(),
                    };
                    lines.push(Line::from(Span::styled(
                        format!("```{lang}"),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    lines.push(Line::from(Span::styled(
                        "```",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                Event::Start(Tag::List(_)) => list_depth += 1,
                Event::End(TagEnd::List(_)) => list_depth = list_depth.saturating_sub(1),
                Event::Start(Tag::Item) => {
                    flush(&mut spans, &mut lines, self.width);
                    spans.push(Span::styled(
                        format!("{}• ", "  ".repeat(list_depth.saturating_sub(1))),
                        style,
                    ));
                }
                Event::End(TagEnd::Item) => flush(&mut spans, &mut lines, self.width),
                Event::Start(Tag::Emphasis) => style = style.add_modifier(Modifier::ITALIC),
                Event::End(TagEnd::Emphasis) => style = style.remove_modifier(Modifier::ITALIC),
                Event::Start(Tag::Strong) => style = style.add_modifier(Modifier::BOLD),
                Event::End(TagEnd::Strong) => style = style.remove_modifier(Modifier::BOLD),
                Event::Code(code) => {
                    spans.push(Span::styled(
                        code.into_string(),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                Event::Text(text) => {
                    if in_code_block {
                        for l in text.lines() {
                            lines.push(Line::from(Span::styled(
                                l.to_string(),
                                Style::default().fg(Color::Green),
                            )));
                        }
                    } else {
                        spans.push(Span::styled(text.into_string(), style));
                    }
                }
                Event::SoftBreak => spans.push(Span::styled(" ".to_string(), style)),
                Event::HardBreak | Event::End(TagEnd::Paragraph) => {
                    flush(&mut spans, &mut lines, self.width);
                }
                Event::Rule => {
                    flush(&mut spans, &mut lines, self.width);
                    lines.push(Line::from(Span::styled(
                        "─".repeat(self.width as usize),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                _ => {}
            }
        }
        flush(&mut spans, &mut lines, self.width);
        lines
    }
}

enum Segment {
    Markdown(String),
    Thinking(String),
}

/// Split `<thinking>…</thinking>` regions out of the text.  An unterminated
/// block (stream still in flight) runs to the end of the text.
fn split_thinking(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<thinking>") {
        if start > 0 {
            segments.push(Segment::Markdown(rest[..start].to_string()));
        }
        let after = &rest[start + "<thinking>".len()..];
        match after.find("</thinking>") {
            Some(end) => {
                segments.push(Segment::Thinking(after[..end].trim().to_string()));
                rest = &after[end + "</thinking>".len()..];
            }
            None => {
                segments.push(Segment::Thinking(after.trim().to_string()));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Markdown(rest.to_string()));
    }
    segments
}

/// Greedy word wrap on display width.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw_line in text.lines() {
        if raw_line.width() <= width {
            out.push(raw_line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if !current.is_empty() && current.width() + 1 + word.width() > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_text(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|l| {
                l.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("one two three four five", 9);
        assert!(lines.iter().all(|l| l.width() <= 9), "{lines:?}");
        assert_eq!(lines.join(" "), "one two three four five");
    }

    #[test]
    fn wrap_keeps_short_lines_intact() {
        assert_eq!(wrap("short", 80), vec!["short"]);
    }

    #[test]
    fn renders_paragraph_and_heading() {
        let r = MarkdownRenderer::new(80);
        let lines = r.render("# Title\n\nbody text");
        let text = rendered_text(&lines);
        assert!(text.contains("Title"));
        assert!(text.contains("body text"));
    }

    #[test]
    fn code_block_is_fenced_in_output() {
        let r = MarkdownRenderer::new(80);
        let lines = r.render("```rust\nfn main() {}\n```");
        let text = rendered_text(&lines);
        assert!(text.contains("```rust"));
        assert!(text.contains("fn main() {}"));
    }

    #[test]
    fn list_items_get_bullets() {
        let r = MarkdownRenderer::new(80);
        let text = rendered_text(&r.render("- alpha\n- beta"));
        assert!(text.contains("• alpha"));
        assert!(text.contains("• beta"));
    }

    #[test]
    fn thinking_block_is_boxed_and_italic() {
        let r = MarkdownRenderer::new(80);
        let lines = r.render("before <thinking>deep thought</thinking> after");
        let text = rendered_text(&lines);
        assert!(text.contains("┌─ thinking ─"));
        assert!(text.contains("│ deep thought"));
        assert!(text.contains("└─"));
        assert!(text.contains("before"));
        assert!(text.contains("after"));
        let boxed = lines
            .iter()
            .find(|l| rendered_text(&[(*l).clone()]).contains("deep thought"))
            .unwrap();
        assert!(boxed.spans[0].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn unterminated_thinking_block_renders() {
        let r = MarkdownRenderer::new(80);
        let text = rendered_text(&r.render("<thinking>still going"));
        assert!(text.contains("still going"));
    }

    #[test]
    fn width_floor_prevents_degenerate_wrapping() {
        let r = MarkdownRenderer::new(0);
        let lines = r.render("hello world");
        assert!(!lines.is_empty());
    }
}
