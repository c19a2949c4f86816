// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Frame drawing: layout and the per-component render functions.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::{
    app::App,
    chat::{assistant_glyph, classify, AssistantGlyph, MessageKind},
    commandline::ToastSeverity,
    editor::EditorMode,
    markdown::wrap,
    router::ContentView,
    status::{self, StatusInput},
};

const PROMPT_ACCENT: Color = Color::Magenta;
const USER_RIGHT_MARGIN: usize = 8;

pub(crate) fn draw(frame: &mut Frame, app: &mut App) {
    let editor_cap = frame.area().height / 2;
    let editor_height = app.editor.desired_height(editor_cap) + 2;
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(editor_height),
        Constraint::Length(1),
    ])
    .split(frame.area());

    draw_status(frame, chunks[0], app);
    match app.router.view() {
        ContentView::Chat => draw_chat(frame, chunks[1], app),
        ContentView::Help => draw_help(frame, chunks[1], app),
        ContentView::Models | ContentView::Resume => draw_list(frame, chunks[1], app),
    }
    draw_editor(frame, chunks[2], app);
    draw_bottom_line(frame, chunks[3], app);
    if app.popup.is_visible() {
        draw_popup(frame, chunks[2], app);
    }
    if app.pending_approval.is_some() {
        draw_approval_modal(frame, app);
    }
}

/// Modal dialog for a host-escaping command awaiting user approval.
fn draw_approval_modal(frame: &mut Frame, app: &App) {
    let Some(req) = &app.pending_approval else {
        return;
    };
    let screen = frame.area();
    let width = (screen.width * 3 / 4).clamp(30, 90);
    let height = 6;
    let area = Rect {
        x: (screen.width.saturating_sub(width)) / 2,
        y: (screen.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, area);
    let lines = vec![
        Line::from("This command wants to run on the HOST:"),
        Line::from(Span::styled(
            req.command.clone(),
            Style::default().fg(Color::Yellow),
        )),
        Line::default(),
        Line::from("y / Enter = allow      n / Esc = deny"),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" approval required "),
        ),
        area,
    );
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let diff = app.repo.has_changes().then(|| app.repo.diff_stats());
    let input = StatusInput {
        mode_token: app.editor.mode.token(),
        branch: &app.repo.branch,
        branch_is_main: app.repo.on_main_branch(),
        diff,
        context_pct: app.context_pct,
        session_duration: app.session_started.elapsed(),
        waiting_secs: app.waiting_secs(),
        provider_model: &app.provider_model,
        conn: app.conn,
    };
    frame.render_widget(Paragraph::new(status::compose(&input, area.width)), area);
}

// ── Chat ──────────────────────────────────────────────────────────────────────

fn draw_chat(frame: &mut Frame, area: Rect, app: &mut App) {
    let width = area.width.saturating_sub(2).max(20);
    app.markdown.set_width(width);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for msg in app.chat.messages() {
        lines.extend(render_message(app, msg, width));
        lines.push(Line::default());
    }

    let inner_height = area.height.saturating_sub(2);
    let max_scroll = (lines.len() as u16).saturating_sub(inner_height);
    app.chat_max_scroll = max_scroll;
    if app.chat.autoscroll() {
        app.chat.scroll = max_scroll;
    } else {
        app.chat.scroll = app.chat.scroll.min(max_scroll);
    }

    let title = if app.chat.scroll_locked() { " chat [scroll] " } else { " chat " };
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((app.chat.scroll, 0));
    frame.render_widget(widget, area);
}

fn render_message(app: &App, msg: &str, width: u16) -> Vec<Line<'static>> {
    match classify(msg) {
        MessageKind::UserCommand => {
            let cmd = msg.trim_start_matches("You:$").trim();
            vec![Line::from(Span::styled(
                format!("$ {cmd}"),
                Style::default().fg(PROMPT_ACCENT),
            ))]
        }
        MessageKind::UserPrompt => {
            let body = msg.trim_start_matches("You:").trim();
            user_prompt_lines(body, width as usize)
        }
        MessageKind::Assistant => {
            let (body, glyph) = assistant_glyph(msg);
            let body = body.trim_start_matches("Asimi:").trim_start();
            let (glyph_str, glyph_color) = match glyph {
                AssistantGlyph::Default => ("●", Color::Blue),
                AssistantGlyph::Success => ("✔", Color::Green),
                AssistantGlyph::Failure => ("✘", Color::Red),
            };
            let mut lines = vec![Line::from(Span::styled(
                glyph_str.to_string(),
                Style::default().fg(glyph_color),
            ))];
            lines.extend(app.markdown.render(body));
            lines
        }
        MessageKind::Plain => msg
            .lines()
            .flat_map(|l| wrap(l, width as usize))
            .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::Gray))))
            .collect(),
    }
}

/// User prompts render right-aligned, indented 8 columns from the right edge.
fn user_prompt_lines(body: &str, width: usize) -> Vec<Line<'static>> {
    let usable = width.saturating_sub(USER_RIGHT_MARGIN).max(10);
    wrap(body, usable)
        .into_iter()
        .map(|l| {
            let pad = width.saturating_sub(l.width() + USER_RIGHT_MARGIN);
            Line::from(vec![
                Span::raw(" ".repeat(pad)),
                Span::styled(l, Style::default().fg(PROMPT_ACCENT)),
            ])
        })
        .collect()
}

// ── Editor ────────────────────────────────────────────────────────────────────

fn mode_color(mode: EditorMode) -> Color {
    match mode {
        EditorMode::Insert => Color::Blue,
        EditorMode::Normal => Color::Green,
        EditorMode::Visual => Color::Magenta,
        EditorMode::Command => Color::Yellow,
        EditorMode::Learning => Color::Cyan,
    }
}

fn draw_editor(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(mode_color(app.editor.mode)))
        .title(format!(" {} ", app.editor.mode.token()));
    let text: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .map(|l| Line::from(l.clone()))
        .collect();
    frame.render_widget(Paragraph::new(text).block(block), area);

    if matches!(app.editor.mode, EditorMode::Insert | EditorMode::Learning)
        && !app.cmdline.active
    {
        let (row, col) = app.editor.cursor();
        let line = app.editor.lines().get(row).map(String::as_str).unwrap_or("");
        let col_width: usize = line.chars().take(col).collect::<String>().width();
        frame.set_cursor_position((
            area.x + 1 + col_width as u16,
            area.y + 1 + row as u16,
        ));
    }
}

// ── Bottom line ───────────────────────────────────────────────────────────────

fn draw_bottom_line(frame: &mut Frame, area: Rect, app: &App) {
    if app.cmdline.active {
        let text = format!(":{}", app.cmdline.text());
        frame.render_widget(Paragraph::new(text), area);
        frame.set_cursor_position((area.x + 1 + app.cmdline.cursor() as u16, area.y));
        return;
    }
    if let Some(toast) = app.toasts.current() {
        let color = match toast.severity {
            ToastSeverity::Info => Color::Cyan,
            ToastSeverity::Success => Color::Green,
            ToastSeverity::Warning => Color::Yellow,
            ToastSeverity::Error => Color::Red,
        };
        frame.render_widget(
            Paragraph::new(Span::styled(toast.text.clone(), Style::default().fg(color))),
            area,
        );
    }
}

// ── Completion popup ──────────────────────────────────────────────────────────

fn draw_popup(frame: &mut Frame, editor_area: Rect, app: &App) {
    let visible = app.popup.visible_items();
    if visible.is_empty() {
        return;
    }
    let height = (visible.len() as u16 + 2).min(editor_area.y);
    let max_width = editor_area.width.saturating_sub(4).max(16);
    let width = visible
        .iter()
        .map(|i| i.width() as u16)
        .max()
        .unwrap_or(10)
        .max(16)
        .min(max_width)
        + 4;
    let area = Rect {
        x: editor_area.x + 1,
        y: editor_area.y.saturating_sub(height),
        width,
        height,
    };
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let absolute = app.popup.offset + i;
            let style = if absolute == app.popup.selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(item.clone(), style))
        })
        .collect();
    frame.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

// ── Help / list views ─────────────────────────────────────────────────────────

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled("asimi help", Style::default().add_modifier(Modifier::BOLD))),
        Line::default(),
        Line::from("  Enter        submit prompt (insert mode)"),
        Line::from("  Esc          normal mode / cancel streaming turn"),
        Line::from("  :            command line (see commands below)"),
        Line::from("  @path        load a file into the conversation context"),
        Line::from("  Ctrl-B       scroll mode (j/k, Ctrl-u/d, g/G; Esc to leave)"),
        Line::from("  Ctrl-L       learning mode: note a rule into AGENTS.md"),
        Line::from("  Ctrl-C ×2    quit"),
        Line::default(),
        Line::from(Span::styled("commands", Style::default().add_modifier(Modifier::BOLD))),
        Line::default(),
    ];
    for cmd in app.registry.iter() {
        if let Some(topic) = &app.router.help_topic {
            if !cmd.name.contains(topic.as_str()) {
                continue;
            }
        }
        lines.push(Line::from(format!("  :{:<14} {}", cmd.name, cmd.description)));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "double-Esc returns to chat",
        Style::default().fg(Color::DarkGray),
    )));
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" help "))
        .scroll((app.router.scroll, 0));
    frame.render_widget(widget, area);
}

fn draw_list(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.router.view() {
        ContentView::Models => " models ",
        ContentView::Resume => " resume ",
        _ => " ",
    };
    let items: Vec<ListItem> = app
        .router
        .items
        .iter()
        .map(|row| ListItem::new(row.clone()))
        .collect();
    let mut state = ListState::default();
    state.select(Some(app.router.selected));
    let widget = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("» ");
    frame.render_stateful_widget(widget, area, &mut state);
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
