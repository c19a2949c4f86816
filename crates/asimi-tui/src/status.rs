// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Status bar: mode, branch and diff on the left; context gauge, session
//! clock and wait indicator in the middle; model and connection state on the
//! right.

use std::time::Duration;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    Error,
    Disconnected,
}

impl ConnState {
    fn glyph(self) -> &'static str {
        match self {
            ConnState::Connected => "✅",
            ConnState::Error => "❌",
            ConnState::Disconnected => "🔌",
        }
    }
}

/// Everything the status bar shows, collected by the app each frame.
pub struct StatusInput<'a> {
    pub mode_token: &'a str,
    pub branch: &'a str,
    pub branch_is_main: bool,
    pub diff: Option<(u32, u32)>,
    pub context_pct: u8,
    pub session_duration: Duration,
    /// Seconds of quiet time once it exceeds the threshold.
    pub waiting_secs: Option<u64>,
    pub provider_model: &'a str,
    pub conn: ConnState,
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// The three zone strings before width fitting.
pub fn zones(input: &StatusInput<'_>) -> (String, String, String) {
    let mut left = format!("{} 🌴 {}", input.mode_token, input.branch);
    if let Some((added, deleted)) = input.diff {
        left.push_str(&format!(" ← +{added} -{deleted}"));
    }

    let mut middle = format!(
        "🪣 {}% {} ⏱",
        input.context_pct,
        format_duration(input.session_duration)
    );
    if let Some(secs) = input.waiting_secs {
        middle.push_str(&format!(" ⏳ {secs}s"));
    }

    let right = format!("{} {}", input.provider_model, input.conn.glyph());
    (left, middle, right)
}

/// Compose the bar for `width` columns: the right zone shrinks first, the
/// middle is dropped entirely if the bar still does not fit.
pub fn compose(input: &StatusInput<'_>, width: u16) -> Line<'static> {
    let width = width as usize;
    let (left, middle, mut right) = zones(input);

    let fits = |l: &str, m: &str, r: &str| l.width() + m.width() + r.width() + 2 <= width;

    let mut middle = middle;
    if !fits(&left, &middle, &right) {
        // Shrink the right zone down to just the glyph.
        while !fits(&left, &middle, &right) && right.width() > 2 {
            let cut = right.chars().count().saturating_sub(1);
            right = right.chars().take(cut).collect();
        }
    }
    if !fits(&left, &middle, &right) {
        middle.clear();
    }

    let used = left.width() + middle.width() + right.width();
    let gap_total = width.saturating_sub(used);
    let gap1 = gap_total / 2;
    let gap2 = gap_total - gap1;

    let branch_color = if input.branch_is_main { Color::Yellow } else { Color::Green };
    // Left zone: mode token plain, branch coloured.
    let mode_part = format!("{} ", input.mode_token);
    let branch_part = left[mode_part.len().min(left.len())..].to_string();

    Line::from(vec![
        Span::raw(mode_part),
        Span::styled(branch_part, Style::default().fg(branch_color)),
        Span::raw(" ".repeat(gap1)),
        Span::raw(middle),
        Span::raw(" ".repeat(gap2)),
        Span::raw(right),
    ])
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
