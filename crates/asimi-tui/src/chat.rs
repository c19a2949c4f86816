// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Append-only chat transcript: pre-styled message strings, a tool-call
//! index for in-place status updates, and the shared scroll-lock discipline.

use std::collections::HashMap;

/// Trailing markers set by the app when an assistant turn finishes.  The
/// renderer strips them and picks the prefix glyph accordingly.
pub const SUCCESS_MARK: &str = "\u{1}ok";
pub const FAILURE_MARK: &str = "\u{1}fail";

/// Classification of a stored message string, driving its rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `You:` lines render right-aligned, indented 8 columns, accent colour.
    UserPrompt,
    /// `You:$` lines render as "$ command" in the accent colour.
    UserCommand,
    /// `Asimi:` lines render as markdown, glyph from the trailing marker.
    Assistant,
    /// Anything else: wrapped plain text (tool lines, notices).
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantGlyph {
    Default,
    Success,
    Failure,
}

pub fn classify(msg: &str) -> MessageKind {
    if msg.starts_with("You:$") {
        MessageKind::UserCommand
    } else if msg.starts_with("You:") {
        MessageKind::UserPrompt
    } else if msg.starts_with("Asimi:") {
        MessageKind::Assistant
    } else {
        MessageKind::Plain
    }
}

/// Strip a trailing status marker and report the glyph it selects.
pub fn assistant_glyph(msg: &str) -> (&str, AssistantGlyph) {
    if let Some(body) = msg.strip_suffix(FAILURE_MARK) {
        (body, AssistantGlyph::Failure)
    } else if let Some(body) = msg.strip_suffix(SUCCESS_MARK) {
        (body, AssistantGlyph::Success)
    } else {
        (msg, AssistantGlyph::Default)
    }
}

pub struct ChatView {
    messages: Vec<String>,
    /// tool-call id → index of its rendered entry.  Entries only ever append,
    /// so indices stay stable until `truncate_to`/`clear`, which prune the map.
    tool_calls: HashMap<String, usize>,
    /// First visible line offset (in rendered lines, managed by the widget).
    pub scroll: u16,
    /// Set by any upward scroll; cleared when the view reaches the bottom.
    user_scrolled: bool,
    /// Set by scroll mode (Ctrl-B); cleared on Escape or bottom.
    scroll_locked: bool,
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            tool_calls: HashMap::new(),
            scroll: 0,
            user_scrolled: false,
            scroll_locked: false,
        }
    }

    // ── Content ──────────────────────────────────────────────────────────────

    /// Append one message; returns its index.
    pub fn add(&mut self, msg: impl Into<String>) -> usize {
        self.messages.push(msg.into());
        self.messages.len() - 1
    }

    pub fn add_batch(&mut self, msgs: impl IntoIterator<Item = String>) {
        self.messages.extend(msgs);
    }

    /// Streaming: extend the last message in place.
    pub fn append_to_last(&mut self, chunk: &str) {
        match self.messages.last_mut() {
            Some(last) => last.push_str(chunk),
            None => {
                self.messages.push(chunk.to_string());
            }
        }
    }

    pub fn replace_last(&mut self, msg: impl Into<String>) {
        match self.messages.last_mut() {
            Some(last) => *last = msg.into(),
            None => {
                self.messages.push(msg.into());
            }
        }
    }

    /// Register the chat entry rendering a tool call.
    pub fn track_tool_call(&mut self, id: impl Into<String>, index: usize) {
        self.tool_calls.insert(id.into(), index);
    }

    /// Re-render a tool-call entry in place (scheduled → executing → done).
    pub fn update_tool_call(&mut self, id: &str, rendering: impl Into<String>) {
        if let Some(&index) = self.tool_calls.get(id) {
            if let Some(slot) = self.messages.get_mut(index) {
                *slot = rendering.into();
            }
        }
    }

    /// Truncate to exactly `n` entries (rollback).  Tracked tool calls at or
    /// beyond the cut are forgotten, since their indices would dangle.
    pub fn truncate_to(&mut self, n: usize) {
        self.messages.truncate(n);
        self.tool_calls.retain(|_, &mut index| index < n);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.tool_calls.clear();
        self.scroll = 0;
        self.user_scrolled = false;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn last(&self) -> Option<&String> {
        self.messages.last()
    }

    // ── Scroll discipline ────────────────────────────────────────────────────

    /// New content auto-scrolls only while the user is not inspecting older
    /// transcript and scroll mode has not locked the view.
    pub fn autoscroll(&self) -> bool {
        !self.user_scrolled && !self.scroll_locked
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.user_scrolled = true;
    }

    /// Scroll down; `at_bottom` is computed by the widget from the rendered
    /// height.  Reaching the bottom re-enables autoscroll.
    pub fn scroll_down(&mut self, lines: u16, max_scroll: u16) {
        self.scroll = (self.scroll + lines).min(max_scroll);
        if self.scroll >= max_scroll {
            self.user_scrolled = false;
            self.scroll_locked = false;
        }
    }

    pub fn scroll_to_bottom(&mut self, max_scroll: u16) {
        self.scroll = max_scroll;
        self.user_scrolled = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.user_scrolled = true;
    }

    pub fn set_scroll_lock(&mut self, locked: bool) {
        self.scroll_locked = locked;
        if !locked {
            self.user_scrolled = false;
        }
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_returns_stable_indices() {
        let mut v = ChatView::new();
        assert_eq!(v.add("a"), 0);
        assert_eq!(v.add("b"), 1);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn append_to_last_streams_into_the_tail() {
        let mut v = ChatView::new();
        v.add("Asimi: hel");
        v.append_to_last("lo");
        assert_eq!(v.last().unwrap(), "Asimi: hello");
    }

    #[test]
    fn append_to_empty_view_creates_entry() {
        let mut v = ChatView::new();
        v.append_to_last("x");
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn update_tool_call_rewrites_tracked_entry() {
        let mut v = ChatView::new();
        let idx = v.add("run_in_shell ls\n╰ scheduled");
        v.track_tool_call("c1", idx);
        v.add("later entry");
        v.update_tool_call("c1", "run_in_shell ls\n╰ exit 0");
        assert_eq!(v.messages()[idx], "run_in_shell ls\n╰ exit 0");
        assert_eq!(v.messages()[idx + 1], "later entry");
    }

    #[test]
    fn update_unknown_tool_call_is_ignored() {
        let mut v = ChatView::new();
        v.add("x");
        v.update_tool_call("ghost", "y");
        assert_eq!(v.messages()[0], "x");
    }

    #[test]
    fn truncate_drops_dangling_tool_indices() {
        let mut v = ChatView::new();
        let a = v.add("call a");
        v.track_tool_call("a", a);
        let b = v.add("call b");
        v.track_tool_call("b", b);
        v.truncate_to(1);
        v.update_tool_call("b", "must not panic or resurrect");
        assert_eq!(v.len(), 1);
        v.update_tool_call("a", "still tracked");
        assert_eq!(v.messages()[0], "still tracked");
    }

    #[test]
    fn clear_resets_everything() {
        let mut v = ChatView::new();
        let idx = v.add("x");
        v.track_tool_call("a", idx);
        v.clear();
        assert!(v.is_empty());
        v.update_tool_call("a", "gone");
        assert!(v.is_empty());
    }

    // ── Classification ────────────────────────────────────────────────────────

    #[test]
    fn classify_prefixes() {
        assert_eq!(classify("You:$ git status"), MessageKind::UserCommand);
        assert_eq!(classify("You: hello"), MessageKind::UserPrompt);
        assert_eq!(classify("Asimi: hi"), MessageKind::Assistant);
        assert_eq!(classify("run_in_shell ls"), MessageKind::Plain);
    }

    #[test]
    fn assistant_glyph_from_trailing_marker() {
        let done_msg = format!("Asimi: done{SUCCESS_MARK}");
        let (body, glyph) = assistant_glyph(&done_msg);
        assert_eq!(body, "Asimi: done");
        assert_eq!(glyph, AssistantGlyph::Success);
        let no_msg = format!("Asimi: no{FAILURE_MARK}");
        let (_, glyph) = assistant_glyph(&no_msg);
        assert_eq!(glyph, AssistantGlyph::Failure);
        let (_, glyph) = assistant_glyph("Asimi: plain");
        assert_eq!(glyph, AssistantGlyph::Default);
    }

    // ── Scroll discipline ─────────────────────────────────────────────────────

    #[test]
    fn scroll_up_disables_autoscroll_until_bottom() {
        let mut v = ChatView::new();
        v.scroll = 10;
        assert!(v.autoscroll());
        v.scroll_up(2);
        assert!(!v.autoscroll());
        v.scroll_down(2, 10);
        assert!(v.autoscroll(), "reaching the bottom re-enables autoscroll");
    }

    #[test]
    fn scroll_lock_overrides_autoscroll() {
        let mut v = ChatView::new();
        v.set_scroll_lock(true);
        assert!(!v.autoscroll());
        v.set_scroll_lock(false);
        assert!(v.autoscroll());
    }

    #[test]
    fn reaching_bottom_clears_scroll_lock() {
        let mut v = ChatView::new();
        v.set_scroll_lock(true);
        v.scroll_down(100, 5);
        assert!(!v.scroll_locked());
        assert!(v.autoscroll());
    }
}
