// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Modal (vi-style) prompt editor.
//!
//! A small pushdown automaton: five modes plus a one-slot pending-operator
//! register for the two-character commands (dd, dw, db, d$, d0, cc, cw, cb,
//! c$, c0, gg).  Normal mode runs on an explicit allow-list; unrecognised
//! printable input is ignored rather than inserted.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Insert,
    Normal,
    Visual,
    /// The command-line component owns the keyboard; the editor only
    /// recolours its border.
    Command,
    /// Free typing; enter appends the buffer to the project's AGENTS.md.
    Learning,
}

impl EditorMode {
    pub fn token(self) -> &'static str {
        match self {
            EditorMode::Insert => "INSERT",
            EditorMode::Normal => "NORMAL",
            EditorMode::Visual => "VISUAL",
            EditorMode::Command => "COMMAND",
            EditorMode::Learning => "LEARNING",
        }
    }
}

/// What the surrounding app should do after a key was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    /// Enter in insert mode: submit the buffer as a prompt.
    Submit(String),
    /// Enter in learning mode: append the buffer to AGENTS.md.
    Learn(String),
}

pub struct PromptEditor {
    lines: Vec<String>,
    row: usize,
    /// Char index into the current line (not a byte offset).
    col: usize,
    pub mode: EditorMode,
    vi_enabled: bool,
    pending: Option<char>,
    visual_anchor: Option<(usize, usize)>,
    clipboard: String,
}

impl PromptEditor {
    pub fn new(vi_enabled: bool) -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            mode: EditorMode::Insert,
            vi_enabled,
            pending: None,
            visual_anchor: None,
            clipboard: String::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Content-sized height, capped by the caller (50% of the screen).
    pub fn desired_height(&self, cap: u16) -> u16 {
        (self.lines.len() as u16).clamp(1, cap.max(1))
    }

    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.row = self.lines.len() - 1;
        self.col = self.line_len(self.row);
    }

    pub fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.row = 0;
        self.col = 0;
        self.pending = None;
        self.visual_anchor = None;
    }

    pub fn set_vi(&mut self, enabled: bool) {
        self.vi_enabled = enabled;
        if !enabled {
            self.mode = EditorMode::Insert;
        }
    }

    pub fn vi_enabled(&self) -> bool {
        self.vi_enabled
    }

    pub fn enter_learning(&mut self) {
        self.mode = EditorMode::Learning;
    }

    pub fn set_command_mode(&mut self, on: bool) {
        self.mode = if on {
            EditorMode::Command
        } else if self.vi_enabled {
            EditorMode::Normal
        } else {
            EditorMode::Insert
        };
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map(|l| l.chars().count()).unwrap_or(0)
    }

    // ── Key handling ─────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        // Arrows, Home and End work in every mode.
        match key.code {
            KeyCode::Left => {
                self.col = self.col.saturating_sub(1);
                return EditorAction::None;
            }
            KeyCode::Right => {
                self.col = (self.col + 1).min(self.line_len(self.row));
                return EditorAction::None;
            }
            KeyCode::Up => {
                self.move_vertical(-1);
                return EditorAction::None;
            }
            KeyCode::Down => {
                self.move_vertical(1);
                return EditorAction::None;
            }
            KeyCode::Home => {
                self.col = 0;
                return EditorAction::None;
            }
            KeyCode::End => {
                self.col = self.line_len(self.row);
                return EditorAction::None;
            }
            _ => {}
        }

        match self.mode {
            EditorMode::Insert => self.handle_typing(key, false),
            EditorMode::Learning => self.handle_typing(key, true),
            EditorMode::Normal => self.handle_normal(key),
            EditorMode::Visual => self.handle_visual(key),
            EditorMode::Command => EditorAction::None,
        }
    }

    fn handle_typing(&mut self, key: KeyEvent, learning: bool) -> EditorAction {
        match key.code {
            KeyCode::Esc => {
                if self.vi_enabled || learning {
                    self.mode = if self.vi_enabled { EditorMode::Normal } else { EditorMode::Insert };
                    self.clamp_normal_col();
                }
                EditorAction::None
            }
            KeyCode::Enter
                if key.modifiers.contains(KeyModifiers::ALT)
                    || key.modifiers.contains(KeyModifiers::SHIFT) =>
            {
                self.split_line();
                EditorAction::None
            }
            KeyCode::Enter => {
                let text = self.text();
                if learning {
                    EditorAction::Learn(text)
                } else {
                    EditorAction::Submit(text)
                }
            }
            KeyCode::Backspace => {
                self.backspace();
                EditorAction::None
            }
            KeyCode::Delete => {
                self.delete_at_cursor();
                EditorAction::None
            }
            KeyCode::Tab => {
                self.insert_char(' ');
                self.insert_char(' ');
                EditorAction::None
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
                EditorAction::None
            }
            _ => EditorAction::None,
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) -> EditorAction {
        let KeyCode::Char(c) = key.code else {
            if key.code == KeyCode::Esc {
                self.pending = None;
            }
            return EditorAction::None;
        };

        // A pending operator consumes the next key, recognised or not.
        if let Some(op) = self.pending.take() {
            self.apply_operator(op, c);
            return EditorAction::None;
        }

        match c {
            // Motions
            'h' => self.col = self.col.saturating_sub(1),
            'l' => self.col = (self.col + 1).min(self.max_normal_col()),
            'j' => self.move_vertical(1),
            'k' => self.move_vertical(-1),
            'w' => self.move_next_word_start(),
            'b' => self.move_prev_word_start(),
            'e' => self.move_word_end(),
            '0' => self.col = 0,
            '^' => self.col = self.first_non_blank(),
            '$' => self.col = self.max_normal_col(),
            'G' => {
                self.row = self.lines.len() - 1;
                self.clamp_normal_col();
            }
            // Single-char edits
            'x' => self.delete_at_cursor(),
            'X' => {
                if self.col > 0 {
                    self.col -= 1;
                    self.delete_at_cursor();
                }
            }
            'D' => {
                let col = self.col;
                let line = &mut self.lines[self.row];
                self.clipboard = line.chars().skip(col).collect();
                *line = line.chars().take(col).collect();
                self.clamp_normal_col();
            }
            'p' => {
                let text = self.clipboard.clone();
                for c in text.chars() {
                    if c == '\n' {
                        self.split_line();
                    } else {
                        self.insert_char(c);
                    }
                }
            }
            // Mode changes
            'i' => self.mode = EditorMode::Insert,
            'a' => {
                self.col = (self.col + 1).min(self.line_len(self.row));
                self.mode = EditorMode::Insert;
            }
            'I' => {
                self.col = self.first_non_blank();
                self.mode = EditorMode::Insert;
            }
            'A' => {
                self.col = self.line_len(self.row);
                self.mode = EditorMode::Insert;
            }
            'o' => {
                self.col = self.line_len(self.row);
                self.split_line();
                self.mode = EditorMode::Insert;
            }
            'O' => {
                self.lines.insert(self.row, String::new());
                self.col = 0;
                self.mode = EditorMode::Insert;
            }
            'v' => {
                self.visual_anchor = Some((self.row, self.col));
                self.mode = EditorMode::Visual;
            }
            // Operators
            'd' | 'c' | 'g' => self.pending = Some(c),
            // Everything else is deliberately ignored.
            _ => {}
        }
        EditorAction::None
    }

    fn handle_visual(&mut self, key: KeyEvent) -> EditorAction {
        match key.code {
            KeyCode::Esc | KeyCode::Char('v') => {
                self.visual_anchor = None;
                self.mode = EditorMode::Normal;
            }
            KeyCode::Char(c) => match c {
                'h' => self.col = self.col.saturating_sub(1),
                'l' => self.col = (self.col + 1).min(self.max_normal_col()),
                'j' => self.move_vertical(1),
                'k' => self.move_vertical(-1),
                'w' => self.move_next_word_start(),
                'b' => self.move_prev_word_start(),
                'e' => self.move_word_end(),
                '0' => self.col = 0,
                '^' => self.col = self.first_non_blank(),
                '$' => self.col = self.max_normal_col(),
                'G' => {
                    self.row = self.lines.len() - 1;
                    self.clamp_normal_col();
                }
                _ => {}
            },
            _ => {}
        }
        EditorAction::None
    }

    /// The flat two-character operator table: dd dw db d$ d0, cc cw cb c$ c0,
    /// gg.  An unrecognised follower just clears the register.
    fn apply_operator(&mut self, op: char, follower: char) {
        if (op, follower) == ('g', 'g') {
            self.row = 0;
            self.clamp_normal_col();
            return;
        }
        if op != 'd' && op != 'c' {
            return;
        }
        let deleted = match follower {
            f if f == op => {
                // dd / cc: whole line
                self.delete_line();
                true
            }
            'w' => {
                self.delete_to(|e| e.move_next_word_start());
                true
            }
            'b' => {
                self.delete_back_to(|e| e.move_prev_word_start());
                true
            }
            '$' => {
                let col = self.col;
                let line = &mut self.lines[self.row];
                self.clipboard = line.chars().skip(col).collect();
                *line = line.chars().take(col).collect();
                true
            }
            '0' => {
                self.delete_back_to(|e| e.col = 0);
                true
            }
            _ => false,
        };
        if deleted && op == 'c' {
            self.mode = EditorMode::Insert;
        } else {
            self.clamp_normal_col();
        }
    }

    // ── Editing primitives ───────────────────────────────────────────────────

    fn insert_char(&mut self, c: char) {
        let col = self.col;
        let line = &mut self.lines[self.row];
        let byte = char_to_byte(line, col);
        line.insert(byte, c);
        self.col += 1;
    }

    fn split_line(&mut self) {
        let col = self.col;
        let line = &mut self.lines[self.row];
        let byte = char_to_byte(line, col);
        let rest = line.split_off(byte);
        self.lines.insert(self.row + 1, rest);
        self.row += 1;
        self.col = 0;
    }

    fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
            self.delete_at_cursor();
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_len(self.row);
            self.lines[self.row].push_str(&line);
        }
    }

    fn delete_at_cursor(&mut self) {
        let col = self.col;
        let line = &mut self.lines[self.row];
        let byte = char_to_byte(line, col);
        if byte < line.len() {
            line.remove(byte);
        }
    }

    fn delete_line(&mut self) {
        self.clipboard = self.lines[self.row].clone();
        if self.lines.len() == 1 {
            self.lines[0].clear();
        } else {
            self.lines.remove(self.row);
            if self.row >= self.lines.len() {
                self.row = self.lines.len() - 1;
            }
        }
        self.col = 0;
    }

    /// Delete from the cursor forward to wherever `motion` lands (same line).
    fn delete_to(&mut self, motion: impl FnOnce(&mut Self)) {
        let start = (self.row, self.col);
        motion(self);
        if self.row != start.0 {
            // Motion crossed lines: clamp to end of the start line.
            self.row = start.0;
            self.col = self.line_len(start.0);
        }
        let (from, to) = (start.1.min(self.col), start.1.max(self.col));
        let line = &mut self.lines[self.row];
        let from_b = char_to_byte(line, from);
        let to_b = char_to_byte(line, to);
        self.clipboard = line[from_b..to_b].to_string();
        line.replace_range(from_b..to_b, "");
        self.col = from;
    }

    /// Delete from wherever `motion` lands back to the cursor (same line).
    fn delete_back_to(&mut self, motion: impl FnOnce(&mut Self)) {
        self.delete_to(motion);
    }

    // ── Motions ──────────────────────────────────────────────────────────────

    fn move_vertical(&mut self, delta: isize) {
        let target = self.row as isize + delta;
        if target < 0 || target >= self.lines.len() as isize {
            return;
        }
        self.row = target as usize;
        self.col = self.col.min(self.line_len(self.row));
        if self.mode != EditorMode::Insert {
            self.clamp_normal_col();
        }
    }

    fn move_next_word_start(&mut self) {
        let chars: Vec<char> = self.lines[self.row].chars().collect();
        let mut i = self.col;
        while i < chars.len() && is_word(chars[i]) {
            i += 1;
        }
        while i < chars.len() && !is_word(chars[i]) {
            i += 1;
        }
        if i >= chars.len() && self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        } else {
            self.col = i.min(self.max_normal_col());
        }
    }

    fn move_prev_word_start(&mut self) {
        if self.col == 0 {
            if self.row > 0 {
                self.row -= 1;
                self.col = self.max_normal_col();
            }
            return;
        }
        let chars: Vec<char> = self.lines[self.row].chars().collect();
        let mut i = self.col;
        while i > 0 && !is_word(chars[i - 1]) {
            i -= 1;
        }
        while i > 0 && is_word(chars[i - 1]) {
            i -= 1;
        }
        self.col = i;
    }

    fn move_word_end(&mut self) {
        let chars: Vec<char> = self.lines[self.row].chars().collect();
        let mut i = self.col + 1;
        while i < chars.len() && !is_word(chars[i]) {
            i += 1;
        }
        while i + 1 < chars.len() && is_word(chars[i + 1]) {
            i += 1;
        }
        self.col = i.min(self.max_normal_col());
    }

    fn first_non_blank(&self) -> usize {
        self.lines[self.row]
            .chars()
            .position(|c| !c.is_whitespace())
            .unwrap_or(0)
    }

    /// In normal/visual mode the cursor sits ON a character, so the maximum
    /// column is len-1 (0 on an empty line).
    fn max_normal_col(&self) -> usize {
        self.line_len(self.row).saturating_sub(1)
    }

    fn clamp_normal_col(&mut self) {
        if self.mode != EditorMode::Insert {
            self.col = self.col.min(self.max_normal_col());
        }
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn char_to_byte(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map(|(b, _)| b)
        .unwrap_or(line.len())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn code(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn editor_with(text: &str) -> PromptEditor {
        let mut e = PromptEditor::new(true);
        e.set_text(text);
        e.mode = EditorMode::Normal;
        e.row = 0;
        e.col = 0;
        e
    }

    fn type_str(e: &mut PromptEditor, s: &str) {
        for c in s.chars() {
            e.handle_key(key(c));
        }
    }

    // ── Insert mode ───────────────────────────────────────────────────────────

    #[test]
    fn typing_inserts_and_enter_submits() {
        let mut e = PromptEditor::new(true);
        type_str(&mut e, "hello");
        assert_eq!(e.text(), "hello");
        match e.handle_key(code(KeyCode::Enter)) {
            EditorAction::Submit(t) => assert_eq!(t, "hello"),
            other => panic!("expected submit, got {other:?}"),
        }
    }

    #[test]
    fn alt_enter_inserts_newline_instead_of_submitting() {
        let mut e = PromptEditor::new(true);
        type_str(&mut e, "a");
        let action = e.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT));
        assert_eq!(action, EditorAction::None);
        type_str(&mut e, "b");
        assert_eq!(e.text(), "a\nb");
        assert_eq!(e.line_count(), 2);
    }

    #[test]
    fn escape_enters_normal_mode_when_vi_enabled() {
        let mut e = PromptEditor::new(true);
        e.handle_key(code(KeyCode::Esc));
        assert_eq!(e.mode, EditorMode::Normal);
    }

    #[test]
    fn escape_stays_in_insert_when_vi_disabled() {
        let mut e = PromptEditor::new(false);
        e.handle_key(code(KeyCode::Esc));
        assert_eq!(e.mode, EditorMode::Insert);
    }

    #[test]
    fn backspace_joins_lines() {
        let mut e = PromptEditor::new(true);
        e.set_text("ab\ncd");
        e.row = 1;
        e.col = 0;
        e.handle_key(code(KeyCode::Backspace));
        assert_eq!(e.text(), "abcd");
    }

    // ── Normal-mode motions ───────────────────────────────────────────────────

    #[test]
    fn hjkl_move_the_cursor() {
        let mut e = editor_with("abc\ndef");
        e.handle_key(key('l'));
        assert_eq!(e.cursor(), (0, 1));
        e.handle_key(key('j'));
        assert_eq!(e.cursor(), (1, 1));
        e.handle_key(key('h'));
        assert_eq!(e.cursor(), (1, 0));
        e.handle_key(key('k'));
        assert_eq!(e.cursor(), (0, 0));
    }

    #[test]
    fn word_motions() {
        let mut e = editor_with("foo bar baz");
        e.handle_key(key('w'));
        assert_eq!(e.cursor().1, 4);
        e.handle_key(key('w'));
        assert_eq!(e.cursor().1, 8);
        e.handle_key(key('b'));
        assert_eq!(e.cursor().1, 4);
        e.handle_key(key('e'));
        assert_eq!(e.cursor().1, 6, "end of 'bar'");
    }

    #[test]
    fn line_motions_and_gg_G() {
        let mut e = editor_with("  one\ntwo\nthree");
        e.handle_key(key('$'));
        assert_eq!(e.cursor().1, 4);
        e.handle_key(key('0'));
        assert_eq!(e.cursor().1, 0);
        e.handle_key(key('^'));
        assert_eq!(e.cursor().1, 2);
        e.handle_key(key('G'));
        assert_eq!(e.cursor().0, 2);
        e.handle_key(key('g'));
        e.handle_key(key('g'));
        assert_eq!(e.cursor().0, 0);
    }

    // ── Normal-mode edits ─────────────────────────────────────────────────────

    #[test]
    fn x_deletes_under_cursor() {
        let mut e = editor_with("abc");
        e.handle_key(key('x'));
        assert_eq!(e.text(), "bc");
    }

    #[test]
    fn capital_d_deletes_to_end_of_line() {
        let mut e = editor_with("hello world");
        e.handle_key(key('w'));
        e.handle_key(key('D'));
        assert_eq!(e.text(), "hello ");
    }

    #[test]
    fn dd_deletes_line_and_p_pastes_it() {
        let mut e = editor_with("first\nsecond");
        e.handle_key(key('d'));
        e.handle_key(key('d'));
        assert_eq!(e.text(), "second");
        e.mode = EditorMode::Insert;
        e.col = e.line_len(0);
        e.handle_key(code(KeyCode::Esc));
        e.handle_key(key('p'));
        assert!(e.text().contains("first"));
    }

    #[test]
    fn dw_deletes_word() {
        let mut e = editor_with("foo bar");
        e.handle_key(key('d'));
        e.handle_key(key('w'));
        assert_eq!(e.text(), "bar");
    }

    #[test]
    fn cw_deletes_word_and_enters_insert() {
        let mut e = editor_with("foo bar");
        e.handle_key(key('c'));
        e.handle_key(key('w'));
        assert_eq!(e.mode, EditorMode::Insert);
        assert_eq!(e.text(), "bar");
    }

    #[test]
    fn d_dollar_and_d_zero() {
        let mut e = editor_with("abcdef");
        e.col = 3;
        e.handle_key(key('d'));
        e.handle_key(key('$'));
        assert_eq!(e.text(), "abc");

        let mut e = editor_with("abcdef");
        e.col = 3;
        e.handle_key(key('d'));
        e.handle_key(key('0'));
        assert_eq!(e.text(), "def");
    }

    #[test]
    fn unrecognised_operator_follower_clears_pending() {
        let mut e = editor_with("abc");
        e.handle_key(key('d'));
        e.handle_key(key('z')); // not in the table
        assert_eq!(e.text(), "abc");
        // 'x' now acts as a single-char command, not an operator follower.
        e.handle_key(key('x'));
        assert_eq!(e.text(), "bc");
    }

    #[test]
    fn unlisted_printables_are_ignored_in_normal_mode() {
        let mut e = editor_with("abc");
        e.handle_key(key('q'));
        e.handle_key(key('!'));
        assert_eq!(e.text(), "abc");
        assert_eq!(e.mode, EditorMode::Normal);
    }

    // ── Insert-entry commands ─────────────────────────────────────────────────

    #[test]
    fn o_opens_line_below_in_insert_mode() {
        let mut e = editor_with("one");
        e.handle_key(key('o'));
        assert_eq!(e.mode, EditorMode::Insert);
        assert_eq!(e.text(), "one\n");
        assert_eq!(e.cursor().0, 1);
    }

    #[test]
    fn a_appends_after_cursor() {
        let mut e = editor_with("ab");
        e.handle_key(key('a'));
        assert_eq!(e.mode, EditorMode::Insert);
        assert_eq!(e.cursor().1, 1);
    }

    // ── Visual mode ───────────────────────────────────────────────────────────

    #[test]
    fn visual_mode_navigates_but_never_inserts() {
        let mut e = editor_with("abc def");
        e.handle_key(key('v'));
        assert_eq!(e.mode, EditorMode::Visual);
        e.handle_key(key('w'));
        assert_eq!(e.cursor().1, 4);
        e.handle_key(key('z'));
        assert_eq!(e.text(), "abc def");
        e.handle_key(code(KeyCode::Esc));
        assert_eq!(e.mode, EditorMode::Normal);
    }

    // ── Learning mode ─────────────────────────────────────────────────────────

    #[test]
    fn learning_mode_enter_yields_learn_action() {
        let mut e = PromptEditor::new(true);
        e.enter_learning();
        type_str(&mut e, "always run tests");
        match e.handle_key(code(KeyCode::Enter)) {
            EditorAction::Learn(t) => assert_eq!(t, "always run tests"),
            other => panic!("expected learn, got {other:?}"),
        }
    }

    // ── Always-on keys ────────────────────────────────────────────────────────

    #[test]
    fn arrows_work_in_normal_mode() {
        let mut e = editor_with("abc");
        e.handle_key(code(KeyCode::Right));
        assert_eq!(e.cursor().1, 1);
        e.handle_key(code(KeyCode::End));
        assert_eq!(e.cursor().1, 3);
        e.handle_key(code(KeyCode::Home));
        assert_eq!(e.cursor().1, 0);
    }

    #[test]
    fn desired_height_tracks_content_up_to_cap() {
        let mut e = PromptEditor::new(true);
        e.set_text("a\nb\nc\nd");
        assert_eq!(e.desired_height(10), 4);
        assert_eq!(e.desired_height(2), 2);
    }
}
