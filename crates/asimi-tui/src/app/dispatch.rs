// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Key dispatch and command execution.
//!
//! Dispatch order: component-capturing keys (completion popup, command line,
//! non-chat views) → mode-specific handlers (cancel, quit, scroll mode) →
//! the prompt editor.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use asimi_core::ExportFlavour;
use asimi_model::static_catalog;

use crate::{
    agent_task::AgentRequest,
    app::{App, PromptHistoryEntry},
    commands::{split_input, CommandAction, CommandLookup},
    completion::CompletionKind,
    editor::{EditorAction, EditorMode},
    filetree,
    router::{ContentView, RouterEvent},
    ToastSeverity,
};

impl App {
    pub async fn handle_key(&mut self, key: KeyEvent) {
        // 0. The host-approval dialog is strictly modal.
        if self.pending_approval.is_some() {
            self.handle_approval_key(key);
            return;
        }

        // 1. Completion popup captures navigation while visible.
        if self.popup.is_visible() && self.handle_popup_key(key).await {
            return;
        }

        // 2. The command line owns the keyboard while open.
        if self.cmdline.active {
            self.handle_cmdline_key(key).await;
            return;
        }

        // 3. Non-chat views route their own navigation.
        if self.router.view() != ContentView::Chat {
            match self.router.handle_key(key) {
                RouterEvent::Selected(index) => self.handle_selection(index).await,
                RouterEvent::BackToChat | RouterEvent::None => {}
            }
            return;
        }

        // 4. Global chat-mode keys.
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    if self.register_ctrl_c() {
                        self.should_quit = true;
                    } else if self.streaming {
                        self.cancel_streaming().await;
                        self.toasts.push("turn cancelled", ToastSeverity::Warning);
                    } else {
                        self.toasts
                            .push("press Ctrl-C again to quit", ToastSeverity::Info);
                    }
                    return;
                }
                KeyCode::Char('b') => {
                    self.chat.set_scroll_lock(true);
                    return;
                }
                KeyCode::Char('l') => {
                    self.editor.enter_learning();
                    self.toasts
                        .push("learning: enter appends to AGENTS.md", ToastSeverity::Info);
                    return;
                }
                _ => {}
            }
        }

        // Scroll mode: the transcript owns j/k/Ctrl-u/d/g/G until Escape or
        // the bottom is reached.
        if self.chat.scroll_locked() {
            let max = self.chat_max_scroll;
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => self.chat.scroll_down(1, max),
                KeyCode::Char('k') | KeyCode::Up => self.chat.scroll_up(1),
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.chat.scroll_up(10)
                }
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.chat.scroll_down(10, max)
                }
                KeyCode::Char('g') => self.chat.scroll_to_top(),
                KeyCode::Char('G') => self.chat.scroll_to_bottom(max),
                KeyCode::Esc => self.chat.set_scroll_lock(false),
                _ => {}
            }
            return;
        }

        // Escape cancels a streaming turn.
        if key.code == KeyCode::Esc && self.streaming {
            self.cancel_streaming().await;
            self.toasts.push("turn cancelled", ToastSeverity::Warning);
            return;
        }

        // 5. `:` opens the command line (normal mode, or an empty editor).
        if key.code == KeyCode::Char(':')
            && !key.modifiers.contains(KeyModifiers::CONTROL)
            && (self.editor.mode == EditorMode::Normal || self.editor.is_empty())
        {
            self.cmdline.open();
            self.editor.set_command_mode(true);
            self.update_command_completion();
            return;
        }

        // 6. Prompt-history navigation at the editor's vertical boundaries.
        let (row, _) = self.editor.cursor();
        let at_top = row == 0;
        let at_bottom = row + 1 == self.editor.line_count();
        let up = key.code == KeyCode::Up
            || (self.editor.mode == EditorMode::Normal && key.code == KeyCode::Char('k'));
        let down = key.code == KeyCode::Down
            || (self.editor.mode == EditorMode::Normal && key.code == KeyCode::Char('j'));
        if up && at_top && self.history_cursor > 0 {
            self.history_back();
            return;
        }
        if down && at_bottom && self.history_cursor < self.history.len() {
            self.history_forward();
            return;
        }

        // 7. Everything else goes to the editor.
        match self.editor.handle_key(key) {
            EditorAction::Submit(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    self.editor.clear();
                    self.submit_prompt(text).await;
                }
            }
            EditorAction::Learn(text) => {
                self.append_to_agents_md(&text);
                self.editor.clear();
                self.editor.set_command_mode(false);
            }
            EditorAction::None => {}
        }

        // A file-reference token under the cursor keeps the popup in sync.
        self.update_file_completion().await;
    }

    // ── Host-approval dialog ─────────────────────────────────────────────────

    fn handle_approval_key(&mut self, key: KeyEvent) {
        let decision = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
            _ => None,
        };
        if let Some(accept) = decision {
            if let Some(req) = self.pending_approval.take() {
                let _ = req.respond.send(accept);
                self.toasts.push(
                    if accept { "command approved" } else { "command denied" },
                    if accept { ToastSeverity::Success } else { ToastSeverity::Warning },
                );
            }
        }
    }

    // ── Completion popup ─────────────────────────────────────────────────────

    /// Returns true when the key was consumed by the popup.
    async fn handle_popup_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Down => {
                self.popup.select_next();
                true
            }
            KeyCode::Up => {
                self.popup.select_prev();
                true
            }
            KeyCode::Tab => {
                self.accept_completion().await;
                true
            }
            KeyCode::Enter if self.popup.kind == CompletionKind::FilePath => {
                self.accept_completion().await;
                true
            }
            KeyCode::Esc => {
                self.popup.clear();
                true
            }
            _ => false,
        }
    }

    async fn accept_completion(&mut self) {
        let Some(item) = self.popup.selected_item().map(String::from) else {
            return;
        };
        match self.popup.kind {
            CompletionKind::Command => {
                // Fill the command line with the selected name.
                self.cmdline.open();
                for c in item.chars() {
                    self.cmdline.insert(c);
                }
                self.popup.clear();
            }
            CompletionKind::FilePath => {
                self.replace_file_token(&item);
                self.popup.clear();
                self.load_file_reference(&item).await;
            }
        }
    }

    // ── Command line ─────────────────────────────────────────────────────────

    async fn handle_cmdline_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.cmdline.close();
                self.popup.clear();
                self.editor.set_command_mode(false);
            }
            KeyCode::Enter => {
                let input = self.cmdline.take();
                self.popup.clear();
                self.editor.set_command_mode(false);
                if !input.trim().is_empty() {
                    self.execute_command(input).await;
                }
            }
            KeyCode::Backspace => {
                if !self.cmdline.backspace() {
                    // Backspace on an empty line closes it, like vi.
                    self.cmdline.close();
                    self.popup.clear();
                    self.editor.set_command_mode(false);
                    return;
                }
                self.update_command_completion();
            }
            KeyCode::Left => self.cmdline.move_left(),
            KeyCode::Right => self.cmdline.move_right(),
            KeyCode::Up => {
                let history = self.command_history_items();
                self.cmdline.history_prev(&history);
            }
            KeyCode::Down => {
                let history = self.command_history_items();
                self.cmdline.history_next(&history);
            }
            KeyCode::Tab => {
                if let Some(item) = self.popup.selected_item().map(String::from) {
                    while self.cmdline.backspace() {}
                    for c in item.chars() {
                        self.cmdline.insert(c);
                    }
                    self.update_command_completion();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cmdline.insert(c);
                self.update_command_completion();
            }
            _ => {}
        }
    }

    fn command_history_items(&self) -> Vec<String> {
        self.command_history
            .as_ref()
            .map(|h| h.load(Some(100)).into_iter().map(|e| e.content).collect())
            .unwrap_or_default()
    }

    fn update_command_completion(&mut self) {
        let candidates = self.registry.completions(self.cmdline.text());
        self.popup.set_candidates(candidates, CompletionKind::Command);
    }

    pub(crate) async fn execute_command(&mut self, input: String) {
        if let Some(h) = &self.command_history {
            h.append(input.trim());
        }
        // Leave a record of the command in the transcript.
        self.chat.add(format!("You:$ {}", input.trim()));
        let (name, args) = split_input(&input);
        let args = args.to_string();
        match self.registry.find(name) {
            CommandLookup::NotFound => {
                self.toasts
                    .push(format!("not found: {name}"), ToastSeverity::Error);
            }
            CommandLookup::Ambiguous(names) => {
                self.toasts.push(
                    format!("ambiguous: {}", names.join(", ")),
                    ToastSeverity::Warning,
                );
            }
            CommandLookup::Single(cmd) => self.run_command(cmd.action, &args).await,
        }
    }

    async fn run_command(&mut self, action: CommandAction, args: &str) {
        match action {
            CommandAction::Help => {
                let topic = (!args.is_empty()).then(|| args.to_string());
                self.router.show_help(topic);
            }
            CommandAction::New => {
                self.chat.clear();
                self.history.clear();
                self.history_cursor = 0;
                self.session_started = Instant::now();
                let _ = self.agent_tx.send(AgentRequest::NewSession).await;
            }
            CommandAction::Quit => self.should_quit = true,
            CommandAction::Context => {
                let _ = self.agent_tx.send(AgentRequest::ShowContext).await;
            }
            CommandAction::ClearHistory => {
                if let Some(h) = &self.prompt_history {
                    h.clear();
                }
                self.toasts.push("prompt history cleared", ToastSeverity::Success);
            }
            CommandAction::Resume => {
                let Some(store) = &self.session_store else {
                    self.toasts
                        .push("session persistence is disabled", ToastSeverity::Warning);
                    return;
                };
                let records = store.list(self.config.session.list_limit as usize);
                if records.is_empty() {
                    self.toasts.push("no saved sessions", ToastSeverity::Info);
                    return;
                }
                self.resume_ids = records.iter().map(|r| r.id.clone()).collect();
                let rows = records
                    .iter()
                    .map(|r| {
                        format!(
                            "{}  {}",
                            r.last_updated.format("%Y-%m-%d %H:%M"),
                            r.first_prompt
                        )
                    })
                    .collect();
                self.router.show_resume(rows);
            }
            CommandAction::Login => {
                self.toasts.push(
                    "set ANTHROPIC_API_KEY / OPENAI_API_KEY / GEMINI_API_KEY in the environment",
                    ToastSeverity::Info,
                );
            }
            CommandAction::Models => {
                let provider = &self.config.llm.provider;
                let models: Vec<String> = static_catalog()
                    .into_iter()
                    .filter(|e| e.provider == *provider)
                    .map(|e| e.model.to_string())
                    .collect();
                if models.is_empty() {
                    self.toasts
                        .push(format!("no catalog entries for {provider}"), ToastSeverity::Info);
                    return;
                }
                self.router.show_models(models);
            }
            CommandAction::Export => match ExportFlavour::parse(args) {
                Some(flavour) => {
                    let _ = self.agent_tx.send(AgentRequest::Export(flavour)).await;
                }
                None => {
                    self.toasts
                        .push("export type is full or conversation", ToastSeverity::Error);
                }
            },
            CommandAction::Init => {
                let path = self.project_root.join(".agents/asimi.conf");
                match asimi_config::write_starter_config(&path, args == "clear") {
                    Ok(()) => self
                        .toasts
                        .push(format!("wrote {}", path.display()), ToastSeverity::Success),
                    Err(e) => self.toasts.push(e.to_string(), ToastSeverity::Error),
                }
            }
            CommandAction::Compact => {
                let _ = self.agent_tx.send(AgentRequest::Compact).await;
            }
            CommandAction::Vi => {
                let enabled = !self.editor.vi_enabled();
                self.editor.set_vi(enabled);
                self.toasts.push(
                    if enabled { "vi mode on" } else { "vi mode off" },
                    ToastSeverity::Info,
                );
            }
        }
    }

    /// Enter on a list row (models or resume).
    async fn handle_selection(&mut self, index: usize) {
        match self.router.view() {
            ContentView::Models => {
                if let Some(model) = self.router.items.get(index).cloned() {
                    self.provider_model =
                        format!("{}-{}", self.config.llm.provider, model);
                    let _ = self.agent_tx.send(AgentRequest::SwitchModel(model)).await;
                }
                self.router.show_chat();
            }
            ContentView::Resume => {
                if let Some(id) = self.resume_ids.get(index).cloned() {
                    let _ = self.agent_tx.send(AgentRequest::LoadSession(id)).await;
                }
                self.router.show_chat();
            }
            _ => {}
        }
    }

    // ── Prompt submission & history cursor ───────────────────────────────────

    pub(crate) async fn submit_prompt(&mut self, text: String) {
        // Submitting from inside history rolls both views back first.
        let rollback_to = if self.history_cursor < self.history.len() {
            let entry = &self.history[self.history_cursor];
            let session_snapshot = entry.session_snapshot;
            let chat_snapshot = entry.chat_snapshot;
            self.chat.truncate_to(chat_snapshot);
            self.history.truncate(self.history_cursor);
            (session_snapshot != usize::MAX).then_some(session_snapshot)
        } else {
            None
        };

        let chat_snapshot = self.chat.len();
        self.chat.add(format!("You: {text}"));
        if let Some(h) = &self.prompt_history {
            h.append(&text);
        }
        self.history.push(PromptHistoryEntry {
            prompt: text.clone(),
            session_snapshot: usize::MAX, // patched by TurnStarted
            chat_snapshot,
        });
        self.history_cursor = self.history.len();
        self.pending_editor = None;

        self.streaming = true;
        self.assistant_streaming = false;
        self.waiting_since = Some(Instant::now());
        let _ = self
            .agent_tx
            .send(AgentRequest::Submit { text, rollback_to })
            .await;
    }

    fn history_back(&mut self) {
        if self.history_cursor == 0 {
            return;
        }
        if self.history_cursor == self.history.len() {
            self.pending_editor = Some(self.editor.text());
        }
        self.history_cursor -= 1;
        let prompt = self.history[self.history_cursor].prompt.clone();
        self.editor.set_text(&prompt);
    }

    fn history_forward(&mut self) {
        if self.history_cursor >= self.history.len() {
            return;
        }
        self.history_cursor += 1;
        if self.history_cursor == self.history.len() {
            let pending = self.pending_editor.take().unwrap_or_default();
            self.editor.set_text(&pending);
        } else {
            let prompt = self.history[self.history_cursor].prompt.clone();
            self.editor.set_text(&prompt);
        }
    }

    // ── `@` file references ──────────────────────────────────────────────────

    /// The `@token` under the cursor, if any.
    fn file_token(&self) -> Option<String> {
        let (row, col) = self.editor.cursor();
        let line = self.editor.lines().get(row)?;
        let before: String = line.chars().take(col).collect();
        let at = before.rfind('@')?;
        let token = &before[at + 1..];
        if token.contains(char::is_whitespace) {
            return None;
        }
        Some(token.to_string())
    }

    async fn update_file_completion(&mut self) {
        if self.editor.mode != EditorMode::Insert && self.editor.mode != EditorMode::Learning {
            return;
        }
        match self.file_token() {
            Some(token) => {
                // A completed token followed by a space loads immediately;
                // that case is handled below, here the token is still open.
                let candidates = filetree::matching(&self.project_root, &token);
                if candidates.len() == 1 && candidates[0] == token {
                    // Fully typed: load on the spot and drop the popup.
                    self.popup.clear();
                    self.load_file_reference(&token.clone()).await;
                } else {
                    self.popup.set_candidates(candidates, CompletionKind::FilePath);
                }
            }
            None => {
                if self.popup.kind == CompletionKind::FilePath {
                    self.popup.clear();
                }
            }
        }
    }

    /// Replace the open `@token` with the accepted path.
    fn replace_file_token(&mut self, path: &str) {
        let text = self.editor.text();
        if let Some(at) = text.rfind('@') {
            let mut new_text = text[..at].to_string();
            new_text.push('@');
            new_text.push_str(path);
            new_text.push(' ');
            self.editor.set_text(&new_text);
        }
    }

    pub(crate) async fn load_file_reference(&mut self, rel: &str) {
        self.chat.add(format!("Loaded file: {rel}"));
        let path = self.project_root.join(rel);
        let _ = self.agent_tx.send(AgentRequest::LoadFile(path)).await;
    }

    // ── Learning mode ────────────────────────────────────────────────────────

    fn append_to_agents_md(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let path = self.project_root.join("AGENTS.md");
        let mut content = std::fs::read_to_string(&path).unwrap_or_default();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("- {text}\n"));
        match std::fs::write(&path, content) {
            Ok(()) => self
                .toasts
                .push("noted in AGENTS.md", ToastSeverity::Success),
            Err(e) => self.toasts.push(format!("AGENTS.md: {e}"), ToastSeverity::Error),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn code(c: KeyCode) -> KeyEvent {
        KeyEvent::new(c, KeyModifiers::NONE)
    }

    async fn type_command(app: &mut App, cmd: &str) {
        app.handle_key(key(':')).await;
        for c in cmd.chars() {
            app.handle_key(key(c)).await;
        }
        app.handle_key(code(KeyCode::Enter)).await;
    }

    // ── Command resolution (end to end through the key path) ─────────────────

    #[tokio::test]
    async fn prefix_unique_command_quits() {
        let (mut app, _rx) = App::for_testing();
        type_command(&mut app, "q").await;
        assert!(app.is_quitting());
    }

    #[tokio::test]
    async fn prefix_ambiguous_command_reports_candidates() {
        let (mut app, _rx) = App::for_testing();
        type_command(&mut app, "c").await;
        assert!(!app.is_quitting());
        let toast = app.toasts.current().expect("ambiguity toast");
        assert!(toast.text.contains("ambiguous"));
        assert!(toast.text.contains("compact"));
        assert!(toast.text.contains("context"));
    }

    #[tokio::test]
    async fn unknown_command_reports_not_found() {
        let (mut app, _rx) = App::for_testing();
        type_command(&mut app, "frobnicate").await;
        let toast = app.toasts.current().unwrap();
        assert!(toast.text.contains("not found"));
    }

    #[tokio::test]
    async fn export_with_bad_flavour_is_rejected() {
        let (mut app, mut rx) = App::for_testing();
        type_command(&mut app, "export xml").await;
        assert!(rx.try_recv().is_err(), "no request should have been sent");
        assert!(app.toasts.current().unwrap().text.contains("full or conversation"));
    }

    // ── Prompt submission & history cursor ───────────────────────────────────

    #[tokio::test]
    async fn submit_adds_chat_line_and_sends_request() {
        let (mut app, mut rx) = App::for_testing();
        app.inject_input("fix the bug");
        app.handle_key(code(KeyCode::Enter)).await;
        assert_eq!(app.chat_messages().last().unwrap(), "You: fix the bug");
        match rx.try_recv().unwrap() {
            AgentRequest::Submit { text, rollback_to } => {
                assert_eq!(text, "fix the bug");
                assert_eq!(rollback_to, None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(app.streaming);
    }

    #[tokio::test]
    async fn empty_submit_is_ignored() {
        let (mut app, mut rx) = App::for_testing();
        app.handle_key(code(KeyCode::Enter)).await;
        assert!(rx.try_recv().is_err());
        assert!(app.chat_messages().is_empty());
    }

    #[tokio::test]
    async fn history_navigation_restores_pending_text() {
        let (mut app, _rx) = App::for_testing();
        app.inject_input("first prompt");
        app.handle_key(code(KeyCode::Enter)).await;
        app.handle_ui_event(crate::UiEvent::TurnStarted { session_snapshot: 0 });
        app.inject_input("half-typed");
        // Arrow-up on the first line enters history.
        app.handle_key(code(KeyCode::Up)).await;
        assert_eq!(app.editor.text(), "first prompt");
        // Arrow-down returns and restores the pending buffer.
        app.handle_key(code(KeyCode::Down)).await;
        assert_eq!(app.editor.text(), "half-typed");
    }

    #[tokio::test]
    async fn resubmitting_history_entry_rolls_back() {
        let (mut app, mut rx) = App::for_testing();
        // Two turns.
        app.inject_input("t1");
        app.handle_key(code(KeyCode::Enter)).await;
        app.handle_ui_event(crate::UiEvent::TurnStarted { session_snapshot: 0 });
        let _ = rx.try_recv();
        app.chat.add("Asimi: answer one".to_string());
        app.inject_input("t2");
        app.handle_key(code(KeyCode::Enter)).await;
        app.handle_ui_event(crate::UiEvent::TurnStarted { session_snapshot: 3 });
        let _ = rx.try_recv();
        app.chat.add("Asimi: answer two".to_string());
        assert_eq!(app.chat_messages().len(), 4);

        // Arrow-up twice to reach t1, edit, submit.
        app.handle_key(code(KeyCode::Up)).await;
        app.handle_key(code(KeyCode::Up)).await;
        assert_eq!(app.editor.text(), "t1");
        app.inject_input("t1-edited");
        app.handle_key(code(KeyCode::Enter)).await;

        // Chat was truncated to before t1, then the new prompt appended.
        assert_eq!(app.chat_messages().len(), 1);
        assert_eq!(app.chat_messages()[0], "You: t1-edited");
        match rx.try_recv().unwrap() {
            AgentRequest::Submit { text, rollback_to } => {
                assert_eq!(text, "t1-edited");
                assert_eq!(rollback_to, Some(0));
            }
            other => panic!("unexpected request: {other:?}"),
        }
        // The in-session history now has exactly the new entry.
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history[0].prompt, "t1-edited");
    }

    // ── Command line interactions ─────────────────────────────────────────────

    #[tokio::test]
    async fn colon_opens_command_line_and_escape_closes() {
        let (mut app, _rx) = App::for_testing();
        app.handle_key(key(':')).await;
        assert!(app.cmdline.active);
        assert_eq!(app.editor.mode, EditorMode::Command);
        app.handle_key(code(KeyCode::Esc)).await;
        assert!(!app.cmdline.active);
    }

    #[tokio::test]
    async fn typing_in_command_line_updates_completion() {
        let (mut app, _rx) = App::for_testing();
        app.handle_key(key(':')).await;
        app.handle_key(key('e')).await;
        assert!(app.popup.is_visible());
        assert_eq!(app.popup.candidates, vec!["export"]);
    }

    // ── Ctrl-C ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn single_ctrl_c_warns_double_quits() {
        let (mut app, _rx) = App::for_testing();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        app.handle_key(ctrl_c).await;
        assert!(!app.is_quitting());
        app.handle_key(ctrl_c).await;
        assert!(app.is_quitting());
    }

    // ── Scroll mode ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ctrl_b_locks_scroll_and_escape_releases() {
        let (mut app, _rx) = App::for_testing();
        app.chat_max_scroll = 50;
        let ctrl_b = KeyEvent::new(KeyCode::Char('b'), KeyModifiers::CONTROL);
        app.handle_key(ctrl_b).await;
        assert!(app.chat.scroll_locked());
        app.chat.scroll = 20;
        app.handle_key(key('k')).await;
        assert_eq!(app.chat.scroll, 19);
        app.handle_key(code(KeyCode::Esc)).await;
        assert!(!app.chat.scroll_locked());
    }

    // ── File references ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn typed_file_reference_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        let (mut app, mut rx) = App::for_testing();
        app.project_root = dir.path().to_path_buf();

        for c in "@main.go".chars() {
            app.handle_key(key(c)).await;
        }
        assert!(app
            .chat_messages()
            .iter()
            .any(|m| m == "Loaded file: main.go"));
        match rx.try_recv().unwrap() {
            AgentRequest::LoadFile(p) => assert!(p.ends_with("main.go")),
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
