// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Content router: one active view out of chat / help / models / resume,
//! with unified navigation and a double-Escape hatch back to chat.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const DOUBLE_ESCAPE_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentView {
    Chat,
    Help,
    Models,
    Resume,
}

/// Navigation style of the active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// Free text scrolling (chat, help).
    Text,
    /// Line selection (models, resume).
    List,
}

/// What a routed key asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    None,
    /// Enter on a list row; the payload is the selected index.
    Selected(usize),
    /// Double-Escape (or selection flow) returned the UI to chat.
    BackToChat,
}

pub struct ContentRouter {
    view: ContentView,
    /// Rows shown in list mode (model names, session labels).
    pub items: Vec<String>,
    pub selected: usize,
    pub help_topic: Option<String>,
    pub scroll: u16,
    last_escape: Option<Instant>,
}

impl ContentRouter {
    pub fn new() -> Self {
        Self {
            view: ContentView::Chat,
            items: Vec::new(),
            selected: 0,
            help_topic: None,
            scroll: 0,
            last_escape: None,
        }
    }

    pub fn view(&self) -> ContentView {
        self.view
    }

    pub fn nav_mode(&self) -> NavMode {
        match self.view {
            ContentView::Chat | ContentView::Help => NavMode::Text,
            ContentView::Models | ContentView::Resume => NavMode::List,
        }
    }

    pub fn show_chat(&mut self) {
        self.view = ContentView::Chat;
        self.items.clear();
        self.selected = 0;
    }

    pub fn show_help(&mut self, topic: Option<String>) {
        self.view = ContentView::Help;
        self.help_topic = topic;
        self.scroll = 0;
    }

    pub fn show_models(&mut self, models: Vec<String>) {
        self.view = ContentView::Models;
        self.items = models;
        self.selected = 0;
    }

    pub fn show_resume(&mut self, sessions: Vec<String>) {
        self.view = ContentView::Resume;
        self.items = sessions;
        self.selected = 0;
    }

    /// Handle a key while a non-chat view is active.
    pub fn handle_key(&mut self, key: KeyEvent) -> RouterEvent {
        if key.code == KeyCode::Esc {
            let now = Instant::now();
            let double = self
                .last_escape
                .map(|t| now.duration_since(t) <= DOUBLE_ESCAPE_WINDOW)
                .unwrap_or(false);
            self.last_escape = Some(now);
            if double {
                self.show_chat();
                return RouterEvent::BackToChat;
            }
            return RouterEvent::None;
        }

        match self.nav_mode() {
            NavMode::List => self.handle_list_key(key),
            NavMode::Text => {
                match key.code {
                    KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
                    KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
                    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.scroll = self.scroll.saturating_sub(10)
                    }
                    KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.scroll = self.scroll.saturating_add(10)
                    }
                    _ => {}
                }
                RouterEvent::None
            }
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> RouterEvent {
        let len = self.items.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if len > 0 {
                    self.selected = (self.selected + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.selected = self.selected.saturating_sub(10)
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if len > 0 {
                    self.selected = (self.selected + 10).min(len - 1);
                }
            }
            KeyCode::Enter => {
                if len > 0 {
                    return RouterEvent::Selected(self.selected);
                }
            }
            _ => {}
        }
        RouterEvent::None
    }
}

impl Default for ContentRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
