// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use asimi_model::{strip_unmatched_tool_calls, Message};
use asimi_store::{SessionSnapshot, SessionStore};

/// In-memory conversation state.  Every mutation enqueues an asynchronous
/// save so the on-disk snapshot lags by at most one queue drain.
pub struct ConversationSession {
    /// Assigned lazily on the first save-enqueue.
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub provider: String,
    pub model: String,
    pub working_dir: PathBuf,
    pub project_slug: String,
    pub messages: Vec<Message>,
    /// Files loaded via `@file` references; reloading overwrites, nothing
    /// invalidates until the session ends.
    pub context_files: BTreeMap<String, String>,
    /// Running 4-chars-per-token estimate over `messages`.
    pub token_count: usize,
    /// Context window of the active model, for the usage gauge.
    pub max_tokens: usize,
    started_at: Instant,
    store: Option<Arc<SessionStore>>,
}

impl ConversationSession {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        working_dir: PathBuf,
        project_slug: impl Into<String>,
        max_tokens: usize,
        store: Option<Arc<SessionStore>>,
    ) -> Self {
        Self {
            id: None,
            created_at: None,
            provider: provider.into(),
            model: model.into(),
            working_dir,
            project_slug: project_slug.into(),
            messages: Vec::new(),
            context_files: BTreeMap::new(),
            token_count: 0,
            max_tokens,
            started_at: Instant::now(),
            store,
        }
    }

    // ── Mutations (each enqueues a save) ─────────────────────────────────────

    pub fn append_system(&mut self, text: &str) {
        self.push(Message::system(text));
    }

    pub fn append_human(&mut self, text: &str) {
        self.push(Message::human(text));
    }

    /// Append the assistant turn with its tool calls in emission order.
    pub fn append_assistant_turn(&mut self, text: &str, calls: Vec<(String, String, String)>) {
        self.push(Message::assistant_turn(text, calls));
    }

    pub fn append_tool_result(&mut self, id: &str, payload: &str) {
        self.push(Message::tool_result(id, payload));
    }

    fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.messages.push(msg);
        self.enqueue_save();
    }

    /// Current message count; the unit of rollback.
    pub fn snapshot_length(&self) -> usize {
        self.messages.len()
    }

    /// Truncate the message list to exactly `n` entries.
    pub fn rollback_to(&mut self, n: usize) {
        if n >= self.messages.len() {
            return;
        }
        debug!(from = self.messages.len(), to = n, "session rollback");
        self.messages.truncate(n);
        self.recalculate_tokens();
        self.enqueue_save();
    }

    /// Read `path`, record it in the context files, and append a Human
    /// message noting the load.  Returns the file's lines for the caller.
    pub fn load_file(&mut self, path: &Path) -> anyhow::Result<Vec<String>> {
        let content = std::fs::read_to_string(path)?;
        let display = path.display().to_string();
        let lines = content.lines().map(str::to_string).collect();
        self.context_files.insert(display.clone(), content);
        self.push(Message::human(format!("Loaded file: {display}")));
        Ok(lines)
    }

    /// Strip tool calls without results (and vice versa); see the message
    /// invariants.  Returns the number of parts removed.
    pub fn remove_unmatched_tool_calls(&mut self) -> usize {
        let removed = strip_unmatched_tool_calls(&mut self.messages);
        if removed > 0 {
            self.recalculate_tokens();
            self.enqueue_save();
        }
        removed
    }

    /// Replace the whole message list (resume path).
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate_tokens();
        self.enqueue_save();
    }

    // ── Status-bar accessors ─────────────────────────────────────────────────

    pub fn context_usage_percent(&self) -> u8 {
        if self.max_tokens == 0 {
            return 0;
        }
        ((self.token_count * 100 / self.max_tokens).min(100)) as u8
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Build a snapshot, assigning the id and creation time on first use.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        let id = self
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let created_at = *self.created_at.get_or_insert_with(Utc::now);
        SessionSnapshot {
            id: Some(id),
            created_at: Some(created_at),
            provider: self.provider.clone(),
            model: self.model.clone(),
            working_dir: self.working_dir.display().to_string(),
            project_slug: self.project_slug.clone(),
            messages: self.messages.clone(),
            context_files: self.context_files.clone(),
        }
    }

    fn enqueue_save(&mut self) {
        if let Some(store) = self.store.clone() {
            let snapshot = self.snapshot();
            store.save(snapshot);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
