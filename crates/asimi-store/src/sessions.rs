// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Conversation snapshot persistence with an asynchronous write worker.
//!
//! `save()` never blocks the caller: snapshots go onto a bounded queue and a
//! single worker drains them to the synchronous save path in order.  A full
//! queue drops the save with a log line; the next mutation enqueues a fresh
//! snapshot anyway, so nothing is lost for long.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use asimi_model::{strip_unmatched_tool_calls, Message, Role};

use crate::{Db, ProjectKey, Result};

const QUEUE_CAPACITY: usize = 64;
const CLOSE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
const FIRST_PROMPT_MAX: usize = 100;

/// Everything needed to persist one conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Assigned on first save; `None` until then.
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub provider: String,
    pub model: String,
    pub working_dir: String,
    pub project_slug: String,
    pub messages: Vec<Message>,
    pub context_files: BTreeMap<String, String>,
}

/// A stored session row, as listed by `:resume`.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub first_prompt: String,
    pub provider: String,
    pub model: String,
    pub working_dir: String,
    pub project_slug: String,
    pub messages: Vec<Message>,
    pub context_files: BTreeMap<String, String>,
}

enum StoreJob {
    Save(SessionSnapshot),
    Flush(oneshot::Sender<()>),
}

pub struct SessionStore {
    db: Db,
    key: ProjectKey,
    enabled: bool,
    tx: mpsc::Sender<StoreJob>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(db: Db, key: ProjectKey, enabled: bool) -> Self {
        let (tx, mut rx) = mpsc::channel::<StoreJob>(QUEUE_CAPACITY);
        let worker_db = db.clone();
        let worker_key = key.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    StoreJob::Save(snapshot) => {
                        let db = worker_db.clone();
                        let key = worker_key.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            save_sync(&db, &key, snapshot)
                        })
                        .await;
                        match result {
                            Ok(Err(e)) => warn!("session save failed: {e}"),
                            Err(e) => warn!("session save task panicked: {e}"),
                            Ok(Ok(())) => {}
                        }
                    }
                    StoreJob::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("session store worker exited");
        });
        Self { db, key, enabled, tx, worker: std::sync::Mutex::new(Some(worker)) }
    }

    /// Enqueue a save.  A full queue drops the snapshot with a log line.
    pub fn save(&self, snapshot: SessionSnapshot) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.tx.try_send(StoreJob::Save(snapshot)) {
            warn!("session save queue full, dropping snapshot: {e}");
        }
    }

    /// Block until every save enqueued before this call has been written.
    /// The queue is ordered, so an in-band marker suffices.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(StoreJob::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Drain remaining queued saves, waiting at most two seconds.
    pub async fn close(&self) {
        if tokio::time::timeout(CLOSE_TIMEOUT, self.flush()).await.is_err() {
            warn!("session store close timed out before drain completed");
        }
        if let Some(worker) = self.worker.lock().unwrap().take() {
            worker.abort();
        }
    }

    /// Sessions for the current project key, most recently updated first.
    pub fn list(&self, limit: usize) -> Vec<SessionRecord> {
        let result = list_sync(&self.db, &self.key, limit);
        match result {
            Ok(records) => records,
            Err(e) => {
                warn!("session list failed: {e}");
                Vec::new()
            }
        }
    }

    /// Load one session by id.
    pub fn load(&self, id: &str) -> Option<SessionRecord> {
        match load_sync(&self.db, id) {
            Ok(record) => record,
            Err(e) => {
                warn!("session load failed: {e}");
                None
            }
        }
    }
}

/// First Human text part, truncated to 100 characters on a char boundary.
fn derive_first_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::Human)
        .map(|m| m.text().chars().take(FIRST_PROMPT_MAX).collect())
        .unwrap_or_default()
}

/// The synchronous save path.  Applies the pre-save pass: strip unmatched
/// tool calls, skip empty sessions, assign id and timestamps.
fn save_sync(db: &Db, key: &ProjectKey, mut snapshot: SessionSnapshot) -> Result<()> {
    strip_unmatched_tool_calls(&mut snapshot.messages);

    // Empty-session rule: nothing worth keeping without at least one Human
    // or Assistant message.
    if !snapshot
        .messages
        .iter()
        .any(|m| matches!(m.role, Role::Human | Role::Assistant))
    {
        debug!("skipping save of empty session");
        return Ok(());
    }

    let id = snapshot
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let created_at = snapshot.created_at.unwrap_or_else(Utc::now);
    let first_prompt = derive_first_prompt(&snapshot.messages);
    let messages_blob = serde_json::to_string(&snapshot.messages)?;
    let context_blob = serde_json::to_string(&snapshot.context_files)?;

    db.with(|conn| {
        conn.execute(
            "INSERT INTO session (id, host, org, project, branch, created_at, last_updated,
                                  first_prompt, provider, model, working_dir, project_slug,
                                  messages_blob, context_blob)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                 last_updated = excluded.last_updated,
                 first_prompt = excluded.first_prompt,
                 provider = excluded.provider,
                 model = excluded.model,
                 messages_blob = excluded.messages_blob,
                 context_blob = excluded.context_blob",
            rusqlite::params![
                id,
                key.host,
                key.org,
                key.project,
                key.branch,
                created_at.timestamp(),
                Utc::now().timestamp(),
                first_prompt,
                snapshot.provider,
                snapshot.model,
                snapshot.working_dir,
                snapshot.project_slug,
                messages_blob,
                context_blob,
            ],
        )?;
        Ok(())
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    use chrono::TimeZone;
    let created: i64 = row.get(1)?;
    let updated: i64 = row.get(2)?;
    let messages_blob: String = row.get(8)?;
    let context_blob: String = row.get(9)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        created_at: Utc.timestamp_opt(created, 0).single().unwrap_or_else(Utc::now),
        last_updated: Utc.timestamp_opt(updated, 0).single().unwrap_or_else(Utc::now),
        first_prompt: row.get(3)?,
        provider: row.get(4)?,
        model: row.get(5)?,
        working_dir: row.get(6)?,
        project_slug: row.get(7)?,
        messages: serde_json::from_str(&messages_blob).unwrap_or_default(),
        context_files: serde_json::from_str(&context_blob).unwrap_or_default(),
    })
}

const RECORD_COLUMNS: &str = "id, created_at, last_updated, first_prompt, provider, model,
                              working_dir, project_slug, messages_blob, context_blob";

fn list_sync(db: &Db, key: &ProjectKey, limit: usize) -> Result<Vec<SessionRecord>> {
    db.with(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM session
             WHERE host = ?1 AND org = ?2 AND project = ?3 AND branch = ?4
             ORDER BY last_updated DESC LIMIT ?5"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![key.host, key.org, key.project, key.branch, limit as i64],
            row_to_record,
        )?;
        rows.collect()
    })
}

fn load_sync(db: &Db, id: &str) -> Result<Option<SessionRecord>> {
    use rusqlite::OptionalExtension;
    db.with(|conn| {
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM session WHERE id = ?1"),
            [id],
            row_to_record,
        )
        .optional()
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use asimi_model::Message;

    fn key() -> ProjectKey {
        ProjectKey {
            host: "github.com".into(),
            org: "acme".into(),
            project: "widget".into(),
            branch: "main".into(),
        }
    }

    fn snapshot(id: Option<&str>, messages: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            id: id.map(String::from),
            created_at: None,
            provider: "mock".into(),
            model: "mock-model".into(),
            working_dir: "/tmp/proj".into(),
            project_slug: "acme/widget".into(),
            messages,
            context_files: BTreeMap::new(),
        }
    }

    fn convo() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::human("first prompt"),
            Message::assistant("reply"),
        ]
    }

    #[tokio::test]
    async fn save_and_list_round_trip() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        store.save(snapshot(Some("s1"), convo()));
        store.flush().await;
        let listed = store.list(10);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "s1");
        assert_eq!(listed[0].first_prompt, "first prompt");
        assert_eq!(listed[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn save_assigns_id_when_absent() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        store.save(snapshot(None, convo()));
        store.flush().await;
        let listed = store.list(10);
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].id.is_empty());
    }

    #[tokio::test]
    async fn empty_session_is_not_saved() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        store.save(snapshot(Some("s1"), vec![Message::system("sys only")]));
        store.flush().await;
        assert!(store.list(10).is_empty());
    }

    #[tokio::test]
    async fn unmatched_tool_calls_are_stripped_before_save() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        let mut messages = convo();
        messages.push(Message::assistant_turn(
            "",
            vec![("orphan".into(), "read_file".into(), "{}".into())],
        ));
        store.save(snapshot(Some("s1"), messages));
        store.flush().await;
        let loaded = store.load("s1").unwrap();
        assert!(loaded.messages.iter().all(|m| m.tool_calls().is_empty()));
    }

    #[tokio::test]
    async fn saved_tool_traffic_round_trips() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        let mut messages = convo();
        messages.push(Message::assistant_turn(
            "running",
            vec![("c1".into(), "run_in_shell".into(), r#"{"command":"ls"}"#.into())],
        ));
        messages.push(Message::tool_result("c1", r#"{"stdout":"x","exitCode":"0"}"#));
        store.save(snapshot(Some("s1"), messages.clone()));
        store.flush().await;
        let loaded = store.load("s1").unwrap();
        assert_eq!(loaded.messages, messages);
    }

    #[tokio::test]
    async fn resave_updates_last_updated_and_content() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        store.save(snapshot(Some("s1"), convo()));
        store.flush().await;
        let mut more = convo();
        more.push(Message::human("second"));
        store.save(snapshot(Some("s1"), more));
        store.flush().await;
        let listed = store.list(10);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].messages.len(), 4);
    }

    #[tokio::test]
    async fn first_prompt_is_truncated_to_100_chars() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db, key(), true);
        let long = "x".repeat(300);
        store.save(snapshot(Some("s1"), vec![Message::human(&long), Message::assistant("ok")]));
        store.flush().await;
        assert_eq!(store.list(10)[0].first_prompt.chars().count(), 100);
    }

    #[tokio::test]
    async fn list_is_scoped_to_project_key() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db.clone(), key(), true);
        store.save(snapshot(Some("s1"), convo()));
        store.flush().await;
        let other_key = ProjectKey { branch: "feature".into(), ..key() };
        let other = SessionStore::new(db, other_key, true);
        assert!(other.list(10).is_empty());
    }

    #[tokio::test]
    async fn close_drains_pending_saves() {
        let db = Db::open_in_memory().unwrap();
        let store = SessionStore::new(db.clone(), key(), true);
        store.save(snapshot(Some("s1"), convo()));
        store.close().await;
        let reopened = SessionStore::new(db, key(), true);
        assert_eq!(reopened.list(10).len(), 1);
    }
}
