// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, warn};

use asimi_config::HistoryConfig;

use crate::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS history_prompt (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    host    TEXT NOT NULL,
    org     TEXT NOT NULL,
    project TEXT NOT NULL,
    branch  TEXT NOT NULL,
    content TEXT NOT NULL,
    ts      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS history_command (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    host    TEXT NOT NULL,
    org     TEXT NOT NULL,
    project TEXT NOT NULL,
    branch  TEXT NOT NULL,
    content TEXT NOT NULL,
    ts      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS session (
    id           TEXT PRIMARY KEY,
    host         TEXT NOT NULL,
    org          TEXT NOT NULL,
    project      TEXT NOT NULL,
    branch       TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    last_updated INTEGER NOT NULL,
    first_prompt TEXT NOT NULL,
    provider     TEXT NOT NULL,
    model        TEXT NOT NULL,
    working_dir  TEXT NOT NULL,
    project_slug TEXT NOT NULL,
    messages_blob TEXT NOT NULL,
    context_blob  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_prompt_key
    ON history_prompt (host, org, project, branch, ts);
CREATE INDEX IF NOT EXISTS idx_history_command_key
    ON history_command (host, org, project, branch, ts);
CREATE INDEX IF NOT EXISTS idx_session_key
    ON session (host, org, project, branch, last_updated);
";

/// Shared handle to the single database file.  rusqlite connections are
/// `Send` but not `Sync`; the mutex serialises access, and the async session
/// worker wraps its calls in `spawn_blocking`.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (and migrate) the database under the user data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&default_db_path())
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "database opened");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub(crate) fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        Ok(f(&conn)?)
    }

    /// Prune rows beyond the configured retention.  Called once at startup;
    /// failures degrade to a warning because persistence is never fatal.
    pub fn prune(&self, cfg: &HistoryConfig) {
        let result = self.with(|conn| {
            let cutoff = chrono::Utc::now().timestamp() - i64::from(cfg.max_age_days) * 86_400;
            for table in ["history_prompt", "history_command"] {
                conn.execute(&format!("DELETE FROM {table} WHERE ts < ?1"), [cutoff])?;
                conn.execute(
                    &format!(
                        "DELETE FROM {table} WHERE id NOT IN \
                         (SELECT id FROM {table} ORDER BY ts DESC LIMIT ?1)"
                    ),
                    [i64::from(cfg.max_sessions)],
                )?;
            }
            conn.execute("DELETE FROM session WHERE last_updated < ?1", [cutoff])?;
            conn.execute(
                "DELETE FROM session WHERE id NOT IN \
                 (SELECT id FROM session ORDER BY last_updated DESC LIMIT ?1)",
                [i64::from(cfg.max_sessions)],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("pruning failed: {e}");
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asimi")
        .join("asimi.db")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema() {
        let db = Db::open_in_memory().unwrap();
        let n: i64 = db
            .with(|c| {
                c.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table'",
                    [],
                    |r| r.get(0),
                )
            })
            .unwrap();
        assert!(n >= 3);
    }

    #[test]
    fn open_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/asimi.db");
        let _a = Db::open(&path).unwrap();
        let _b = Db::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn prune_removes_old_rows() {
        let db = Db::open_in_memory().unwrap();
        let old_ts = chrono::Utc::now().timestamp() - 400 * 86_400;
        let now = chrono::Utc::now().timestamp();
        db.with(|c| {
            c.execute(
                "INSERT INTO history_prompt (host,org,project,branch,content,ts)
                 VALUES ('h','o','p','b','old',?1), ('h','o','p','b','new',?2)",
                rusqlite::params![old_ts, now],
            )
        })
        .unwrap();
        db.prune(&HistoryConfig::default());
        let n: i64 = db
            .with(|c| c.query_row("SELECT count(*) FROM history_prompt", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn prune_caps_row_count() {
        let db = Db::open_in_memory().unwrap();
        let now = chrono::Utc::now().timestamp();
        db.with(|c| {
            for i in 0..10 {
                c.execute(
                    "INSERT INTO history_prompt (host,org,project,branch,content,ts)
                     VALUES ('h','o','p','b',?1,?2)",
                    rusqlite::params![format!("row{i}"), now + i],
                )?;
            }
            Ok(())
        })
        .unwrap();
        db.prune(&HistoryConfig { max_sessions: 3, ..HistoryConfig::default() });
        let n: i64 = db
            .with(|c| c.query_row("SELECT count(*) FROM history_prompt", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(n, 3);
    }
}
