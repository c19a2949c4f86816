// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Append-only prompt and command history, keyed per repo and branch.

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::{Db, ProjectKey, Result};

/// Which of the two identically-shaped logs a store writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLog {
    Prompt,
    Command,
}

impl HistoryLog {
    fn table(self) -> &'static str {
        match self {
            HistoryLog::Prompt => "history_prompt",
            HistoryLog::Command => "history_command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Write-through history store for one log and one project key.
pub struct HistoryStore {
    db: Db,
    key: ProjectKey,
    log: HistoryLog,
    enabled: bool,
}

impl HistoryStore {
    pub fn new(db: Db, key: ProjectKey, log: HistoryLog, enabled: bool) -> Self {
        Self { db, key, log, enabled }
    }

    /// Append one entry.  Storage failures degrade to a warning: history is
    /// a convenience, never a reason to interrupt the session.
    pub fn append(&self, content: &str) {
        if !self.enabled || content.trim().is_empty() {
            return;
        }
        let result: Result<()> = self.db.with(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (host, org, project, branch, content, ts)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    self.log.table()
                ),
                rusqlite::params![
                    self.key.host,
                    self.key.org,
                    self.key.project,
                    self.key.branch,
                    content,
                    Utc::now().timestamp(),
                ],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("history append failed: {e}");
        }
    }

    /// Load entries in chronological order, optionally capped to the most
    /// recent `limit`.
    pub fn load(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        if !self.enabled {
            return Vec::new();
        }
        let result: Result<Vec<HistoryEntry>> = self.db.with(|conn| {
            let sql = format!(
                "SELECT content, ts FROM (
                     SELECT content, ts, id FROM {}
                     WHERE host = ?1 AND org = ?2 AND project = ?3 AND branch = ?4
                     ORDER BY id DESC LIMIT ?5
                 ) ORDER BY id ASC",
                self.log.table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params![
                    self.key.host,
                    self.key.org,
                    self.key.project,
                    self.key.branch,
                    limit.map(|n| n as i64).unwrap_or(i64::MAX),
                ],
                |row| {
                    let content: String = row.get(0)?;
                    let ts: i64 = row.get(1)?;
                    Ok(HistoryEntry {
                        content,
                        timestamp: Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now),
                    })
                },
            )?;
            rows.collect()
        });
        match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!("history load failed: {e}");
                Vec::new()
            }
        }
    }

    /// Delete every entry for this project key.
    pub fn clear(&self) {
        let result: Result<()> = self.db.with(|conn| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE host = ?1 AND org = ?2 AND project = ?3 AND branch = ?4",
                    self.log.table()
                ),
                rusqlite::params![self.key.host, self.key.org, self.key.project, self.key.branch],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("history clear failed: {e}");
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(branch: &str) -> ProjectKey {
        ProjectKey {
            host: "github.com".into(),
            org: "acme".into(),
            project: "widget".into(),
            branch: branch.into(),
        }
    }

    fn store(db: &Db, branch: &str, log: HistoryLog) -> HistoryStore {
        HistoryStore::new(db.clone(), key(branch), log, true)
    }

    #[test]
    fn append_load_round_trip() {
        let db = Db::open_in_memory().unwrap();
        let s = store(&db, "main", HistoryLog::Prompt);
        let before = Utc::now();
        s.append("fix the bug");
        let entries = s.load(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "fix the bug");
        let delta = entries[0].timestamp - before;
        assert!(delta.num_seconds().abs() <= 2, "timestamp within tolerance");
    }

    #[test]
    fn load_is_chronological_and_limited() {
        let db = Db::open_in_memory().unwrap();
        let s = store(&db, "main", HistoryLog::Prompt);
        for i in 0..5 {
            s.append(&format!("p{i}"));
        }
        let all = s.load(None);
        assert_eq!(
            all.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(),
            vec!["p0", "p1", "p2", "p3", "p4"]
        );
        let last_two = s.load(Some(2));
        assert_eq!(
            last_two.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(),
            vec!["p3", "p4"]
        );
    }

    #[test]
    fn branches_are_isolated() {
        let db = Db::open_in_memory().unwrap();
        let main = store(&db, "main", HistoryLog::Prompt);
        let feature = store(&db, "feature", HistoryLog::Prompt);
        main.append("on main");
        feature.append("on feature");
        assert_eq!(main.load(None).len(), 1);
        assert_eq!(main.load(None)[0].content, "on main");
        assert_eq!(feature.load(None)[0].content, "on feature");
    }

    #[test]
    fn prompt_and_command_logs_are_separate() {
        let db = Db::open_in_memory().unwrap();
        let prompts = store(&db, "main", HistoryLog::Prompt);
        let commands = store(&db, "main", HistoryLog::Command);
        prompts.append("a prompt");
        commands.append("help");
        assert_eq!(prompts.load(None).len(), 1);
        assert_eq!(commands.load(None).len(), 1);
        assert_eq!(commands.load(None)[0].content, "help");
    }

    #[test]
    fn clear_only_affects_own_key() {
        let db = Db::open_in_memory().unwrap();
        let main = store(&db, "main", HistoryLog::Prompt);
        let feature = store(&db, "feature", HistoryLog::Prompt);
        main.append("x");
        feature.append("y");
        main.clear();
        assert!(main.load(None).is_empty());
        assert_eq!(feature.load(None).len(), 1);
    }

    #[test]
    fn disabled_store_is_inert() {
        let db = Db::open_in_memory().unwrap();
        let s = HistoryStore::new(db, key("main"), HistoryLog::Prompt, false);
        s.append("ignored");
        assert!(s.load(None).is_empty());
    }

    #[test]
    fn blank_entries_are_not_recorded() {
        let db = Db::open_in_memory().unwrap();
        let s = store(&db, "main", HistoryLog::Prompt);
        s.append("   ");
        assert!(s.load(None).is_empty());
    }
}
