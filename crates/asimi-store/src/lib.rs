// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Persistence: a single embedded SQLite file holding per-repo/per-branch
//! prompt and command history plus rollback-able conversation snapshots.
//! History writes are write-through; session saves go through a bounded
//! queue drained by one async worker.

mod database;
mod history;
mod remote;
mod repo;
mod sessions;

pub use database::Db;
pub use history::{HistoryEntry, HistoryLog, HistoryStore};
pub use remote::{parse_remote, project_key, ProjectKey};
pub use repo::RepoInfo;
pub use sessions::{SessionRecord, SessionSnapshot, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("serialisation error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
