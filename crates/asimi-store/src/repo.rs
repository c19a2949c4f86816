// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Snapshot of the git repository state for the status bar.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Git facts the UI cares about.  `status_summary` is cached from discovery
/// time; `diff_stats` re-runs git on demand.
#[derive(Debug, Clone, Default)]
pub struct RepoInfo {
    pub root: PathBuf,
    /// Worktree path when the session runs inside a linked worktree.
    pub worktree: Option<PathBuf>,
    pub branch: String,
    pub is_worktree: bool,
    /// Short cached summary, e.g. "3 changed".  Empty when clean or when
    /// `ASIMI_SKIP_GIT_STATUS` is set.
    pub status_summary: String,
}

impl RepoInfo {
    /// Discover repository facts for `dir`.  Returns a default (non-repo)
    /// value when git is unavailable or `dir` is not a work tree.
    pub fn discover(dir: &Path) -> Self {
        let Some(top) = git(dir, &["rev-parse", "--show-toplevel"]) else {
            return Self { root: dir.to_path_buf(), ..Self::default() };
        };
        let root = PathBuf::from(&top);
        let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap_or_else(|| "HEAD".into());
        // A linked worktree's git dir lives under <main>/.git/worktrees/<name>.
        let git_dir = git(dir, &["rev-parse", "--git-dir"]).unwrap_or_default();
        let is_worktree = git_dir.contains("/worktrees/");
        let worktree = is_worktree.then(|| root.clone());

        let status_summary = if std::env::var_os("ASIMI_SKIP_GIT_STATUS").is_some() {
            String::new()
        } else {
            match git(dir, &["status", "--porcelain"]) {
                Some(s) if !s.is_empty() => format!("{} changed", s.lines().count()),
                _ => String::new(),
            }
        };

        Self { root, worktree, branch, is_worktree, status_summary }
    }

    /// `(added, deleted)` line counts of the uncommitted diff; refreshed on
    /// every call.
    pub fn diff_stats(&self) -> (u32, u32) {
        let Some(out) = git(&self.root, &["diff", "--shortstat"]) else {
            return (0, 0);
        };
        parse_shortstat(&out)
    }

    pub fn has_changes(&self) -> bool {
        !self.status_summary.is_empty()
    }

    /// Branch colouring rule: yellow on the long-lived branches, green on
    /// topic branches.
    pub fn on_main_branch(&self) -> bool {
        matches!(self.branch.as_str(), "main" | "master")
    }
}

fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").current_dir(dir).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Parse `git diff --shortstat` output like
/// ` 3 files changed, 10 insertions(+), 2 deletions(-)`.
fn parse_shortstat(s: &str) -> (u32, u32) {
    let mut added = 0;
    let mut deleted = 0;
    for part in s.split(',') {
        let part = part.trim();
        let Some((num, rest)) = part.split_once(' ') else {
            continue;
        };
        let Ok(n) = num.parse::<u32>() else { continue };
        if rest.starts_with("insertion") {
            added = n;
        } else if rest.starts_with("deletion") {
            deleted = n;
        }
    }
    (added, deleted)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
