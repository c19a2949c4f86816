// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Derivation of the `(host, org, project, branch)` partition key from the
//! git remote.

use std::path::Path;
use std::process::Command;

/// History and session rows are partitioned by this key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectKey {
    pub host: String,
    pub org: String,
    pub project: String,
    pub branch: String,
}

impl ProjectKey {
    /// `org/project`, shown in session metadata and the export header.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.org, self.project)
    }
}

/// Parse a git remote URL into `(host, org, project)`.
///
/// Accepted forms:
/// - `git@host:org/repo.git`
/// - `https://host/org/repo` with an optional `.git` suffix
///
/// Anything else yields `None`.
pub fn parse_remote(url: &str) -> Option<(String, String, String)> {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        let (org, repo) = path.split_once('/')?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if host.is_empty() || org.is_empty() || repo.is_empty() {
            return None;
        }
        return Some((host.to_string(), org.to_string(), repo.to_string()));
    }
    for scheme in ["https://", "http://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let mut parts = rest.split('/');
            let host = parts.next()?;
            let org = parts.next()?;
            let repo = parts.next()?;
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            if host.is_empty() || org.is_empty() || repo.is_empty() {
                return None;
            }
            return Some((host.to_string(), org.to_string(), repo.to_string()));
        }
    }
    None
}

/// Build the partition key for the repository at `root`.
///
/// - no remote configured: host defaults to `github.com`, org/project to
///   `unknown`;
/// - a remote that fails to parse: `("local", "local", "unknown")`.
pub fn project_key(root: &Path) -> ProjectKey {
    let remote = git_output(root, &["remote", "get-url", "origin"]);
    let (host, org, project) = match remote.as_deref() {
        None => ("github.com".into(), "unknown".into(), "unknown".into()),
        Some(url) => parse_remote(url)
            .unwrap_or_else(|| ("local".into(), "local".into(), "unknown".into())),
    };
    let branch = git_output(root, &["rev-parse", "--abbrev-ref", "HEAD"])
        .unwrap_or_else(|| "unknown".into());
    ProjectKey { host, org, project, branch }
}

fn git_output(root: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").current_dir(root).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
