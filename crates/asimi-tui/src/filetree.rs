// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Project file candidates for `@` file-reference completion.

use std::path::Path;

use walkdir::WalkDir;

const IGNORED_DIRS: &[&str] = &[".git", "vendor", "worktrees", "archive"];
const MAX_CANDIDATES: usize = 2000;

/// Relative paths of project files, sorted, ignored directories skipped.
pub fn project_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !IGNORED_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .take(MAX_CANDIDATES)
        .collect();
    files.sort();
    files
}

/// Candidates matching a typed `@` prefix.
pub fn matching(root: &Path, prefix: &str) -> Vec<String> {
    project_files(root)
        .into_iter()
        .filter(|f| f.contains(prefix))
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
