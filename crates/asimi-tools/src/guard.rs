// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Project-root path guard.
//!
//! Every file-touching tool funnels its path argument through [`validate`]
//! before any I/O.  Symlink resolution is the load-bearing part: a symlink
//! *inside* the project whose target lies outside must be rejected, so the
//! check runs on the canonicalised path, not the lexical one.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("empty path")]
    EmptyPath,
    #[error("path {0} is outside the project root")]
    OutsideProject(String),
}

/// Validate `input` against the project `root` and return the cleaned
/// absolute path.
///
/// The input is resolved against `root` when relative.  Symlinks are
/// resolved on the path itself when it exists, otherwise on its nearest
/// existing ancestor with the remaining components re-joined (so a tool may
/// create files in directories that do not exist yet).
pub fn validate(root: &Path, input: &str) -> Result<PathBuf, GuardError> {
    if input.is_empty() {
        return Err(GuardError::EmptyPath);
    }

    let joined = if Path::new(input).is_absolute() {
        PathBuf::from(input)
    } else {
        root.join(input)
    };

    let resolved = resolve(&joined);
    let resolved_root = resolve(root);

    if !resolved.starts_with(&resolved_root) {
        return Err(GuardError::OutsideProject(input.to_string()));
    }
    Ok(resolved)
}

/// Canonicalise as much of `path` as exists, then append the remainder with
/// `.` and `..` folded lexically.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // Walk up to the nearest existing ancestor.
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                existing.pop();
            }
            None => break,
        }
    }
    let mut out = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.clone());
    for name in tail.iter().rev() {
        match Path::new(name).components().next() {
            Some(Component::ParentDir) => {
                out.pop();
            }
            Some(Component::CurDir) | None => {}
            _ => out.push(name),
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        dir
    }

    #[test]
    fn empty_path_is_rejected() {
        let dir = project();
        assert_eq!(validate(dir.path(), ""), Err(GuardError::EmptyPath));
    }

    #[test]
    fn relative_path_inside_project_is_accepted() {
        let dir = project();
        let p = validate(dir.path(), "src/main.rs").unwrap();
        assert!(p.ends_with("src/main.rs"));
        assert!(p.is_absolute());
    }

    #[test]
    fn absolute_path_inside_project_is_accepted() {
        let dir = project();
        let abs = dir.path().join("src/main.rs");
        assert!(validate(dir.path(), abs.to_str().unwrap()).is_ok());
    }

    #[test]
    fn path_outside_project_is_rejected() {
        let dir = project();
        assert!(matches!(
            validate(dir.path(), "/etc/passwd"),
            Err(GuardError::OutsideProject(_))
        ));
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let dir = project();
        assert!(matches!(
            validate(dir.path(), "src/../../outside.txt"),
            Err(GuardError::OutsideProject(_))
        ));
    }

    #[test]
    fn nonexistent_file_in_existing_dir_is_accepted() {
        let dir = project();
        let p = validate(dir.path(), "src/new_file.rs").unwrap();
        assert!(p.ends_with("src/new_file.rs"));
    }

    #[test]
    fn nonexistent_nested_dirs_are_accepted() {
        let dir = project();
        assert!(validate(dir.path(), "a/b/c/d.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_project_is_rejected() {
        let dir = project();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();
        assert!(matches!(
            validate(dir.path(), "link.txt"),
            Err(GuardError::OutsideProject(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_dir_escaping_project_rejects_children() {
        let dir = project();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("vendor")).unwrap();
        // The child does not exist; resolution goes through the symlinked
        // parent and must still land outside.
        assert!(matches!(
            validate(dir.path(), "vendor/new.txt"),
            Err(GuardError::OutsideProject(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_staying_inside_project_is_accepted() {
        let dir = project();
        std::os::unix::fs::symlink(
            dir.path().join("src/main.rs"),
            dir.path().join("alias.rs"),
        )
        .unwrap();
        assert!(validate(dir.path(), "alias.rs").is_ok());
    }
}
