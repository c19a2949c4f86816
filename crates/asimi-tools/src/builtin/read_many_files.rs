// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::{format_lines, guard::validate, Tool, ToolCall, ToolOutput};

pub struct ReadManyFilesTool {
    pub root: PathBuf,
}

/// Convert a glob pattern to an anchored regex over `/`-separated relative
/// paths.  `**` crosses directories, `*` and `?` stay within one component.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow a following separator so `**/x` also matches `x`.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

impl ReadManyFilesTool {
    /// Project-relative paths matching `pattern`, sorted for stable output.
    fn matches(&self, pattern: &str) -> Vec<PathBuf> {
        let Some(re) = glob_to_regex(pattern) else {
            return Vec::new();
        };
        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.root).ok()?.to_path_buf();
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                re.is_match(&rel_str).then_some(rel)
            })
            .collect();
        found.sort();
        found
    }
}

#[async_trait]
impl Tool for ReadManyFilesTool {
    fn name(&self) -> &str {
        "read_many_files"
    }

    fn description(&self) -> &str {
        "Reads all project files matching the given glob patterns (`**` \
         crosses directories) and returns them concatenated, each prefixed \
         with a `---\\t<path>---` header. Unreadable matches are skipped."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Glob patterns relative to the project root, e.g. [\"src/**/*.rs\"]"
                }
            },
            "required": ["paths"],
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some(patterns) = call.args.get("paths").and_then(|v| v.as_array()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'paths'");
        };
        let patterns: Vec<&str> = patterns.iter().filter_map(|v| v.as_str()).collect();
        if patterns.is_empty() {
            return ToolOutput::err(&call.id, "'paths' must contain at least one glob");
        }

        let mut out = String::new();
        let mut files = 0usize;
        for pattern in &patterns {
            for rel in self.matches(pattern) {
                let rel_str = rel.to_string_lossy();
                // Outside-project and unreadable matches are skipped, not errors.
                let Ok(resolved) = validate(&self.root, &rel_str) else {
                    continue;
                };
                let Ok(content) = tokio::fs::read_to_string(&resolved).await else {
                    continue;
                };
                out.push_str(&format!("---\t{rel_str}---\n"));
                out.push_str(&content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
                files += 1;
            }
        }
        debug!(?patterns, files, "read_many_files tool");
        ToolOutput::ok(&call.id, out)
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let globs = args
            .get("paths")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_else(|| "?".into());
        let files = output
            .content
            .lines()
            .filter(|l| l.starts_with("---\t"))
            .count();
        format_lines(
            format!("read_many_files {globs}"),
            output,
            format!("{files} files"),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
