// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{arg_str, format_lines, guard::validate, Tool, ToolCall, ToolOutput};

pub struct ReplaceTextTool {
    pub root: PathBuf,
}

#[async_trait]
impl Tool for ReplaceTextTool {
    fn name(&self) -> &str {
        "replace_text"
    }

    fn description(&self) -> &str {
        "Replaces every occurrence of old_text with new_text in a file and \
         reports the number of replacements. Nothing is written when \
         old_text does not occur or equals new_text."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"],
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = arg_str(&call.args, "path") else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let Some(old_text) = arg_str(&call.args, "old_text") else {
            return ToolOutput::err(&call.id, "missing required parameter 'old_text'");
        };
        let Some(new_text) = arg_str(&call.args, "new_text") else {
            return ToolOutput::err(&call.id, "missing required parameter 'new_text'");
        };
        if old_text.is_empty() {
            return ToolOutput::err(&call.id, "old_text must not be empty");
        }
        if old_text == new_text {
            return ToolOutput::ok(&call.id, "no-op: old_text equals new_text");
        }

        let resolved = match validate(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        let count = text.matches(old_text).count();
        if count == 0 {
            return ToolOutput::ok(&call.id, format!("no-op: old_text not found in {path}"));
        }
        debug!(path, count, "replace_text tool");

        let updated = text.replace(old_text, new_text);
        match tokio::fs::write(&resolved, updated).await {
            Ok(()) => ToolOutput::ok(
                &call.id,
                format!("replaced {count} occurrence(s) in {path}"),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let path = arg_str(args, "path").unwrap_or("?");
        format_lines(
            format!("replace_text {path}"),
            output,
            output.content.clone(),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixture(content: &str) -> (tempfile::TempDir, ReplaceTextTool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), content).unwrap();
        let tool = ReplaceTextTool { root: dir.path().to_path_buf() };
        (dir, tool)
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "e1".into(), name: "replace_text".into(), args }
    }

    #[tokio::test]
    async fn replaces_all_occurrences_and_counts() {
        let (dir, t) = fixture("foo bar foo baz foo");
        let out = t
            .call(&call(json!({"path": "f.txt", "old_text": "foo", "new_text": "qux"})))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("replaced 3"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "qux bar qux baz qux"
        );
    }

    #[tokio::test]
    async fn no_match_is_a_reported_noop() {
        let (dir, t) = fixture("abc");
        let out = t
            .call(&call(json!({"path": "f.txt", "old_text": "zzz", "new_text": "y"})))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("not found"));
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "abc");
    }

    #[tokio::test]
    async fn identical_old_and_new_is_a_noop() {
        let (_dir, t) = fixture("abc");
        let out = t
            .call(&call(json!({"path": "f.txt", "old_text": "a", "new_text": "a"})))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("no-op"));
    }

    #[tokio::test]
    async fn empty_old_text_is_error() {
        let (_dir, t) = fixture("abc");
        let out = t
            .call(&call(json!({"path": "f.txt", "old_text": "", "new_text": "x"})))
            .await;
        assert!(out.is_error);
    }
}
