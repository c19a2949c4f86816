// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    arg_str, arg_usize, format_lines, guard::validate, Tool, ToolCall, ToolOutput,
};

pub struct ReadFileTool {
    pub root: PathBuf,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file inside the project. Without offset/limit the whole file \
         is returned. offset is a 1-based line number; limit caps the number \
         of lines. An offset past the end returns an empty result."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line number to start reading from"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = arg_str(&call.args, "path") else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        // Stringified numbers are accepted on purpose: some models send
        // "offset": "12" despite the integer schema.
        let offset = arg_usize(&call.args, "offset");
        let limit = arg_usize(&call.args, "limit");
        debug!(path, ?offset, ?limit, "read_file tool");

        let resolved = match validate(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        if offset.is_none() && limit.is_none() {
            return ToolOutput::ok(&call.id, text);
        }

        let start = offset.unwrap_or(1).saturating_sub(1);
        let slice: Vec<&str> = text
            .lines()
            .skip(start)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        let mut out = slice.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        ToolOutput::ok(&call.id, out)
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let path = arg_str(args, "path").unwrap_or("?");
        let head = match arg_usize(args, "offset") {
            Some(off) => format!("read_file {path}:{off}"),
            None => format!("read_file {path}"),
        };
        let lines = output.content.lines().count();
        format_lines(head, output, format!("{lines} lines"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixture() -> (tempfile::TempDir, ReadFileTool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\nfour\n").unwrap();
        let tool = ReadFileTool { root: dir.path().to_path_buf() };
        (dir, tool)
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "r1".into(), name: "read_file".into(), args }
    }

    #[tokio::test]
    async fn reads_whole_file() {
        let (_dir, t) = fixture();
        let out = t.call(&call(json!({"path": "f.txt"}))).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "one\ntwo\nthree\nfour\n");
    }

    #[tokio::test]
    async fn offset_and_limit_slice_lines() {
        let (_dir, t) = fixture();
        let out = t.call(&call(json!({"path": "f.txt", "offset": 2, "limit": 2}))).await;
        assert_eq!(out.content, "two\nthree\n");
    }

    #[tokio::test]
    async fn stringified_offset_and_limit_are_accepted() {
        let (_dir, t) = fixture();
        let out = t
            .call(&call(json!({"path": "f.txt", "offset": "2", "limit": "1"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "two\n");
    }

    #[tokio::test]
    async fn offset_beyond_eof_returns_empty_not_error() {
        let (_dir, t) = fixture();
        let out = t.call(&call(json!({"path": "f.txt", "offset": 100}))).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "");
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let (_dir, t) = fixture();
        let out = t.call(&call(json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn outside_project_is_rejected() {
        let (_dir, t) = fixture();
        let out = t.call(&call(json!({"path": "/etc/hostname"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("outside the project"));
    }

    #[test]
    fn format_shows_path_and_line_count() {
        let (_dir, t) = fixture();
        let out = ToolOutput::ok("1", "a\nb\n");
        let s = t.format(&json!({"path": "f.txt"}), &out);
        assert_eq!(s, "read_file f.txt\n╰ 2 lines");
    }
}
