// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{arg_str, format_lines, guard::validate, Tool, ToolCall, ToolOutput};

pub struct WriteFileTool {
    pub root: PathBuf,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes content to a file inside the project, creating parent \
         directories as needed. An existing file is overwritten."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "content": {
                    "type": "string",
                    "description": "Full new file content"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = arg_str(&call.args, "path") else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let Some(content) = arg_str(&call.args, "content") else {
            return ToolOutput::err(&call.id, "missing required parameter 'content'");
        };
        debug!(path, bytes = content.len(), "write_file tool");

        let resolved = match validate(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("create dir error: {e}"));
            }
        }
        match tokio::fs::write(&resolved, content).await {
            Ok(()) => ToolOutput::ok(
                &call.id,
                format!("wrote {} bytes to {path}", content.len()),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let path = arg_str(args, "path").unwrap_or("?");
        let bytes = arg_str(args, "content").map(|c| c.len()).unwrap_or(0);
        format_lines(
            format!("write_file {path}"),
            output,
            format!("{bytes} bytes"),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
