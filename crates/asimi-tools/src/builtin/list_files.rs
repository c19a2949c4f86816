// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{arg_str, format_lines, guard::validate, Tool, ToolCall, ToolOutput};

pub struct ListFilesTool {
    pub root: PathBuf,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Lists the entries of a directory inside the project, one name per \
         line. Defaults to the project root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the project root (default \".\")"
                }
            },
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let path = arg_str(&call.args, "path").unwrap_or(".");
        let resolved = match validate(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        let mut entries = match std::fs::read_dir(&resolved) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            Err(e) => return ToolOutput::err(&call.id, format!("list error: {e}")),
        };
        entries.sort();
        ToolOutput::ok(&call.id, entries.join("\n"))
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let path = arg_str(args, "path").unwrap_or(".");
        let count = output.content.lines().count();
        format_lines(
            format!("list_files {path}"),
            output,
            format!("{count} entries"),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
