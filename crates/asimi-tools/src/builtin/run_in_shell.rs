// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use asimi_sandbox::{CommandResult, HostDecision, HostShellRunner, ShellRunner};

use crate::{arg_str, format_lines, Tool, ToolCall, ToolOutput};

pub struct RunInShellTool {
    pub sandbox: Arc<dyn ShellRunner>,
    pub host: Arc<HostShellRunner>,
}

fn result_json(res: &CommandResult) -> String {
    json!({ "stdout": res.output, "exitCode": res.exit_code }).to_string()
}

#[async_trait]
impl Tool for RunInShellTool {
    fn name(&self) -> &str {
        "run_in_shell"
    }

    fn description(&self) -> &str {
        "Executes a shell command in the project sandbox and returns a JSON \
         object {\"stdout\": ..., \"exitCode\": ...}. stdout carries combined \
         stdout+stderr. Each invocation runs in a fresh subshell of a \
         persistent shell: `cd` and `export` do NOT persist between calls; \
         chain with `&&` or use absolute paths instead. Commands that exceed \
         the configured timeout return exitCode \"124\"."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "description": {
                    "type": "string",
                    "description": "One line describing what the command does (shown to the user)"
                }
            },
            "required": ["command", "description"],
            "additionalProperties": false
        })
    }

    async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = arg_str(&call.args, "command") else {
            return ToolOutput::err(&call.id, "missing required parameter 'command'");
        };
        debug!(cmd = %command, "run_in_shell tool");

        // Host-command policy first: safe patterns run silently, gated
        // patterns block on user approval, everything else stays sandboxed.
        if self.host.decide(command) != HostDecision::NotHost {
            return match self.host.run_gated(command).await {
                Ok(res) => ToolOutput::ok(&call.id, result_json(&res)),
                Err(e) => ToolOutput::err(&call.id, format!("host shell failure: {e}")),
            };
        }

        match self.sandbox.run(command).await {
            Ok(res) => ToolOutput::ok(&call.id, result_json(&res)),
            Err(first) => {
                // One transparent restart+retry on harness failure; the
                // container survives, only the attachment is rebuilt.
                warn!("sandbox harness error, restarting shell: {first}");
                self.sandbox.restart().await;
                match self.sandbox.run(command).await {
                    Ok(res) => ToolOutput::ok(&call.id, result_json(&res)),
                    Err(second) => {
                        ToolOutput::err(&call.id, format!("shell harness failure: {second}"))
                    }
                }
            }
        }
    }

    fn format(&self, args: &Value, output: &ToolOutput) -> String {
        let command = arg_str(args, "command").unwrap_or("?");
        let summary = serde_json::from_str::<Value>(&output.content)
            .ok()
            .and_then(|v| {
                v.get("exitCode")
                    .and_then(|c| c.as_str())
                    .map(|c| format!("exit {c}"))
            })
            .unwrap_or_else(|| "done".into());
        format_lines(format!("run_in_shell {command}"), output, summary)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
