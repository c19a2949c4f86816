// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// If true, the tool execution failed non-fatally (returned error message).
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: msg.into(), is_error: true }
    }
}

/// Trait every built-in tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn schema(&self) -> Value;
    /// Execute the tool.  Failures are wrapped in [`ToolOutput::err`].
    async fn call(&self, call: &ToolCall) -> ToolOutput;
    /// Two-line chat summary: tool name + key arguments on the first line,
    /// a `╰ `-prefixed result (or `╰ Error: …`) on the second.
    fn format(&self, args: &Value, output: &ToolOutput) -> String;
}

/// Assemble the canonical two-line tool rendering.
pub fn format_lines(head: impl AsRef<str>, output: &ToolOutput, summary: impl AsRef<str>) -> String {
    if output.is_error {
        format!("{}\n╰ Error: {}", head.as_ref(), first_line(&output.content))
    } else {
        format!("{}\n╰ {}", head.as_ref(), summary.as_ref())
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

// ─── Argument helpers ─────────────────────────────────────────────────────────

pub fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// Numeric argument that tolerates stringified numbers: some models send
/// `"offset": "12"` despite an integer schema.
pub fn arg_usize(args: &Value, key: &str) -> Option<usize> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
