// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

/// Events emitted by the orchestrator during one turn.  The TUI consumes
/// these from its event loop; the one-shot runner prints them to stdout.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model.  Arrival also resets the UI's
    /// quiet-time waiting indicator.
    StreamChunk(String),
    /// A tool call was parsed from the stream and will run.
    ToolScheduled { id: String, name: String, args: Value },
    /// The tool call is about to execute.
    ToolExecuting { id: String },
    /// The tool finished successfully.
    ToolSuccess { id: String, result: String },
    /// The tool failed; the error text goes back to the model as the result.
    ToolError { id: String, error: String },
    /// Token usage reported by the provider for one completion.
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The turn ended normally (also after cancellation, once partial
    /// output has been committed).
    StreamComplete,
    /// The turn ended with a provider error; partial output is kept.
    StreamError(String),
}
