// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Translation of agent-task events into chat view and status mutations.

use std::time::Instant;

use serde_json::Value;

use asimi_core::{AgentEvent, FAILURE_MARKER};
use asimi_model::{Message, Part, Role};
use asimi_tools::ToolOutput;

use crate::{
    agent_task::UiEvent,
    app::App,
    chat::{FAILURE_MARK, SUCCESS_MARK},
    status::ConnState,
    ToastSeverity,
};

impl App {
    pub fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Agent(ev) => self.handle_agent_event(ev),
            UiEvent::TurnStarted { session_snapshot } => {
                // Patch the pre-turn session length into the entry pushed by
                // submit_prompt.
                if let Some(entry) = self.history.last_mut() {
                    if entry.session_snapshot == usize::MAX {
                        entry.session_snapshot = session_snapshot;
                    }
                }
            }
            UiEvent::ContextUsage(pct) => self.context_pct = pct,
            UiEvent::Transcript(messages) => {
                self.chat.clear();
                self.rebuild_chat(&messages);
                self.session_started = Instant::now();
                self.assistant_streaming = false;
            }
            UiEvent::ContextFiles(files) => {
                if files.is_empty() {
                    self.toasts.push("no context files loaded", ToastSeverity::Info);
                } else {
                    self.chat.add(format!(
                        "Context files:\n{}",
                        files
                            .iter()
                            .map(|f| format!("  {f}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    ));
                }
            }
            UiEvent::Notice(text) => self.toasts.push(text, ToastSeverity::Success),
            UiEvent::Failure(text) => self.toasts.push(text, ToastSeverity::Error),
        }
    }

    fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::StreamChunk(chunk) => {
                // Every chunk resets the quiet-time clock.
                self.waiting_since = Some(Instant::now());
                if !self.assistant_streaming {
                    self.chat.add("Asimi: ");
                    self.assistant_streaming = true;
                }
                self.chat.append_to_last(&chunk);
            }
            AgentEvent::ToolScheduled { id, name, args } => {
                // The assistant entry for this round is finished; tool entries
                // follow it.
                self.assistant_streaming = false;
                self.waiting_since = Some(Instant::now());
                let head = tool_head(&name, &args);
                let index = self.chat.add(format!("{head}\n╰ scheduled"));
                self.chat.track_tool_call(&id, index);
                self.tool_meta.insert(id, (name, args));
            }
            AgentEvent::ToolExecuting { id } => {
                if let Some((name, args)) = self.tool_meta.get(&id) {
                    let head = tool_head(name, args);
                    self.chat.update_tool_call(&id, format!("{head}\n╰ running…"));
                }
            }
            AgentEvent::ToolSuccess { id, result } => {
                if let Some((name, args)) = self.tool_meta.get(&id) {
                    let output = ToolOutput::ok(&id, result);
                    let rendering = self.tools.format(name, args, &output);
                    self.chat.update_tool_call(&id, rendering);
                }
            }
            AgentEvent::ToolError { id, error } => {
                if let Some((name, args)) = self.tool_meta.get(&id) {
                    let output = ToolOutput::err(&id, error);
                    let rendering = self.tools.format(name, args, &output);
                    self.chat.update_tool_call(&id, rendering);
                }
            }
            AgentEvent::Usage { .. } => {}
            AgentEvent::StreamComplete => {
                self.streaming = false;
                self.waiting_since = None;
                self.conn = ConnState::Connected;
                self.finalize_assistant_message();
            }
            AgentEvent::StreamError(error) => {
                self.streaming = false;
                self.waiting_since = None;
                self.conn = ConnState::Error;
                self.chat.add(format!("⁉️ {error}"));
                self.toasts.push(error, ToastSeverity::Error);
            }
        }
    }

    /// End-of-stream: detect the failure marker on the final assistant
    /// message, strip it from the display, and tag the entry's glyph.
    fn finalize_assistant_message(&mut self) {
        if !self.assistant_streaming {
            return;
        }
        self.assistant_streaming = false;
        let Some(last) = self.chat.last().cloned() else {
            return;
        };
        let Some(body) = last.strip_prefix("Asimi: ") else {
            return;
        };
        if let Some(rest) = body.trim_start().strip_prefix(FAILURE_MARKER) {
            self.chat
                .replace_last(format!("Asimi: {}{FAILURE_MARK}", rest.trim_start()));
        } else {
            self.chat.replace_last(format!("{last}{SUCCESS_MARK}"));
        }
    }

    /// Rebuild the chat transcript from session messages (resume path).
    fn rebuild_chat(&mut self, messages: &[Message]) {
        for msg in messages {
            match msg.role {
                Role::System => {}
                Role::Human => {
                    let text = msg.text();
                    if let Some(loaded) = text.strip_prefix("Loaded file: ") {
                        self.chat.add(format!("Loaded file: {loaded}"));
                    } else {
                        self.chat.add(format!("You: {text}"));
                    }
                }
                Role::Assistant => {
                    let text = msg.text();
                    if !text.is_empty() {
                        self.chat.add(format!("Asimi: {text}"));
                    }
                    for part in &msg.parts {
                        if let Part::ToolCall { id, name, arguments } = part {
                            let args: Value = serde_json::from_str(arguments)
                                .unwrap_or(Value::Null);
                            let head = tool_head(name, &args);
                            let index = self.chat.add(format!("{head}\n╰ done"));
                            self.chat.track_tool_call(id, index);
                            self.tool_meta.insert(id.clone(), (name.clone(), args));
                        }
                    }
                }
                Role::Tool => {
                    if let Some((id, content)) = msg.tool_result_part() {
                        if let Some((name, args)) = self.tool_meta.get(id) {
                            let output = ToolOutput::ok(id, content);
                            let rendering = self.tools.format(name, args, &output);
                            self.chat.update_tool_call(id, rendering);
                        }
                    }
                }
            }
        }
    }
}

/// First line of a tool chat entry: tool name + its key argument.
fn tool_head(name: &str, args: &Value) -> String {
    let key_arg = ["command", "path", "paths"]
        .iter()
        .find_map(|k| args.get(k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    if key_arg.is_empty() {
        name.to_string()
    } else {
        let one_line = key_arg.replace('\n', " ");
        format!("{name} {one_line}")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
