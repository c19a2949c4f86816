// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Assistant,
    Tool,
}

/// One part of a message.
///
/// Assistant messages mix `Text` and `ToolCall` parts; Tool messages carry
/// exactly one `ToolResult` part referencing a prior call id.  Serialisation
/// is self-describing (tagged) so persisted sessions survive schema drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    ToolCall {
        /// Opaque id assigned by the model; never reused within a session.
        id: String,
        name: String,
        /// JSON-encoded argument object, forwarded verbatim.
        arguments: String,
    },
    ToolResult {
        /// References the `ToolCall` id this result answers.
        id: String,
        content: String,
    },
}

/// A single message in the conversation history: a role plus an ordered
/// list of parts.  The message list itself is the canonical turn order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, parts: vec![Part::Text { text: text.into() }] }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self { role: Role::Human, parts: vec![Part::Text { text: text.into() }] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, parts: vec![Part::Text { text: text.into() }] }
    }

    /// Assistant turn with optional text followed by the tool calls the model
    /// emitted, in emission order.  `calls` items are `(id, name, arguments)`.
    pub fn assistant_turn(
        text: impl Into<String>,
        calls: Vec<(String, String, String)>,
    ) -> Self {
        let text = text.into();
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(Part::Text { text });
        }
        for (id, name, arguments) in calls {
            parts.push(Part::ToolCall { id, name, arguments });
        }
        Self { role: Role::Assistant, parts }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![Part::ToolResult { id: id.into(), content: content.into() }],
        }
    }

    /// Concatenation of all text parts.  Empty for pure tool traffic.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-call parts of this message as `(id, name, arguments)` refs.
    pub fn tool_calls(&self) -> Vec<(&str, &str, &str)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall { id, name, arguments } => {
                    Some((id.as_str(), name.as_str(), arguments.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// The tool-result part, for `Role::Tool` messages.
    pub fn tool_result_part(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|p| match p {
            Part::ToolResult { id, content } => Some((id.as_str(), content.as_str())),
            _ => None,
        })
    }

    /// Approximate token count (4 chars/token heuristic) for context display.
    pub fn approx_tokens(&self) -> usize {
        let chars: usize = self
            .parts
            .iter()
            .map(|p| match p {
                Part::Text { text } => text.len(),
                Part::ToolCall { name, arguments, .. } => name.len() + arguments.len(),
                Part::ToolResult { content, .. } => content.len(),
            })
            .sum();
        (chars / 4).max(1)
    }
}

/// Strip tool-call parts that have no matching tool result and tool results
/// that reference no surviving call.  Messages left without parts are
/// dropped.  Returns the number of parts removed.
///
/// Cancelled turns can leave an assistant message whose trailing tool calls
/// were never executed; persisting those would violate the one-call/one-result
/// invariant and poison the next provider request.
pub fn strip_unmatched_tool_calls(messages: &mut Vec<Message>) -> usize {
    use std::collections::HashSet;

    let call_ids: HashSet<String> = messages
        .iter()
        .flat_map(|m| m.tool_calls().into_iter().map(|(id, _, _)| id.to_string()))
        .collect();
    let result_ids: HashSet<String> = messages
        .iter()
        .filter_map(|m| m.tool_result_part().map(|(id, _)| id.to_string()))
        .collect();

    let mut removed = 0;
    for msg in messages.iter_mut() {
        let before = msg.parts.len();
        msg.parts.retain(|p| match p {
            Part::ToolCall { id, .. } => result_ids.contains(id),
            Part::ToolResult { id, .. } => call_ids.contains(id),
            Part::Text { .. } => true,
        });
        removed += before - msg.parts.len();
    }
    messages.retain(|m| !m.parts.is_empty());
    removed
}

// ─── Provider request/response types ──────────────────────────────────────────

/// A tool schema provided to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider.  Always streamed.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub max_output_tokens: u32,
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model
    TextDelta(String),
    /// The model wants to call a tool.  Chunks for the same call share an
    /// `index`; `arguments` fragments are concatenated by the consumer.
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// Final usage statistics
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The stream finished normally
    Done,
    /// A recoverable error (non-fatal warning)
    Error(String),
}

/// Token usage from one turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Construction ─────────────────────────────────────────────────────────

    #[test]
    fn human_message_has_role_and_text() {
        let m = Message::human("hello");
        assert_eq!(m.role, Role::Human);
        assert_eq!(m.text(), "hello");
    }

    #[test]
    fn assistant_turn_orders_text_before_calls() {
        let m = Message::assistant_turn(
            "thinking",
            vec![("c1".into(), "read_file".into(), "{}".into())],
        );
        assert!(matches!(m.parts[0], Part::Text { .. }));
        assert!(matches!(m.parts[1], Part::ToolCall { .. }));
        assert_eq!(m.tool_calls(), vec![("c1", "read_file", "{}")]);
    }

    #[test]
    fn assistant_turn_with_empty_text_has_no_text_part() {
        let m = Message::assistant_turn("", vec![("c1".into(), "t".into(), "{}".into())]);
        assert_eq!(m.parts.len(), 1);
    }

    #[test]
    fn tool_result_references_call_id() {
        let m = Message::tool_result("c9", "ok");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_result_part(), Some(("c9", "ok")));
    }

    // ── Token approximation ───────────────────────────────────────────────────

    #[test]
    fn approx_tokens_divides_by_four_with_floor_of_one() {
        assert_eq!(Message::human("12345678").approx_tokens(), 2);
        assert_eq!(Message::human("hi").approx_tokens(), 1);
    }

    #[test]
    fn approx_tokens_counts_call_name_and_args() {
        let m = Message::assistant_turn("", vec![("id".into(), "aaaa".into(), "bbbbbbbb".into())]);
        assert_eq!(m.approx_tokens(), 3);
    }

    // ── Serialisation round-trip ──────────────────────────────────────────────

    #[test]
    fn message_round_trips_through_json() {
        let original = Message::assistant_turn(
            "text",
            vec![("c1".into(), "shell".into(), r#"{"command":"ls"}"#.into())],
        );
        let json = serde_json::to_string(&original).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn part_serialisation_is_tagged() {
        let json = serde_json::to_string(&Part::Text { text: "x".into() }).unwrap();
        assert!(json.contains("\"type\":\"text\""));
    }

    // ── Unmatched tool-call stripping ─────────────────────────────────────────

    fn convo_with_orphan_call() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::human("do things"),
            Message::assistant_turn(
                "on it",
                vec![
                    ("c1".into(), "read_file".into(), "{}".into()),
                    ("c2".into(), "write_file".into(), "{}".into()),
                ],
            ),
            Message::tool_result("c1", "contents"),
            // c2 was cancelled before execution, so there is no result.
        ]
    }

    #[test]
    fn strip_removes_orphan_call_keeps_matched_pair() {
        let mut msgs = convo_with_orphan_call();
        let removed = strip_unmatched_tool_calls(&mut msgs);
        assert_eq!(removed, 1);
        let calls: Vec<_> = msgs.iter().flat_map(|m| m.tool_calls()).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "c1");
    }

    #[test]
    fn strip_removes_orphan_result() {
        let mut msgs = vec![
            Message::system("sys"),
            Message::tool_result("ghost", "output with no call"),
        ];
        strip_unmatched_tool_calls(&mut msgs);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::System);
    }

    #[test]
    fn strip_drops_message_emptied_of_parts() {
        let mut msgs = vec![Message::assistant_turn(
            "",
            vec![("lonely".into(), "t".into(), "{}".into())],
        )];
        strip_unmatched_tool_calls(&mut msgs);
        assert!(msgs.is_empty());
    }

    #[test]
    fn strip_is_idempotent_on_consistent_history() {
        let mut msgs = convo_with_orphan_call();
        strip_unmatched_tool_calls(&mut msgs);
        let snapshot = msgs.clone();
        assert_eq!(strip_unmatched_tool_calls(&mut msgs), 0);
        assert_eq!(msgs, snapshot);
    }
}
