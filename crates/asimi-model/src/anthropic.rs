// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Anthropic Messages API driver.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::{
    provider::ResponseStream, sse::SseParser, CompletionRequest, Message, ModelProvider, Part,
    ResponseEvent, Role,
};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Credential source: a plain API key uses the `x-api-key` header; an OAuth
/// token uses `Authorization: Bearer`.
pub enum Credential {
    ApiKey(String),
    OauthToken(String),
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
    model: String,
}

impl AnthropicProvider {
    pub fn new(base_url: Option<String>, credential: Credential, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            credential,
            model: model.into(),
        }
    }

    fn request_body(&self, req: &CompletionRequest) -> Value {
        let system: String = req
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n");
        let mut body = json!({
            "model": self.model,
            "max_tokens": if req.max_output_tokens > 0 { req.max_output_tokens } else { 4096 },
            "messages": to_wire_messages(&req.messages),
            "stream": true,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect(),
            );
        }
        body
    }
}

/// Convert history to Anthropic content blocks.  The system message is sent
/// separately; tool calls become `tool_use` blocks on the assistant message
/// and tool results become `tool_result` blocks on a user message.
fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            Role::System => {}
            Role::Human => wire.push(json!({ "role": "user", "content": msg.text() })),
            Role::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                for part in &msg.parts {
                    match part {
                        Part::Text { text } if !text.is_empty() => {
                            blocks.push(json!({ "type": "text", "text": text }));
                        }
                        Part::ToolCall { id, name, arguments } => {
                            let input: Value = serde_json::from_str(arguments)
                                .unwrap_or_else(|_| json!({}));
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": id,
                                "name": name,
                                "input": input,
                            }));
                        }
                        _ => {}
                    }
                }
                wire.push(json!({ "role": "assistant", "content": blocks }));
            }
            Role::Tool => {
                for part in &msg.parts {
                    if let Part::ToolResult { id, content } = part {
                        wire.push(json!({
                            "role": "user",
                            "content": [{
                                "type": "tool_result",
                                "tool_use_id": id,
                                "content": content,
                            }],
                        }));
                    }
                }
            }
        }
    }
    wire
}

/// Map one SSE payload to response events.  `content_block_start` announces
/// a tool_use block at an index; subsequent `input_json_delta` events carry
/// argument fragments for the same index, which the orchestrator joins.
fn event_to_responses(data: &Value) -> Vec<ResponseEvent> {
    let mut events = Vec::new();
    match data.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "content_block_start" => {
            let index = data.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            if data.pointer("/content_block/type").and_then(|v| v.as_str()) == Some("tool_use") {
                let id = data
                    .pointer("/content_block/id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let name = data
                    .pointer("/content_block/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                events.push(ResponseEvent::ToolCall {
                    index,
                    id,
                    name,
                    arguments: String::new(),
                });
            }
        }
        "content_block_delta" => {
            let index = data.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            match data.pointer("/delta/type").and_then(|v| v.as_str()) {
                Some("text_delta") => {
                    if let Some(text) = data.pointer("/delta/text").and_then(|v| v.as_str()) {
                        events.push(ResponseEvent::TextDelta(text.to_string()));
                    }
                }
                Some("input_json_delta") => {
                    if let Some(fragment) =
                        data.pointer("/delta/partial_json").and_then(|v| v.as_str())
                    {
                        events.push(ResponseEvent::ToolCall {
                            index,
                            id: String::new(),
                            name: String::new(),
                            arguments: fragment.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        "message_delta" => {
            if let Some(out) = data.pointer("/usage/output_tokens").and_then(|v| v.as_u64()) {
                let input = data
                    .pointer("/usage/input_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                events.push(ResponseEvent::Usage {
                    input_tokens: input as u32,
                    output_tokens: out as u32,
                });
            }
        }
        "message_stop" => events.push(ResponseEvent::Done),
        "error" => {
            let msg = data
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown stream error");
            events.push(ResponseEvent::Error(msg.to_string()));
        }
        _ => {}
    }
    events
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let mut http = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(&req));
        http = match &self.credential {
            Credential::ApiKey(k) => http.header("x-api-key", k),
            Credential::OauthToken(t) => http.bearer_auth(t),
        };
        let resp = http.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("anthropic error {status}: {body}");
        }

        let (tx, rx) = mpsc::channel::<anyhow::Result<ResponseEvent>>(64);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut parser = SseParser::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                for data in parser.push(&String::from_utf8_lossy(&chunk)) {
                    match serde_json::from_str::<Value>(&data) {
                        Ok(json) => {
                            for ev in event_to_responses(&json) {
                                let done = matches!(ev, ResponseEvent::Done);
                                if tx.send(Ok(ev)).await.is_err() || done {
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!("unparseable SSE chunk: {e}"),
                    }
                }
            }
            let _ = tx.send(Ok(ResponseEvent::Done)).await;
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_goes_to_top_level_field() {
        let p = AnthropicProvider::new(None, Credential::ApiKey("k".into()), "m");
        let body = p.request_body(&CompletionRequest {
            messages: vec![Message::system("SYS"), Message::human("hi")],
            ..Default::default()
        });
        assert_eq!(body["system"], "SYS");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn tool_use_and_result_blocks() {
        let wire = to_wire_messages(&[
            Message::assistant_turn(
                "text",
                vec![("c1".into(), "shell".into(), r#"{"command":"ls"}"#.into())],
            ),
            Message::tool_result("c1", "out"),
        ]);
        assert_eq!(wire[0]["content"][1]["type"], "tool_use");
        assert_eq!(wire[0]["content"][1]["input"]["command"], "ls");
        assert_eq!(wire[1]["content"][0]["type"], "tool_result");
        assert_eq!(wire[1]["content"][0]["tool_use_id"], "c1");
    }

    #[test]
    fn text_delta_event() {
        let data: Value = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        let evs = event_to_responses(&data);
        assert!(matches!(&evs[0], ResponseEvent::TextDelta(t) if t == "hi"));
    }

    #[test]
    fn tool_use_start_then_json_delta_share_index() {
        let start: Value = serde_json::from_str(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"c1","name":"shell"}}"#,
        )
        .unwrap();
        let evs = event_to_responses(&start);
        assert!(
            matches!(&evs[0], ResponseEvent::ToolCall { index: 1, id, name, .. } if id == "c1" && name == "shell")
        );
        let delta: Value = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"c"}}"#,
        )
        .unwrap();
        let evs = event_to_responses(&delta);
        assert!(
            matches!(&evs[0], ResponseEvent::ToolCall { index: 1, arguments, .. } if arguments == "{\"c")
        );
    }

    #[test]
    fn message_stop_maps_to_done() {
        let data: Value = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
        let evs = event_to_responses(&data);
        assert!(matches!(evs[0], ResponseEvent::Done));
    }
}
