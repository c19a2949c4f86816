// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI-compatible chat-completions driver.
//!
//! Also serves Ollama and Gemini through their OpenAI-compatible endpoints;
//! only the base URL and key differ.

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

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    provider_name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: provider_name.into(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn request_body(&self, req: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": to_wire_messages(&req.messages),
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if req.max_output_tokens > 0 {
            body["max_tokens"] = json!(req.max_output_tokens);
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(
                req.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        body
    }
}

/// Convert the part-based history to the chat-completions wire shape.
///
/// Assistant tool calls become `tool_calls` array entries on the assistant
/// message; tool results become `role: "tool"` messages with `tool_call_id`.
fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            Role::System => wire.push(json!({ "role": "system", "content": msg.text() })),
            Role::Human => wire.push(json!({ "role": "user", "content": msg.text() })),
            Role::Assistant => {
                let calls: Vec<Value> = msg
                    .tool_calls()
                    .into_iter()
                    .map(|(id, name, args)| {
                        json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": args },
                        })
                    })
                    .collect();
                let mut m = json!({ "role": "assistant" });
                let text = msg.text();
                if !text.is_empty() {
                    m["content"] = json!(text);
                }
                if !calls.is_empty() {
                    m["tool_calls"] = Value::Array(calls);
                }
                wire.push(m);
            }
            Role::Tool => {
                for part in &msg.parts {
                    if let Part::ToolResult { id, content } = part {
                        wire.push(json!({
                            "role": "tool",
                            "tool_call_id": id,
                            "content": content,
                        }));
                    }
                }
            }
        }
    }
    wire
}

/// Translate one parsed SSE chunk into response events.
fn chunk_to_events(chunk: &Value) -> Vec<ResponseEvent> {
    let mut events = Vec::new();
    if let Some(delta) = chunk.pointer("/choices/0/delta") {
        if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                events.push(ResponseEvent::TextDelta(text.to_string()));
            }
        }
        if let Some(calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
            for tc in calls {
                events.push(ResponseEvent::ToolCall {
                    index: tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    id: tc.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    name: tc
                        .pointer("/function/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    arguments: tc
                        .pointer("/function/arguments")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                });
            }
        }
    }
    if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
        events.push(ResponseEvent::Usage {
            input_tokens: usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            output_tokens: usage
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        });
    }
    events
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut http = self.client.post(&url).json(&self.request_body(&req));
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        let resp = http.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} error {status}: {body}", self.provider_name);
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
                    if data.trim() == "[DONE]" {
                        let _ = tx.send(Ok(ResponseEvent::Done)).await;
                        return;
                    }
                    match serde_json::from_str::<Value>(&data) {
                        Ok(json) => {
                            for ev in chunk_to_events(&json) {
                                if tx.send(Ok(ev)).await.is_err() {
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
