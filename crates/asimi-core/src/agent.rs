// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use asimi_model::{CompletionRequest, ModelProvider, ResponseEvent, ToolSchema};
use asimi_tools::{ToolCall, ToolRegistry};

use crate::{events::AgentEvent, session::ConversationSession};

/// The orchestrator: drives the streamed model ↔ tool loop over a session.
pub struct Agent {
    pub session: ConversationSession,
    tools: Arc<ToolRegistry>,
    model: Arc<dyn ModelProvider>,
    max_turns: u32,
    max_output_tokens: u32,
}

/// Accumulates streamed tool-call fragments keyed by the provider's
/// parallel-tool-call index.
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    /// Resolve to a dispatchable call.  Invalid or empty argument JSON is
    /// substituted with `{}`: providers reject `null` inputs on the next
    /// request, and the tool will report its own missing-parameter error.
    fn finish(self) -> ToolCall {
        let args: Value = if self.args_buf.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.args_buf).unwrap_or_else(|e| {
                warn!(
                    tool_name = %self.name,
                    tool_call_id = %self.id,
                    "model sent invalid JSON arguments; substituting {{}}: {e}"
                );
                Value::Object(Default::default())
            })
        };
        ToolCall { id: self.id, name: self.name, args }
    }
}

impl Agent {
    pub fn new(
        session: ConversationSession,
        tools: Arc<ToolRegistry>,
        model: Arc<dyn ModelProvider>,
        max_turns: u32,
        max_output_tokens: u32,
    ) -> Self {
        Self { session, tools, model, max_turns, max_output_tokens }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn model(&self) -> &Arc<dyn ModelProvider> {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.model.name()
    }

    pub fn set_model(&mut self, model: Arc<dyn ModelProvider>) {
        self.session.provider = model.name().to_string();
        self.session.model = model.model_name().to_string();
        if let Some(cw) = model.catalog_context_window() {
            self.session.max_tokens = cw as usize;
        }
        self.model = model;
    }

    /// Run one user turn: append the Human message, then iterate
    /// model-stream → tool-dispatch rounds until the model answers without
    /// tool calls, `max_turns` is reached, or the turn is cancelled.
    ///
    /// Cancellation interrupts the stream at the next event; whatever text
    /// was already streamed is appended so history stays consistent, and the
    /// next save strips tool calls that never executed.
    pub async fn run_turn(
        &mut self,
        human_text: &str,
        tx: mpsc::Sender<AgentEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        self.session.append_human(human_text);

        for round in 0..self.max_turns {
            debug!(round, "orchestrator round");
            let (text, calls, cancelled) = match self.stream_one_turn(&tx, &mut cancel).await {
                Ok(t) => t,
                Err(e) => {
                    let _ = tx.send(AgentEvent::StreamError(format!("{e:#}"))).await;
                    return;
                }
            };

            if cancelled {
                if !text.is_empty() {
                    self.session.append_assistant_turn(&text, vec![]);
                }
                let _ = tx.send(AgentEvent::StreamComplete).await;
                return;
            }

            let call_parts: Vec<(String, String, String)> = calls
                .iter()
                .map(|c| (c.id.clone(), c.name.clone(), c.args.to_string()))
                .collect();
            self.session.append_assistant_turn(&text, call_parts);

            if calls.is_empty() {
                let _ = tx.send(AgentEvent::StreamComplete).await;
                return;
            }

            // Tools run serially in emission order so their results append
            // in that same order.
            for call in calls {
                let _ = tx
                    .send(AgentEvent::ToolScheduled {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: call.args.clone(),
                    })
                    .await;
                let _ = tx.send(AgentEvent::ToolExecuting { id: call.id.clone() }).await;
                let output = self.tools.execute(&call).await;
                if output.is_error {
                    let _ = tx
                        .send(AgentEvent::ToolError {
                            id: call.id.clone(),
                            error: output.content.clone(),
                        })
                        .await;
                } else {
                    let _ = tx
                        .send(AgentEvent::ToolSuccess {
                            id: call.id.clone(),
                            result: output.content.clone(),
                        })
                        .await;
                }
                // Errors also go back to the model as the call's result; it
                // can read the message and adapt.
                self.session.append_tool_result(&call.id, &output.content);
            }
        }

        debug!("max_turns reached, ending turn");
        let _ = tx.send(AgentEvent::StreamComplete).await;
    }

    /// One streamed completion: forwards text chunks, accumulates tool-call
    /// fragments by index.  Returns `(text, calls, cancelled)`.
    async fn stream_one_turn(
        &mut self,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> anyhow::Result<(String, Vec<ToolCall>, bool)> {
        let tools: Vec<ToolSchema> = self
            .tools
            .schemas()
            .into_iter()
            .map(|s| ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect();

        let req = CompletionRequest {
            messages: self.session.messages.clone(),
            tools,
            max_output_tokens: self.max_output_tokens,
        };

        let mut stream = self.model.complete(req).await?;
        let mut full_text = String::new();
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();
        let mut cancelled = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut *cancel => {
                    cancelled = true;
                    break;
                }
                ev = stream.next() => ev,
            };
            let Some(event) = event else { break };
            match event? {
                ResponseEvent::TextDelta(delta) if !delta.is_empty() => {
                    full_text.push_str(&delta);
                    let _ = tx.send(AgentEvent::StreamChunk(delta)).await;
                }
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let ptc = pending.entry(index).or_insert_with(|| PendingToolCall {
                        id: String::new(),
                        name: String::new(),
                        args_buf: String::new(),
                    });
                    if !id.is_empty() {
                        ptc.id = id;
                    }
                    if !name.is_empty() {
                        ptc.name = name;
                    }
                    ptc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Usage { input_tokens, output_tokens } => {
                    let _ = tx.send(AgentEvent::Usage { input_tokens, output_tokens }).await;
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => warn!("model stream error: {e}"),
                _ => {}
            }
        }

        // Flush accumulated calls ordered by index.  Nameless calls cannot
        // dispatch and are dropped; an id-less call gets a synthetic id so
        // the call/result pairing stays intact.
        let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let mut calls = Vec::new();
        for (i, (_, ptc)) in sorted.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(tool_call_id = %ptc.id, "dropping tool call with empty name");
                continue;
            }
            let mut call = ptc.finish();
            if call.id.is_empty() {
                call.id = format!("tc_synthetic_{i}");
            }
            calls.push(call);
        }
        Ok((full_text, calls, cancelled))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
