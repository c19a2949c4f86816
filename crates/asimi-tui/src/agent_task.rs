// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Background task that owns the orchestrator.
//!
//! The event loop never blocks on the model: it sends [`AgentRequest`]s here
//! and consumes [`UiEvent`]s, all model/session mutation happens on this
//! task.  Cancellation goes through a shared slot holding the sender half of
//! the current turn's oneshot channel.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use asimi_config::Config;
use asimi_core::{compact, system_prompt, Agent, AgentEvent, ConversationSession, ExportFlavour};
use asimi_model::{Message, ModelProvider};
use asimi_store::SessionStore;
use asimi_tools::ToolRegistry;

/// Requests from the UI to the agent task.
#[derive(Debug)]
pub enum AgentRequest {
    /// Run a turn.  `rollback_to` truncates the session first (edited
    /// prompt resubmission).
    Submit { text: String, rollback_to: Option<usize> },
    /// Record a file in the session's context set.
    LoadFile(PathBuf),
    /// Replace the session with a stored one.
    LoadSession(String),
    NewSession,
    Compact,
    Export(ExportFlavour),
    /// Re-instantiate the provider with a different model name.
    SwitchModel(String),
    ShowContext,
}

/// Events from the agent task to the UI loop.
#[derive(Debug)]
pub enum UiEvent {
    Agent(AgentEvent),
    /// Sent before a turn starts: the session length the prompt-history
    /// entry should roll back to.
    TurnStarted { session_snapshot: usize },
    ContextUsage(u8),
    /// Full transcript replacement (resume / new session).
    Transcript(Vec<Message>),
    ContextFiles(Vec<String>),
    Notice(String),
    Failure(String),
}

pub struct AgentTaskSetup {
    pub config: Arc<Config>,
    pub store: Option<Arc<SessionStore>>,
    pub project_root: PathBuf,
    pub project_slug: String,
}

fn fresh_session(setup: &AgentTaskSetup, model: &dyn ModelProvider) -> ConversationSession {
    let max_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;
    ConversationSession::new(
        model.name(),
        model.model_name(),
        setup.project_root.clone(),
        setup.project_slug.clone(),
        max_tokens,
        setup.store.clone(),
    )
}

pub async fn agent_task(
    setup: AgentTaskSetup,
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    mut rx: mpsc::Receiver<AgentRequest>,
    tx: mpsc::Sender<UiEvent>,
    cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
) {
    let session = fresh_session(&setup, model.as_ref());
    let llm = &setup.config.llm;
    let mut agent = Agent::new(
        session,
        tools,
        model,
        llm.max_turns,
        llm.max_output_tokens,
    );

    while let Some(req) = rx.recv().await {
        match req {
            AgentRequest::Submit { text, rollback_to } => {
                debug!(len = text.len(), ?rollback_to, "agent task: submit");
                if let Some(n) = rollback_to {
                    agent.session.rollback_to(n);
                }
                if agent.session.messages.is_empty() {
                    let prompt = system_prompt(
                        &agent.session.project_slug,
                        &agent.session.working_dir.display().to_string(),
                    );
                    agent.session.append_system(&prompt);
                }
                let _ = tx
                    .send(UiEvent::TurnStarted {
                        session_snapshot: agent.session.snapshot_length(),
                    })
                    .await;

                let (cancel_tx, cancel_rx) = oneshot::channel();
                *cancel_slot.lock().await = Some(cancel_tx);

                // Bridge the orchestrator's event channel into UiEvents.
                let (atx, mut arx) = mpsc::channel::<AgentEvent>(128);
                let fwd_tx = tx.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(ev) = arx.recv().await {
                        if fwd_tx.send(UiEvent::Agent(ev)).await.is_err() {
                            break;
                        }
                    }
                });
                agent.run_turn(&text, atx, cancel_rx).await;
                let _ = forwarder.await;

                cancel_slot.lock().await.take();
                let _ = tx
                    .send(UiEvent::ContextUsage(agent.session.context_usage_percent()))
                    .await;
            }
            AgentRequest::LoadFile(path) => match agent.session.load_file(&path) {
                Ok(_) => {
                    let _ = tx
                        .send(UiEvent::ContextUsage(agent.session.context_usage_percent()))
                        .await;
                }
                Err(e) => {
                    let _ = tx.send(UiEvent::Failure(format!("load failed: {e}"))).await;
                }
            },
            AgentRequest::LoadSession(id) => {
                let Some(store) = setup.store.as_ref() else {
                    let _ = tx
                        .send(UiEvent::Failure("session persistence is disabled".into()))
                        .await;
                    continue;
                };
                match store.load(&id) {
                    Some(record) => {
                        let model = agent.model().clone();
                        let mut session = fresh_session(&setup, model.as_ref());
                        session.id = Some(record.id);
                        session.created_at = Some(record.created_at);
                        session.context_files = record.context_files;
                        session.replace_messages(record.messages.clone());
                        let pct = session.context_usage_percent();
                        agent.session = session;
                        let _ = tx.send(UiEvent::Transcript(record.messages)).await;
                        let _ = tx.send(UiEvent::ContextUsage(pct)).await;
                    }
                    None => {
                        let _ = tx.send(UiEvent::Failure(format!("no session {id}"))).await;
                    }
                }
            }
            AgentRequest::NewSession => {
                let model = agent.model().clone();
                agent.session = fresh_session(&setup, model.as_ref());
                let _ = tx.send(UiEvent::Transcript(Vec::new())).await;
                let _ = tx.send(UiEvent::ContextUsage(0)).await;
            }
            AgentRequest::Compact => {
                let mut messages = std::mem::take(&mut agent.session.messages);
                let elided = compact(&mut messages);
                agent.session.replace_messages(messages);
                let note = if elided == 0 {
                    "nothing to compact".to_string()
                } else {
                    format!("compacted {elided} messages")
                };
                let _ = tx.send(UiEvent::Notice(note)).await;
                let _ = tx
                    .send(UiEvent::ContextUsage(agent.session.context_usage_percent()))
                    .await;
            }
            AgentRequest::Export(flavour) => {
                match asimi_core::write_and_open(&agent.session, flavour) {
                    Ok(path) => {
                        let _ = tx
                            .send(UiEvent::Notice(format!("exported to {}", path.display())))
                            .await;
                    }
                    Err(e) => {
                        let _ = tx.send(UiEvent::Failure(format!("export failed: {e}"))).await;
                    }
                }
            }
            AgentRequest::SwitchModel(name) => {
                let mut llm_cfg = setup.config.llm.clone();
                llm_cfg.model = name.clone();
                match asimi_model::from_config(&llm_cfg) {
                    Ok(model) => {
                        agent.set_model(model);
                        let _ = tx.send(UiEvent::Notice(format!("model: {name}"))).await;
                    }
                    Err(e) => {
                        let _ = tx.send(UiEvent::Failure(format!("model switch: {e}"))).await;
                    }
                }
            }
            AgentRequest::ShowContext => {
                let files: Vec<String> = agent.session.context_files.keys().cloned().collect();
                let _ = tx.send(UiEvent::ContextFiles(files)).await;
            }
        }
    }
    debug!("agent task exited");
}
