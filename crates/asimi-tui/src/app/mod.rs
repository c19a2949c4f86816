// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Top-level TUI application state and event loop.

pub(crate) mod agent_events;
pub(crate) mod dispatch;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::EventStream;
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, oneshot, Mutex};

use asimi_config::Config;
use asimi_sandbox::ApprovalRequest;
use asimi_store::{HistoryStore, RepoInfo, SessionStore};
use asimi_tools::ToolRegistry;

use crate::{
    agent_task::{AgentRequest, UiEvent},
    chat::ChatView,
    commandline::{CommandLine, ToastQueue},
    commands::CommandRegistry,
    completion::CompletionPopup,
    editor::PromptEditor,
    markdown::MarkdownRenderer,
    router::ContentRouter,
    status::ConnState,
    widgets,
};

/// Quiet time before the waiting indicator appears.
const WAIT_INDICATOR_AFTER: Duration = Duration::from_secs(3);
/// Window for double-Ctrl-C quit.
const DOUBLE_CTRL_C_WINDOW: Duration = Duration::from_millis(300);

/// One entry of the in-session prompt history: the submitted prompt plus the
/// snapshot lengths needed to roll both the session and the chat view back
/// to the state before that prompt ran.
pub(crate) struct PromptHistoryEntry {
    pub prompt: String,
    /// Session message count before the turn; patched in when the agent
    /// task confirms the turn start.
    pub session_snapshot: usize,
    pub chat_snapshot: usize,
}

pub struct AppSetup {
    pub config: Arc<Config>,
    pub project_root: PathBuf,
    pub repo: RepoInfo,
    pub prompt_history: Option<Arc<HistoryStore>>,
    pub command_history: Option<Arc<HistoryStore>>,
    pub session_store: Option<Arc<SessionStore>>,
    pub tools: Arc<ToolRegistry>,
    pub provider_model: String,
    pub agent_tx: mpsc::Sender<AgentRequest>,
    pub ui_rx: mpsc::Receiver<UiEvent>,
    pub approval_rx: mpsc::Receiver<ApprovalRequest>,
    pub cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

pub struct App {
    pub(crate) config: Arc<Config>,
    pub(crate) project_root: PathBuf,
    pub(crate) repo: RepoInfo,

    pub(crate) editor: PromptEditor,
    pub(crate) chat: ChatView,
    pub(crate) cmdline: CommandLine,
    pub(crate) toasts: ToastQueue,
    pub(crate) popup: CompletionPopup,
    pub(crate) router: ContentRouter,
    pub(crate) registry: CommandRegistry,
    pub(crate) markdown: MarkdownRenderer,

    pub(crate) prompt_history: Option<Arc<HistoryStore>>,
    pub(crate) command_history: Option<Arc<HistoryStore>>,
    pub(crate) session_store: Option<Arc<SessionStore>>,
    pub(crate) tools: Arc<ToolRegistry>,

    pub(crate) agent_tx: mpsc::Sender<AgentRequest>,
    pub(crate) ui_rx: Option<mpsc::Receiver<UiEvent>>,
    pub(crate) approval_rx: Option<mpsc::Receiver<ApprovalRequest>>,
    pub(crate) cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    /// Host-approval dialog awaiting a yes/no from the user.
    pub(crate) pending_approval: Option<ApprovalRequest>,

    pub(crate) should_quit: bool,
    pub(crate) streaming: bool,
    /// Set on submit and refreshed by every chunk; drives the ⏳ indicator.
    pub(crate) waiting_since: Option<Instant>,
    pub(crate) last_ctrl_c: Option<Instant>,
    pub(crate) session_started: Instant,
    pub(crate) context_pct: u8,
    pub(crate) conn: ConnState,
    pub(crate) provider_model: String,

    // In-session prompt history (§ history cursor semantics).
    pub(crate) history: Vec<PromptHistoryEntry>,
    pub(crate) history_cursor: usize,
    /// Editor content stashed when first stepping into history.
    pub(crate) pending_editor: Option<String>,

    /// Whether the last chat entry is the assistant message currently
    /// receiving stream chunks.
    pub(crate) assistant_streaming: bool,
    /// call id → (tool name, args) for interim tool-entry rendering.
    pub(crate) tool_meta: HashMap<String, (String, serde_json::Value)>,
    /// Session ids backing the rows of the resume list.
    pub(crate) resume_ids: Vec<String>,
    /// Rendered-height scroll ceiling, written by the chat widget each draw.
    pub(crate) chat_max_scroll: u16,
}

impl App {
    pub fn new(setup: AppSetup) -> Self {
        let vi = setup.config.llm.vi_mode;
        Self {
            config: setup.config,
            project_root: setup.project_root,
            repo: setup.repo,
            editor: PromptEditor::new(vi),
            chat: ChatView::new(),
            cmdline: CommandLine::new(),
            toasts: ToastQueue::default(),
            popup: CompletionPopup::new(),
            router: ContentRouter::new(),
            registry: CommandRegistry::with_builtins(),
            markdown: MarkdownRenderer::new(78),
            prompt_history: setup.prompt_history,
            command_history: setup.command_history,
            session_store: setup.session_store,
            tools: setup.tools,
            agent_tx: setup.agent_tx,
            ui_rx: Some(setup.ui_rx),
            approval_rx: Some(setup.approval_rx),
            cancel_slot: setup.cancel_slot,
            pending_approval: None,
            should_quit: false,
            streaming: false,
            waiting_since: None,
            last_ctrl_c: None,
            session_started: Instant::now(),
            context_pct: 0,
            conn: ConnState::Connected,
            provider_model: setup.provider_model,
            history: Vec::new(),
            history_cursor: 0,
            pending_editor: None,
            assistant_streaming: false,
            tool_meta: HashMap::new(),
            resume_ids: Vec::new(),
            chat_max_scroll: 0,
        }
    }

    /// Seconds of quiet time, once past the indicator threshold.
    pub(crate) fn waiting_secs(&self) -> Option<u64> {
        if !self.streaming {
            return None;
        }
        let since = self.waiting_since?;
        let quiet = since.elapsed();
        (quiet >= WAIT_INDICATOR_AFTER).then(|| quiet.as_secs())
    }

    /// Double-press detection for Ctrl-C quit.
    pub(crate) fn register_ctrl_c(&mut self) -> bool {
        let now = Instant::now();
        let double = self
            .last_ctrl_c
            .map(|t| now.duration_since(t) <= DOUBLE_CTRL_C_WINDOW)
            .unwrap_or(false);
        self.last_ctrl_c = Some(now);
        double
    }

    pub(crate) async fn cancel_streaming(&mut self) {
        if let Some(cancel) = self.cancel_slot.lock().await.take() {
            let _ = cancel.send(());
        }
    }

    /// The TUI event loop: draw, then wait for the next terminal event,
    /// agent event, or tick.
    pub async fn run(mut self, mut terminal: DefaultTerminal) -> anyhow::Result<()> {
        let mut ui_rx = self.ui_rx.take().expect("run() is called once");
        let mut approval_rx = self.approval_rx.take().expect("run() is called once");
        let mut term_events = EventStream::new();
        let mut tick = tokio::time::interval(Duration::from_millis(250));

        loop {
            self.toasts.prune();
            if let Ok(size) = terminal.size() {
                self.markdown.set_width(size.width.saturating_sub(2).max(20));
            }
            terminal.draw(|frame| widgets::draw(frame, &mut self))?;

            tokio::select! {
                Some(ev) = ui_rx.recv() => {
                    self.handle_ui_event(ev);
                    // Drain whatever else is already queued before redrawing.
                    while let Ok(ev) = ui_rx.try_recv() {
                        self.handle_ui_event(ev);
                    }
                }
                Some(req) = approval_rx.recv() => {
                    self.pending_approval = Some(req);
                }
                Some(Ok(ev)) = term_events.next() => {
                    if let crossterm::event::Event::Key(key) = ev {
                        if key.kind != crossterm::event::KeyEventKind::Release {
                            self.handle_key(key).await;
                        }
                    }
                }
                _ = tick.tick() => {}
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }
}

// ── Test helpers ──────────────────────────────────────────────────────────────

impl App {
    /// Construct a minimal `App` wired to mock channels.
    ///
    /// Returns the receiver of the agent-request channel so tests can assert
    /// on what the UI dispatched.
    pub fn for_testing() -> (Self, mpsc::Receiver<AgentRequest>) {
        let (agent_tx, agent_rx) = mpsc::channel(64);
        let (_ui_tx, ui_rx) = mpsc::channel(64);
        let (_approval_tx, approval_rx) = mpsc::channel(1);
        let setup = AppSetup {
            config: Arc::new(Config::default()),
            project_root: PathBuf::from("."),
            repo: RepoInfo::default(),
            prompt_history: None,
            command_history: None,
            session_store: None,
            tools: Arc::new(ToolRegistry::new()),
            provider_model: "mock-mock-model".into(),
            agent_tx,
            ui_rx,
            approval_rx,
            cancel_slot: Arc::new(Mutex::new(None)),
        };
        (Self::new(setup), agent_rx)
    }

    pub fn inject_input(&mut self, text: &str) {
        self.editor.set_text(text);
    }

    pub fn set_project_root(&mut self, root: PathBuf) {
        self.project_root = root;
    }

    pub fn chat_messages(&self) -> &[String] {
        self.chat.messages()
    }

    pub fn is_quitting(&self) -> bool {
        self.should_quit
    }
}
