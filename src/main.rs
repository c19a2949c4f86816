// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use asimi_config::Config;
use asimi_core::{system_prompt, Agent, AgentEvent, ConversationSession};
use asimi_sandbox::{global_broker, HostPolicy, HostShellRunner, PodmanShellRunner, ShellRunner};
use asimi_store::{project_key, Db, HistoryLog, HistoryStore, RepoInfo, SessionStore};
use asimi_tools::{default_registry, ToolRegistry};
use asimi_tui::{agent_task, AgentTaskSetup, App, AppSetup};

use cli::Cli;

const LOG_FILE: &str = "./asimi.log";

fn init_logging(debug: bool, trace: bool) {
    if !debug && !trace {
        return;
    }
    // The TUI owns stdout/stderr; all logging goes to a file.
    match std::fs::OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        Ok(file) => {
            let filter = EnvFilter::new(if trace { "trace" } else { "debug" });
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => eprintln!("cannot open {LOG_FILE}: {e}"),
    }
}

struct Stores {
    prompt_history: Option<Arc<HistoryStore>>,
    command_history: Option<Arc<HistoryStore>>,
    sessions: Option<Arc<SessionStore>>,
}

/// Open the embedded database and derive the per-project stores.  Storage is
/// never fatal: an unopenable database degrades to in-memory-only operation.
fn open_stores(config: &Config, root: &std::path::Path) -> Stores {
    let key = project_key(root);
    if !config.history.enabled && !config.session.enabled {
        return Stores { prompt_history: None, command_history: None, sessions: None };
    }
    match Db::open_default() {
        Ok(db) => {
            db.prune(&config.history);
            Stores {
                prompt_history: Some(Arc::new(HistoryStore::new(
                    db.clone(),
                    key.clone(),
                    HistoryLog::Prompt,
                    config.history.enabled,
                ))),
                command_history: Some(Arc::new(HistoryStore::new(
                    db.clone(),
                    key.clone(),
                    HistoryLog::Command,
                    config.history.enabled,
                ))),
                sessions: Some(Arc::new(SessionStore::new(
                    db,
                    key,
                    config.session.enabled,
                ))),
            }
        }
        Err(e) => {
            warn!("database unavailable, continuing without persistence: {e}");
            Stores { prompt_history: None, command_history: None, sessions: None }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.debug, args.trace);

    let config = Arc::new(asimi_config::load()?);
    let project_root =
        std::env::current_dir().context("cannot read the current working directory")?;
    let repo = RepoInfo::discover(&project_root);
    let slug = project_key(&project_root).slug();

    let stores = open_stores(&config, &project_root);
    let model = asimi_model::from_config(&config.llm)?;

    let host = Arc::new(HostShellRunner::new(HostPolicy::new(
        &config.run_in_shell.safe_run_on_host,
        &config.run_in_shell.run_on_host,
    )));
    let sandbox: Arc<dyn ShellRunner> = Arc::new(PodmanShellRunner::new(
        project_root.clone(),
        repo.worktree.clone(),
        &config.run_in_shell,
        &config.container,
    ));
    let tools = Arc::new(default_registry(
        project_root.clone(),
        sandbox.clone(),
        host,
    ));

    let result = match args.prompt.clone() {
        Some(prompt) => {
            run_one_shot(&config, &stores, model, tools, project_root, slug, prompt).await
        }
        None => run_tui(config.clone(), &stores, model, tools, project_root, slug, repo).await,
    };

    // Graceful teardown: stop the container, drain pending session saves.
    sandbox.close().await;
    if let Some(sessions) = &stores.sessions {
        sessions.close().await;
    }
    result
}

/// `-p` mode: one turn, streamed to stdout, no terminal takeover.
async fn run_one_shot(
    config: &Config,
    stores: &Stores,
    model: Arc<dyn asimi_model::ModelProvider>,
    tools: Arc<ToolRegistry>,
    project_root: PathBuf,
    slug: String,
    prompt: String,
) -> anyhow::Result<()> {
    let max_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;
    let mut session = ConversationSession::new(
        model.name(),
        model.model_name(),
        project_root.clone(),
        slug.clone(),
        max_tokens,
        stores.sessions.clone(),
    );
    session.append_system(&system_prompt(&slug, &project_root.display().to_string()));
    let mut agent = Agent::new(
        session,
        tools,
        model,
        config.llm.max_turns,
        config.llm.max_output_tokens,
    );

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(128);
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        let mut failed = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                AgentEvent::StreamChunk(chunk) => {
                    let _ = write!(stdout, "{chunk}");
                    let _ = stdout.flush();
                }
                AgentEvent::ToolScheduled { name, args, .. } => {
                    eprintln!("[tool] {name} {args}");
                }
                AgentEvent::ToolError { error, .. } => {
                    eprintln!("[tool error] {error}");
                }
                AgentEvent::StreamError(e) => {
                    eprintln!("⁉️ {e}");
                    failed = true;
                }
                _ => {}
            }
        }
        let _ = writeln!(stdout);
        failed
    });

    // The sender half must stay alive for the length of the turn; dropping
    // it would read as a cancellation.
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    agent.run_turn(&prompt, tx, cancel_rx).await;
    let failed = printer.await.unwrap_or(true);
    if let Some(h) = &stores.prompt_history {
        h.append(&prompt);
    }
    if failed {
        anyhow::bail!("turn ended with an error");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_tui(
    config: Arc<Config>,
    stores: &Stores,
    model: Arc<dyn asimi_model::ModelProvider>,
    tools: Arc<ToolRegistry>,
    project_root: PathBuf,
    slug: String,
    repo: RepoInfo,
) -> anyhow::Result<()> {
    let (agent_tx, agent_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(512);
    let (approval_tx, approval_rx) = mpsc::channel(4);
    global_broker().register(approval_tx);
    let cancel_slot = Arc::new(Mutex::new(None));

    let provider_model = format!("{}-{}", model.name(), model.model_name());
    let task_setup = AgentTaskSetup {
        config: config.clone(),
        store: stores.sessions.clone(),
        project_root: project_root.clone(),
        project_slug: slug,
    };
    tokio::spawn(agent_task(
        task_setup,
        model,
        tools.clone(),
        agent_rx,
        ui_tx,
        cancel_slot.clone(),
    ));

    let app = App::new(AppSetup {
        config,
        project_root,
        repo,
        prompt_history: stores.prompt_history.clone(),
        command_history: stores.command_history.clone(),
        session_store: stores.sessions.clone(),
        tools,
        provider_model,
        agent_tx,
        ui_rx,
        approval_rx,
        cancel_slot,
    });

    let terminal = ratatui::init();
    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
