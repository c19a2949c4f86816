// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end scenarios across crate boundaries, driven through the mock
//! model provider and real (temporary) storage.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use asimi_core::{Agent, AgentEvent, ConversationSession};
use asimi_model::mock::ScriptedMockProvider;
use asimi_model::{Message, ResponseEvent, Role};
use asimi_sandbox::{global_broker, HostPolicy, HostShellRunner, ShellRunner};
use asimi_store::{Db, HistoryLog, HistoryStore, ProjectKey, SessionStore};
use asimi_tools::{default_registry, ToolCall, ToolRegistry};

fn key() -> ProjectKey {
    ProjectKey {
        host: "github.com".into(),
        org: "acme".into(),
        project: "widget".into(),
        branch: "main".into(),
    }
}

fn session(store: Option<Arc<SessionStore>>) -> ConversationSession {
    ConversationSession::new(
        "scripted-mock",
        "scripted-mock-model",
        PathBuf::from("/tmp/proj"),
        "acme/widget",
        100_000,
        store,
    )
}

/// A tool registry whose shell runs directly on the host (no container in
/// the test environment); the policy keeps every command on the "sandbox"
/// path, which is the host runner itself here.
fn host_backed_tools(root: &std::path::Path) -> Arc<ToolRegistry> {
    let host = Arc::new(HostShellRunner::new(HostPolicy::default()));
    let sandbox: Arc<dyn ShellRunner> =
        Arc::new(HostShellRunner::new(HostPolicy::default()));
    Arc::new(default_registry(root.to_path_buf(), sandbox, host))
}

async fn run_turn(agent: &mut Agent, prompt: &str) -> Vec<AgentEvent> {
    let (tx, mut rx) = mpsc::channel(256);
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    agent.run_turn(prompt, tx, cancel_rx).await;
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

// ── Scenario: shell run through the tool layer ───────────────────────────────

#[tokio::test]
async fn shell_run_returns_json_with_exit_code_and_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let tools = host_backed_tools(dir.path());
    let provider = ScriptedMockProvider::tool_then_text(
        "c1",
        "run_in_shell",
        r#"{"command":"echo hello","description":"say hello"}"#,
        "it printed hello",
    );
    let mut agent = Agent::new(session(None), tools, Arc::new(provider), 5, 1024);
    let events = run_turn(&mut agent, "run echo").await;

    let result = events
        .iter()
        .find_map(|e| match e {
            AgentEvent::ToolSuccess { result, .. } => Some(result.clone()),
            _ => None,
        })
        .expect("tool success event");
    let v: Value = serde_json::from_str(&result).unwrap();
    assert_eq!(v["exitCode"], "0");
    assert!(v["stdout"].as_str().unwrap().contains("hello"));
}

// ── Scenario: host-approval denial ───────────────────────────────────────────

#[tokio::test]
async fn denied_host_command_reports_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    // `gh` commands must run on the host, gated by approval.
    let host = Arc::new(HostShellRunner::new(HostPolicy::new(
        &[],
        &["^gh ".to_string()],
    )));
    let sandbox: Arc<dyn ShellRunner> =
        Arc::new(HostShellRunner::new(HostPolicy::default()));
    let tools = Arc::new(default_registry(dir.path().to_path_buf(), sandbox, host));

    // A UI that always denies.
    let (approval_tx, mut approval_rx) = mpsc::channel(4);
    global_broker().register(approval_tx);
    tokio::spawn(async move {
        while let Some(req) = approval_rx.recv().await {
            let _ = req.respond.send(false);
        }
    });

    let call = ToolCall {
        id: "c1".into(),
        name: "run_in_shell".into(),
        args: serde_json::json!({"command": "gh issue list", "description": "list issues"}),
    };
    let out = tools.execute(&call).await;
    assert!(!out.is_error);
    let v: Value = serde_json::from_str(&out.content).unwrap();
    assert_eq!(v["exitCode"], "1");
    assert!(v["stdout"].as_str().unwrap().contains("denied by user"));
}

// ── Scenario: rollback then resubmit ─────────────────────────────────────────

#[tokio::test]
async fn rollback_preserves_prefix_and_replays_new_prompt() {
    let provider = ScriptedMockProvider::new(vec![
        vec![ResponseEvent::TextDelta("answer one".into()), ResponseEvent::Done],
        vec![ResponseEvent::TextDelta("answer two".into()), ResponseEvent::Done],
        vec![ResponseEvent::TextDelta("answer three".into()), ResponseEvent::Done],
    ]);
    let tools = Arc::new(ToolRegistry::new());
    let mut agent = Agent::new(session(None), tools, Arc::new(provider), 5, 1024);
    agent.session.append_system("sys");

    let n_pre = agent.session.snapshot_length();
    run_turn(&mut agent, "t1").await;
    run_turn(&mut agent, "t2").await;
    assert_eq!(agent.session.snapshot_length(), 5);

    let prefix: Vec<Message> = agent.session.messages[..n_pre].to_vec();
    agent.session.rollback_to(n_pre);
    run_turn(&mut agent, "t1-edited").await;

    // The prefix is byte-identical, the suffix starts with the new Human
    // message, and there is exactly one Human message at that position.
    assert_eq!(&agent.session.messages[..n_pre], &prefix[..]);
    let suffix = &agent.session.messages[n_pre..];
    assert_eq!(suffix[0].role, Role::Human);
    assert_eq!(suffix[0].text(), "t1-edited");
    let humans = suffix.iter().filter(|m| m.role == Role::Human).count();
    assert_eq!(humans, 1);
}

// ── Scenario: tool-call/result pairing survives persistence ──────────────────

#[tokio::test]
async fn saved_session_pairs_every_call_with_one_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(&dir.path().join("asimi.db")).unwrap();
    let store = Arc::new(SessionStore::new(db, key(), true));

    let tools = host_backed_tools(dir.path());
    let provider = ScriptedMockProvider::tool_then_text(
        "c1",
        "run_in_shell",
        r#"{"command":"echo hi","description":"hi"}"#,
        "done",
    );
    let mut agent = Agent::new(session(Some(store.clone())), tools, Arc::new(provider), 5, 1024);
    run_turn(&mut agent, "go").await;

    // Simulate a cancelled turn leaving an orphan call in memory.
    agent
        .session
        .append_assistant_turn("", vec![("orphan".into(), "read_file".into(), "{}".into())]);
    store.flush().await;

    let saved = store.list(10);
    assert_eq!(saved.len(), 1);
    let msgs = &saved[0].messages;
    let call_ids: Vec<String> = msgs
        .iter()
        .flat_map(|m| m.tool_calls().into_iter().map(|(id, _, _)| id.to_string()))
        .collect();
    let result_ids: Vec<String> = msgs
        .iter()
        .filter_map(|m| m.tool_result_part().map(|(id, _)| id.to_string()))
        .collect();
    assert_eq!(call_ids, vec!["c1"], "orphan stripped at persistence time");
    assert_eq!(call_ids, result_ids);
}

// ── Scenario: resume round trip ──────────────────────────────────────────────

#[tokio::test]
async fn session_round_trips_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(&dir.path().join("asimi.db")).unwrap();
    let store = Arc::new(SessionStore::new(db, key(), true));

    let provider = ScriptedMockProvider::always_text("remembered");
    let mut agent = Agent::new(
        session(Some(store.clone())),
        Arc::new(ToolRegistry::new()),
        Arc::new(provider),
        5,
        1024,
    );
    run_turn(&mut agent, "remember me").await;
    store.flush().await;

    let id = agent.session.id.clone().expect("id assigned on first save");
    let loaded = store.load(&id).expect("session reloads");
    assert_eq!(loaded.messages, agent.session.messages);
    assert_eq!(loaded.first_prompt, "remember me");
}

// ── Scenario: history append/load round trip ─────────────────────────────────

#[test]
fn history_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(&dir.path().join("asimi.db")).unwrap();
    let prompts = HistoryStore::new(db.clone(), key(), HistoryLog::Prompt, true);
    let commands = HistoryStore::new(db, key(), HistoryLog::Command, true);

    prompts.append("make it faster");
    commands.append("export full");

    let loaded = prompts.load(None);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].content, "make it faster");
    assert_eq!(commands.load(None)[0].content, "export full");
}

// ── Scenario: file reference through the TUI ─────────────────────────────────

#[tokio::test]
async fn at_reference_loads_file_into_chat_and_context() {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();

    let (mut app, mut rx) = asimi_tui::App::for_testing();
    app.set_project_root(dir.path().to_path_buf());
    for c in "@main.go".chars() {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
            .await;
    }
    assert!(app
        .chat_messages()
        .iter()
        .any(|m| m == "Loaded file: main.go"));
    assert!(matches!(
        rx.try_recv().unwrap(),
        asimi_tui::AgentRequest::LoadFile(_)
    ));
}

// ── Scenario: command prefix resolution through the TUI ──────────────────────

#[tokio::test]
async fn colon_q_quits_and_colon_c_is_ambiguous() {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    let (mut app, _rx) = asimi_tui::App::for_testing();
    for key in [':', 'q'] {
        app.handle_key(KeyEvent::new(KeyCode::Char(key), KeyModifiers::NONE))
            .await;
    }
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
        .await;
    assert!(app.is_quitting());

    let (mut app, _rx) = asimi_tui::App::for_testing();
    for key in [':', 'c'] {
        app.handle_key(KeyEvent::new(KeyCode::Char(key), KeyModifiers::NONE))
            .await;
    }
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
        .await;
    assert!(!app.is_quitting());
}
