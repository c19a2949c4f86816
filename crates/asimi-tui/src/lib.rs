// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The full-screen terminal interface: modal prompt editor, streaming chat
//! view, command line, completion popup, content router and status bar,
//! glued together by a single event loop.

pub mod agent_task;
pub mod app;
mod chat;
mod commandline;
mod commands;
mod completion;
mod editor;
mod filetree;
mod markdown;
mod router;
mod status;
mod widgets;

pub use agent_task::{agent_task, AgentRequest, AgentTaskSetup, UiEvent};
pub use app::{App, AppSetup};
pub use chat::ChatView;
pub use commandline::{CommandLine, Toast, ToastQueue, ToastSeverity};
pub use commands::{CommandAction, CommandLookup, CommandRegistry};
pub use completion::CompletionPopup;
pub use editor::{EditorAction, EditorMode, PromptEditor};
pub use router::{ContentRouter, ContentView, RouterEvent};
