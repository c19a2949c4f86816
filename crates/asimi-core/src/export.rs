// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Markdown transcript export.
//!
//! Two flavours: `full` reproduces everything (system prompt, context files,
//! pretty-printed tool inputs, complete outputs); `conversation` is the
//! readable digest, eliding long shell outputs down to exit code and size.

use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;

use asimi_model::Role;

use crate::session::ConversationSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFlavour {
    Full,
    Conversation,
}

impl ExportFlavour {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "conversation" | "" => Some(Self::Conversation),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Conversation => "conversation",
        }
    }
}

/// Shell outputs longer than this are elided in the conversation flavour.
const SHELL_OUTPUT_ELISION: usize = 128;

/// Render the transcript.  Message numbering advances per Human/Assistant
/// message and not on Tool messages, so the numbering in both flavours
/// matches.
pub fn render_export(session: &ConversationSession, flavour: ExportFlavour) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# asimi transcript ({})\n\n\
         - project: {}\n\
         - model: {}-{}\n\
         - working dir: {}\n\
         - exported: {}\n\n",
        flavour.label(),
        session.project_slug,
        session.provider,
        session.model,
        session.working_dir.display(),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    ));

    if flavour == ExportFlavour::Full {
        if let Some(system) = session.messages.iter().find(|m| m.role == Role::System) {
            out.push_str("## System prompt\n\n");
            out.push_str(&system.text());
            out.push_str("\n\n");
        }
        if !session.context_files.is_empty() {
            out.push_str("## Context files\n\n");
            for (path, content) in &session.context_files {
                out.push_str(&format!("### {path}\n\n```\n{content}\n```\n\n"));
            }
        }
    }

    out.push_str("## Conversation\n\n");
    let mut number = 0usize;
    for msg in &session.messages {
        match msg.role {
            Role::System => {}
            Role::Human => {
                number += 1;
                out.push_str(&format!("### {number}. You\n\n{}\n\n", msg.text()));
            }
            Role::Assistant => {
                number += 1;
                out.push_str(&format!("### {number}. Asimi\n\n"));
                let text = msg.text();
                if !text.is_empty() {
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
                for (id, name, args) in msg.tool_calls() {
                    out.push_str(&format!("**Tool call** `{name}` (`{id}`):\n\n"));
                    let pretty = serde_json::from_str::<Value>(args)
                        .and_then(|v| serde_json::to_string_pretty(&v))
                        .unwrap_or_else(|_| args.to_string());
                    out.push_str(&format!("```json\n{pretty}\n```\n\n"));
                }
            }
            Role::Tool => {
                // Hidden from numbering; rendered inline under the call.
                if let Some((id, content)) = msg.tool_result_part() {
                    out.push_str(&format!("**Result** (`{id}`):\n\n"));
                    out.push_str(&render_result(content, flavour));
                    out.push_str("\n\n");
                }
            }
        }
    }
    out
}

/// Shell results are `{"stdout": ..., "exitCode": ...}`; in the conversation
/// flavour long stdout collapses to exit code plus character count.
fn render_result(content: &str, flavour: ExportFlavour) -> String {
    if flavour == ExportFlavour::Conversation {
        if let Ok(v) = serde_json::from_str::<Value>(content) {
            if let (Some(stdout), Some(code)) =
                (v.get("stdout").and_then(|s| s.as_str()), v.get("exitCode").and_then(|c| c.as_str()))
            {
                if stdout.len() > SHELL_OUTPUT_ELISION {
                    return format!("exit {code}, {} chars of output elided", stdout.len());
                }
            }
        }
    }
    format!("```\n{content}\n```")
}

/// Write the transcript to the system temp directory under a timestamped
/// name and open it in `$EDITOR` when set.  Returns the file path.
pub fn write_and_open(session: &ConversationSession, flavour: ExportFlavour) -> anyhow::Result<PathBuf> {
    let rendered = render_export(session, flavour);
    let name = format!(
        "asimi-export-{}-{}.md",
        flavour.label(),
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;

    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            let _ = Command::new(editor).arg(&path).status();
        }
    }
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
