// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic conversation compaction for the `:compact` command.
//!
//! Keeps the System message and the most recent [`KEEP_RECENT`] messages and
//! replaces everything older with a single bracketed note.  No model call is
//! involved, so compaction always succeeds.

use asimi_model::{Message, Role};

/// Messages preserved verbatim at the tail.
pub const KEEP_RECENT: usize = 8;

/// Compact `messages` in place.  Returns the number of messages elided.
///
/// The split never lands inside a tool-interaction group: while the first
/// kept message is a Tool result, the split moves back so the assistant
/// message carrying the calls is kept too; an orphaned result would violate
/// the call/result pairing invariant.
pub fn compact(messages: &mut Vec<Message>) -> usize {
    let system: Option<Message> = messages.first().filter(|m| m.role == Role::System).cloned();
    let body_start = usize::from(system.is_some());
    let body_len = messages.len() - body_start;
    if body_len <= KEEP_RECENT + 1 {
        return 0;
    }

    let mut split = messages.len() - KEEP_RECENT;
    while split > body_start && messages[split].role == Role::Tool {
        split -= 1;
    }
    let elided = split - body_start;
    if elided == 0 {
        return 0;
    }

    let tail: Vec<Message> = messages.split_off(split);
    messages.truncate(body_start);
    messages.push(Message::assistant(format!(
        "[conversation compacted: {elided} earlier messages elided]"
    )));
    messages.extend(tail);
    elided
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
