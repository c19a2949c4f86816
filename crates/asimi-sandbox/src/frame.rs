// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Framed-output protocol for the persistent sandbox shell.
//!
//! Every invocation is wrapped by the container-side `__asimi_run` function:
//!
//! ```text
//! __ASIMI_STDOUT_START:<id>
//! ...command output...
//! __ASIMI_STDOUT_END:<id>:<exit>
//! ```
//!
//! The id in both markers lets the single reader ignore stray marker-shaped
//! text printed by background processes: an END whose id does not match the
//! open frame is plain payload.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

pub(crate) const START_MARKER: &str = "__ASIMI_STDOUT_START:";
pub(crate) const END_MARKER: &str = "__ASIMI_STDOUT_END:";

pub(crate) fn parse_start(line: &str) -> Option<u64> {
    line.strip_prefix(START_MARKER)?.trim().parse().ok()
}

pub(crate) fn parse_end(line: &str) -> Option<(u64, String)> {
    let rest = line.strip_prefix(END_MARKER)?;
    let (id, exit) = rest.trim().split_once(':')?;
    Some((id.parse().ok()?, exit.to_string()))
}

// ─── Slot table ───────────────────────────────────────────────────────────────

/// Per-invocation output slot: registered by the caller before the command is
/// written, completed by the reader, consumed by the caller after the ready
/// signal fires.
#[derive(Debug, Default)]
struct Slot {
    output: String,
    exit_code: String,
    done: bool,
    ready: Option<oneshot::Sender<()>>,
}

/// Shared between the single reader task and the callers.  Only the reader
/// writes completed results; only callers register and take slots.
#[derive(Default)]
pub(crate) struct SlotTable {
    slots: Mutex<HashMap<u64, Slot>>,
}

impl SlotTable {
    /// Register a slot for `id`; the returned receiver resolves when the
    /// reader stores the result (or errors if the reader dies first).
    pub(crate) fn register(&self, id: u64) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().unwrap();
        slots.insert(id, Slot { ready: Some(tx), ..Slot::default() });
        rx
    }

    pub(crate) fn complete(&self, id: u64, output: String, exit_code: String) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&id) {
            slot.output = output;
            slot.exit_code = exit_code;
            slot.done = true;
            if let Some(tx) = slot.ready.take() {
                let _ = tx.send(());
            }
        } else {
            debug!(id, "framed result for unregistered slot dropped");
        }
    }

    /// Take a completed result.  `None` when the slot is missing or pending.
    pub(crate) fn take(&self, id: u64) -> Option<(String, String)> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get(&id) {
            Some(s) if s.done => {
                let s = slots.remove(&id).unwrap();
                Some((s.output, s.exit_code))
            }
            _ => None,
        }
    }

    /// Drop a slot without reading it (timeout path).
    pub(crate) fn remove(&self, id: u64) {
        self.slots.lock().unwrap().remove(&id);
    }

    /// Fail every outstanding slot by dropping its ready sender so waiters
    /// wake with a channel error instead of deadlocking.
    pub(crate) fn fail_all(&self) {
        self.slots.lock().unwrap().clear();
    }
}

// ─── Reader ───────────────────────────────────────────────────────────────────

/// Single reader over the shell's output pipe.  Parses the stream line by
/// line, accumulating between matching START/END markers into the slot table.
/// On exit for any reason, all outstanding slots are failed.
pub(crate) async fn reader_loop<R: AsyncRead + Unpin>(stream: R, slots: &SlotTable) {
    let mut lines = BufReader::new(stream).lines();
    let mut current: Option<(u64, String)> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                debug!("shell reader error: {e}");
                break;
            }
        };

        match current.as_mut() {
            None => {
                if let Some(id) = parse_start(&line) {
                    current = Some((id, String::new()));
                }
                // Outside a frame everything else is shell noise (prompts,
                // prelude echo) and is discarded.
            }
            Some((id, buf)) => match parse_end(&line) {
                Some((end_id, exit)) if end_id == *id => {
                    let done_id = *id;
                    let output = std::mem::take(buf);
                    slots.complete(done_id, output, exit);
                    current = None;
                }
                _ => {
                    buf.push_str(&line);
                    buf.push('\n');
                }
            },
        }
    }

    slots.fail_all();
    debug!("shell reader exited");
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
