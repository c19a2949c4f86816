// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Approval channel for host-escaping shell commands.
//!
//! The TUI registers a receiver at startup; the host runner then blocks each
//! gated command on a user decision.  When no channel is registered (one-shot
//! mode, tests that don't care) the answer is deny: never silently run a
//! command the user could not see.

use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// One pending approval: the command text and a one-shot responder.
#[derive(Debug)]
pub struct ApprovalRequest {
    pub command: String,
    pub respond: oneshot::Sender<bool>,
}

/// Broker between the host runner and whichever UI answers requests.
#[derive(Default)]
pub struct ApprovalBroker {
    tx: Mutex<Option<mpsc::Sender<ApprovalRequest>>>,
}

impl ApprovalBroker {
    pub const fn new() -> Self {
        Self { tx: Mutex::new(None) }
    }

    /// Register the consumer side.  Replaces any previous registration.
    pub fn register(&self, tx: mpsc::Sender<ApprovalRequest>) {
        *self.tx.lock().unwrap() = Some(tx);
    }

    /// Ask for approval and block until the UI answers.  Deny when no
    /// consumer is registered or the consumer went away.
    pub async fn request(&self, command: &str) -> bool {
        let sender = self.tx.lock().unwrap().clone();
        let Some(sender) = sender else {
            warn!("approval requested with no registered channel; denying");
            return false;
        };
        let (respond, answer) = oneshot::channel();
        if sender
            .send(ApprovalRequest { command: command.to_string(), respond })
            .await
            .is_err()
        {
            warn!("approval channel closed; denying");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

/// The process-global broker the TUI registers against.
pub fn global_broker() -> &'static ApprovalBroker {
    static BROKER: ApprovalBroker = ApprovalBroker::new();
    &BROKER
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
