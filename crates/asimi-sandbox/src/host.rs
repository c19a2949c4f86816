// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Host shell runner: executes commands via the host's default shell, with a
//! regex policy deciding which commands belong here and which of those need
//! user approval first.

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    approval::{global_broker, ApprovalBroker},
    runner::{CommandResult, HarnessError, ShellRunner},
};

pub const DENIED_MESSAGE: &str = "Command execution denied by user";

/// Where a command should execute, per the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDecision {
    /// Matches `safe_run_on_host`: run on the host, no prompt.
    Safe,
    /// Matches `run_on_host`: run on the host after user approval.
    NeedsApproval,
    /// No match: not a host command, stays in the sandbox.
    NotHost,
}

/// Compiled host-command policy.  `safe_run_on_host` takes precedence over
/// `run_on_host` so a broad approval pattern cannot shadow a safe one.
#[derive(Debug, Default)]
pub struct HostPolicy {
    safe: Vec<Regex>,
    gated: Vec<Regex>,
}

impl HostPolicy {
    /// Compile the configured pattern lists.  Invalid regexes are skipped
    /// with a warning rather than failing startup.
    pub fn new(safe_patterns: &[String], gated_patterns: &[String]) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns
                .iter()
                .filter_map(|p| match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = %p, "invalid host-command pattern skipped: {e}");
                        None
                    }
                })
                .collect()
        };
        Self { safe: compile(safe_patterns), gated: compile(gated_patterns) }
    }

    pub fn decide(&self, command: &str) -> HostDecision {
        if self.safe.iter().any(|re| re.is_match(command)) {
            return HostDecision::Safe;
        }
        if self.gated.iter().any(|re| re.is_match(command)) {
            return HostDecision::NeedsApproval;
        }
        HostDecision::NotHost
    }
}

/// Runs commands via `bash -c` on Unix, `cmd /C` on Windows.
pub struct HostShellRunner {
    policy: HostPolicy,
    broker: &'static ApprovalBroker,
}

impl HostShellRunner {
    pub fn new(policy: HostPolicy) -> Self {
        Self { policy, broker: global_broker() }
    }

    #[cfg(test)]
    fn with_broker(policy: HostPolicy, broker: &'static ApprovalBroker) -> Self {
        Self { policy, broker }
    }

    pub fn decide(&self, command: &str) -> HostDecision {
        self.policy.decide(command)
    }

    /// Run on the host applying the approval gate for `NeedsApproval`
    /// commands.  Callers are expected to have checked `decide() != NotHost`.
    pub async fn run_gated(&self, command: &str) -> Result<CommandResult, HarnessError> {
        if self.policy.decide(command) == HostDecision::NeedsApproval
            && !self.broker.request(command).await
        {
            debug!(cmd = %command, "host command denied by user");
            return Ok(CommandResult::new(DENIED_MESSAGE, "1"));
        }
        self.run(command).await
    }
}

#[async_trait]
impl ShellRunner for HostShellRunner {
    /// Plain execution, no gating: used directly by the sandbox fallback.
    /// Stdout and stderr are concatenated, separated by a newline.
    async fn run(&self, command: &str) -> Result<CommandResult, HarnessError> {
        debug!(cmd = %command, "running on host");
        let output = if cfg!(windows) {
            Command::new("cmd").arg("/C").arg(command).output().await?
        } else {
            Command::new("bash").arg("-c").arg(command).output().await?
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.into_owned();
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let code = output.status.code().unwrap_or(-1).to_string();
        Ok(CommandResult::new(combined, code))
    }

    async fn restart(&self) {}

    async fn close(&self) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
