// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

/// Result of one shell invocation.
///
/// `exit_code` is a string because the model-facing JSON carries it as one
/// and because the timeout sentinel ("124") and denial ("1") are synthetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Combined stdout + stderr.
    pub output: String,
    pub exit_code: String,
}

impl CommandResult {
    pub fn new(output: impl Into<String>, exit_code: impl Into<String>) -> Self {
        Self { output: output.into(), exit_code: exit_code.into() }
    }
}

/// Harness-level failures: the command never produced a framed result.
///
/// These are distinct from command failures (non-zero exit codes travel in
/// [`CommandResult`]) and from timeouts (exit code "124").  The tool
/// dispatcher reacts to a harness error with one `restart()` + retry.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("shell pipe I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("shell reader terminated while a command was pending")]
    ReaderGone,
    #[error("container setup failed: {0}")]
    Setup(String),
}

/// A shell that executes logically independent commands.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Run one command and wait for its framed result.
    async fn run(&self, command: &str) -> Result<CommandResult, HarnessError>;

    /// Tear down the attachment and fail all in-flight invocations.
    /// The underlying shell (container) survives; the next `run` re-attaches.
    async fn restart(&self);

    /// Shut down for good, releasing external resources.
    async fn close(&self);
}
