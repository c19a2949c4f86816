// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shell execution for the `run_in_shell` tool.
//!
//! The primary runner keeps one interactive bash alive inside a long-lived,
//! project-mounted container and frames each logical invocation with sentinel
//! lines so many independent commands share one shell without their output
//! interleaving.  A host runner handles commands that must escape the
//! sandbox, gated by configured regex policies and a user approval channel.

mod approval;
mod frame;
mod host;
mod podman;
mod runner;

pub use approval::{global_broker, ApprovalBroker, ApprovalRequest};
pub use host::{HostDecision, HostPolicy, HostShellRunner};
pub use podman::PodmanShellRunner;
pub use runner::{CommandResult, HarnessError, ShellRunner};

/// Exit code reserved for the per-invocation timeout.
pub const TIMEOUT_EXIT_CODE: &str = "124";
