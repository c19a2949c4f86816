// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The tool layer: a fixed set of side-effecting capabilities the model can
//! invoke, each with a JSON schema, a path-guarded implementation, and a
//! two-line chat rendering of its own result.

pub mod builtin;
mod guard;
mod registry;
mod tool;

pub use builtin::default_registry;
pub use guard::{validate, GuardError};
pub use registry::ToolRegistry;
pub use tool::{arg_str, arg_usize, format_lines, Tool, ToolCall, ToolOutput};
