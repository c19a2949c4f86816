// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The fixed built-in tool set.

mod list_files;
mod read_file;
mod read_many_files;
mod replace_text;
mod run_in_shell;
mod write_file;

use std::path::PathBuf;
use std::sync::Arc;

use asimi_sandbox::{HostShellRunner, ShellRunner};

pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use read_many_files::ReadManyFilesTool;
pub use replace_text::ReplaceTextTool;
pub use run_in_shell::RunInShellTool;
pub use write_file::WriteFileTool;

use crate::ToolRegistry;

/// Build the registry with every built-in tool, rooted at the project
/// directory and wired to the given shell runners.
pub fn default_registry(
    root: PathBuf,
    sandbox: Arc<dyn ShellRunner>,
    host: Arc<HostShellRunner>,
) -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(ReadFileTool { root: root.clone() });
    reg.register(WriteFileTool { root: root.clone() });
    reg.register(ListFilesTool { root: root.clone() });
    reg.register(ReplaceTextTool { root: root.clone() });
    reg.register(ReadManyFilesTool { root });
    reg.register(RunInShellTool { sandbox, host });
    reg
}
