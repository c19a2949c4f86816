// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Configuration for asimi: TOML schema, file discovery, and `ASIMI_*`
//! environment overrides.

mod init;
mod loader;
mod schema;

pub use init::{update_value, write_starter_config};
pub use loader::{config_search_paths, load, load_from};
pub use schema::{
    Config, ContainerConfig, HistoryConfig, LlmConfig, Mount, RunInShellConfig, SessionConfig,
};
