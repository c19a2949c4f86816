// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Section names recognised for `ASIMI_*` environment overrides.
/// Longest-prefix order so `run_in_shell` wins over a hypothetical `run`.
const SECTIONS: &[&str] = &["run_in_shell", "container", "history", "session", "llm"];

/// Ordered list of config file locations; the **first existing** file wins
/// (no layering: a project-local config fully replaces the user one).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".agents/asimi.conf")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/asimi/asimi.conf"));
    }
    paths
}

/// Load configuration from the first existing search path, then apply
/// `ASIMI_*` environment overrides.  Missing files yield the defaults.
pub fn load() -> anyhow::Result<Config> {
    for path in config_search_paths() {
        if path.is_file() {
            return load_from(&path);
        }
    }
    let mut value = toml::Value::Table(toml::map::Map::new());
    apply_env_overrides(&mut value);
    Ok(value.try_into().unwrap_or_default())
}

/// Load configuration from an explicit path, then apply env overrides.
pub fn load_from(path: &Path) -> anyhow::Result<Config> {
    debug!(path = %path.display(), "loading config");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut value: toml::Value = text
        .parse()
        .with_context(|| format!("parsing {}", path.display()))?;
    apply_env_overrides(&mut value);
    let config: Config = value
        .try_into()
        .with_context(|| format!("deserialising {}", path.display()))?;
    Ok(config)
}

/// Apply `ASIMI_<SECTION>_<KEY>` environment variables onto a TOML value.
///
/// Dots in the config path become underscores: `run_in_shell.timeout_minutes`
/// is overridden by `ASIMI_RUN_IN_SHELL_TIMEOUT_MINUTES`.  Section names are
/// matched by prefix against the known section list, so keys may themselves
/// contain underscores.
fn apply_env_overrides(value: &mut toml::Value) {
    for (name, raw) in std::env::vars() {
        let Some(rest) = name.strip_prefix("ASIMI_") else {
            continue;
        };
        let rest = rest.to_ascii_lowercase();
        let Some((section, key)) = SECTIONS.iter().find_map(|s| {
            rest.strip_prefix(&format!("{s}_")).map(|k| (*s, k))
        }) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let table = value
            .as_table_mut()
            .expect("config root is always a table");
        let section_val = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        if let Some(section_table) = section_val.as_table_mut() {
            debug!(section, key, "applying env override");
            section_table.insert(key.to_string(), parse_env_value(&raw));
        }
    }
}

/// Parse an environment override into a TOML value.
///
/// Tries TOML literal syntax first so booleans, integers and arrays all work
/// (`ASIMI_RUN_IN_SHELL_RUN_ON_HOST='["^gh "]'`); a bare word falls back to
/// a plain string.
fn parse_env_value(raw: &str) -> toml::Value {
    if let Ok(parsed) = format!("v = {raw}").parse::<toml::Value>() {
        if let Some(v) = parsed.get("v") {
            return v.clone();
        }
    }
    toml::Value::String(raw.to_string())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
