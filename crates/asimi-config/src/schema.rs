// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be enabled unless the user
/// explicitly turns them off need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub run_in_shell: RunInShellConfig,
    #[serde(default)]
    pub container: ContainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider identifier: "anthropic" | "openai" | "gemini" | "ollama" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub model: String,
    /// Maximum tokens to request in a single completion
    pub max_output_tokens: u32,
    /// Maximum model↔tool iterations per user turn
    pub max_turns: u32,
    /// Start the prompt editor in modal (vi) mode
    pub vi_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: "claude-sonnet-4-5".into(),
            max_output_tokens: 8192,
            max_turns: 25,
            vi_mode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rows beyond this count are pruned at startup (per log).
    pub max_sessions: u32,
    /// Rows older than this are pruned at startup.
    pub max_age_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sessions: 1000,
            max_age_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Persist the conversation after every mutation (vs. only on `:new`/quit).
    #[serde(default = "default_true")]
    pub auto_save: bool,
    /// Maximum sessions shown by `:resume`.
    pub list_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_save: true,
            list_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInShellConfig {
    /// Regexes of commands that must run on the host, after user approval.
    /// Example: `["^gh "]` for commands that need host credentials.
    #[serde(default)]
    pub run_on_host: Vec<String>,
    /// Regexes of commands that run on the host without prompting.
    #[serde(default)]
    pub safe_run_on_host: Vec<String>,
    /// Per-invocation timeout for sandboxed commands.
    pub timeout_minutes: u64,
    /// Fall back to the host runner when the container cannot be started.
    #[serde(default)]
    pub allow_host_fallback: bool,
    /// Leave the container behind on exit (debugging aid).
    #[serde(default)]
    pub no_cleanup: bool,
}

impl Default for RunInShellConfig {
    fn default() -> Self {
        Self {
            run_on_host: Vec::new(),
            safe_run_on_host: vec![r"^gh\s+(issue|pr)\s+(view|list)\b".into()],
            timeout_minutes: 10,
            allow_host_fallback: false,
            no_cleanup: false,
        }
    }
}

/// One extra bind mount for the sandbox container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image used for the sandbox shell.
    pub image_name: String,
    /// Bind mounts in addition to the project root.
    #[serde(default)]
    pub additional_mounts: Vec<Mount>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image_name: "docker.io/library/ubuntu:24.04".into(),
            additional_mounts: Vec::new(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert!(cfg.llm.vi_mode);
        assert_eq!(cfg.run_in_shell.timeout_minutes, 10);
        assert!(cfg.history.enabled);
        assert!(cfg.session.auto_save);
    }

    #[test]
    fn empty_toml_deserialises_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.max_turns, 25);
        assert!(cfg.run_in_shell.run_on_host.is_empty());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: Config = toml::from_str("[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o\"\nmax_output_tokens = 1024\nmax_turns = 5\nvi_mode = false\n").unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.max_turns, 5);
        // Untouched sections fall back to defaults.
        assert_eq!(cfg.container.image_name, "docker.io/library/ubuntu:24.04");
    }

    #[test]
    fn additional_mounts_parse() {
        let cfg: Config = toml::from_str(
            "[container]\nimage_name = \"img\"\n\n[[container.additional_mounts]]\nsource = \"/a\"\ndestination = \"/b\"\n",
        )
        .unwrap();
        assert_eq!(
            cfg.container.additional_mounts,
            vec![Mount { source: "/a".into(), destination: "/b".into() }]
        );
    }

    #[test]
    fn safe_run_on_host_default_covers_gh_readonly() {
        let cfg = Config::default();
        assert!(cfg.run_in_shell.safe_run_on_host[0].contains("gh"));
    }
}
