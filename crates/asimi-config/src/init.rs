// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `:init` support: write a commented starter config and update single
//! values in place without disturbing the comments around them.

use std::path::Path;

use anyhow::Context;

const STARTER: &str = r#"# asimi configuration
# Values can be overridden per key with ASIMI_<SECTION>_<KEY> env vars.

[llm]
provider = "anthropic"
model = "claude-sonnet-4-5"
max_output_tokens = 8192
max_turns = 25
vi_mode = true

[history]
enabled = true
max_sessions = 1000
max_age_days = 90

[session]
enabled = true
auto_save = true
list_limit = 20

[run_in_shell]
# Commands matching run_on_host run on the host after user approval;
# safe_run_on_host patterns run on the host without prompting.
run_on_host = []
safe_run_on_host = ["^gh\\s+(issue|pr)\\s+(view|list)\\b"]
timeout_minutes = 10
allow_host_fallback = false
no_cleanup = false

[container]
image_name = "docker.io/library/ubuntu:24.04"
# additional_mounts = [{ source = "/data", destination = "/data" }]
"#;

/// Write the starter config to `path`.  Refuses to overwrite an existing
/// file unless `clear` is set.  Parent directories are created.
pub fn write_starter_config(path: &Path, clear: bool) -> anyhow::Result<()> {
    if path.exists() && !clear {
        anyhow::bail!(
            "{} already exists (use `init clear` to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, STARTER).with_context(|| format!("writing {}", path.display()))
}

/// Replace the value of `key` inside `[section]` of an existing config file,
/// leaving every other line, comments and inline comments included, as it
/// was.  The key must already be present; a missing key is an error rather
/// than an append, so the file's structure stays under the user's control.
pub fn update_value(path: &Path, section: &str, key: &str, new_value: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let updated = update_value_in(&text, section, key, new_value)
        .with_context(|| format!("no key `{key}` in [{section}] of {}", path.display()))?;
    std::fs::write(path, updated).with_context(|| format!("writing {}", path.display()))
}

fn update_value_in(text: &str, section: &str, key: &str, new_value: &str) -> Option<String> {
    let header = format!("[{section}]");
    let mut in_section = false;
    let mut replaced = false;
    let mut out: Vec<String> = Vec::with_capacity(text.lines().count());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_section = trimmed == header;
            out.push(line.to_string());
            continue;
        }
        if in_section && !replaced {
            if let Some(eq) = line.find('=') {
                let lhs = &line[..eq];
                if lhs.trim() == key {
                    // Keep the left-hand side and any inline comment verbatim.
                    let rhs = &line[eq + 1..];
                    let comment = rhs.find('#').map(|i| rhs[i..].to_string());
                    let mut new_line = format!("{lhs}= {new_value}");
                    if let Some(c) = comment {
                        new_line.push(' ');
                        new_line.push_str(&c);
                    }
                    out.push(new_line);
                    replaced = true;
                    continue;
                }
            }
        }
        out.push(line.to_string());
    }

    if !replaced {
        return None;
    }
    let mut result = out.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    Some(result)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# top comment\n[llm]\n# which model to use\nmodel = \"a\" # inline\nprovider = \"x\"\n\n[session]\nmodel = \"unrelated\"\n";

    #[test]
    fn update_preserves_comments() {
        let out = update_value_in(SAMPLE, "llm", "model", "\"b\"").unwrap();
        assert!(out.contains("# top comment"));
        assert!(out.contains("# which model to use"));
        assert!(out.contains("model = \"b\" # inline"));
        // The same key in another section is untouched.
        assert!(out.contains("model = \"unrelated\""));
    }

    #[test]
    fn update_missing_key_returns_none() {
        assert!(update_value_in(SAMPLE, "llm", "nope", "1").is_none());
        assert!(update_value_in(SAMPLE, "container", "model", "1").is_none());
    }

    #[test]
    fn starter_config_round_trips_through_schema() {
        let cfg: crate::Config = toml::from_str(STARTER).unwrap();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.run_in_shell.timeout_minutes, 10);
    }

    #[test]
    fn write_refuses_existing_without_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asimi.conf");
        write_starter_config(&path, false).unwrap();
        assert!(write_starter_config(&path, false).is_err());
        write_starter_config(&path, true).unwrap();
    }

    #[test]
    fn update_value_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asimi.conf");
        write_starter_config(&path, false).unwrap();
        update_value(&path, "llm", "max_turns", "50").unwrap();
        let cfg = crate::load_from(&path).unwrap();
        assert_eq!(cfg.llm.max_turns, 50);
        // Comments survived the edit.
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# asimi configuration"));
    }
}
