// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `:` command registry and its prefix-resolution rules.

/// What a resolved command asks the app to do.  The handler proper lives in
/// the app's dispatch, which has access to every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Help,
    New,
    Quit,
    Context,
    ClearHistory,
    Resume,
    Login,
    Models,
    Export,
    Init,
    Compact,
    Vi,
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Canonical name, stored without the `:` prefix.
    pub name: &'static str,
    pub description: &'static str,
    pub action: CommandAction,
}

/// Result of resolving user input against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLookup {
    Single(CommandSpec),
    /// Two or more names share the prefix; listed for the ambiguity message.
    Ambiguous(Vec<&'static str>),
    NotFound,
}

impl PartialEq for CommandSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for CommandSpec {}

pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    pub fn with_builtins() -> Self {
        use CommandAction::*;
        let commands = vec![
            CommandSpec { name: "help", description: "Show help, optionally for a topic", action: Help },
            CommandSpec { name: "new", description: "Start a new session", action: New },
            CommandSpec { name: "quit", description: "Exit asimi", action: Quit },
            CommandSpec { name: "context", description: "List loaded context files", action: Context },
            CommandSpec { name: "clear-history", description: "Clear prompt history for this branch", action: ClearHistory },
            CommandSpec { name: "resume", description: "Pick an earlier session to continue", action: Resume },
            CommandSpec { name: "login", description: "Show provider credential setup", action: Login },
            CommandSpec { name: "models", description: "List models for the active provider", action: Models },
            CommandSpec { name: "export", description: "Export the transcript (full|conversation)", action: Export },
            CommandSpec { name: "init", description: "Write a starter config (init clear overwrites)", action: Init },
            CommandSpec { name: "compact", description: "Compact the conversation history", action: Compact },
            CommandSpec { name: "vi", description: "Toggle modal (vi) editing", action: Vi },
        ];
        Self { commands }
    }

    /// Resolve `input` to a command.
    ///
    /// A leading `:` is stripped; an exact name match wins outright;
    /// otherwise a unique prefix resolves, several matches report ambiguity,
    /// none reports not-found.
    pub fn find(&self, input: &str) -> CommandLookup {
        let name = input.strip_prefix(':').unwrap_or(input).trim();
        if name.is_empty() {
            return CommandLookup::NotFound;
        }
        if let Some(cmd) = self.commands.iter().find(|c| c.name == name) {
            return CommandLookup::Single(cmd.clone());
        }
        let matches: Vec<&CommandSpec> = self
            .commands
            .iter()
            .filter(|c| c.name.starts_with(name))
            .collect();
        match matches.len() {
            0 => CommandLookup::NotFound,
            1 => CommandLookup::Single(matches[0].clone()),
            _ => {
                let mut names: Vec<&'static str> = matches.iter().map(|c| c.name).collect();
                names.sort_unstable();
                CommandLookup::Ambiguous(names)
            }
        }
    }

    /// Candidate names for the completion popup, filtered by prefix.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.strip_prefix(':').unwrap_or(prefix);
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|c| c.name.starts_with(prefix))
            .map(|c| c.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }
}

/// Split command input into `(command, args)`.
pub fn split_input(input: &str) -> (&str, &str) {
    let input = input.strip_prefix(':').unwrap_or(input).trim();
    match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let reg = CommandRegistry::with_builtins();
        match reg.find("quit") {
            CommandLookup::Single(c) => assert_eq!(c.action, CommandAction::Quit),
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn leading_colon_is_stripped() {
        let reg = CommandRegistry::with_builtins();
        assert!(matches!(reg.find(":quit"), CommandLookup::Single(_)));
    }

    #[test]
    fn unique_prefix_resolves() {
        let reg = CommandRegistry::with_builtins();
        match reg.find("q") {
            CommandLookup::Single(c) => assert_eq!(c.name, "quit"),
            other => panic!("expected quit, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_prefix_lists_candidates() {
        let reg = CommandRegistry::with_builtins();
        match reg.find("c") {
            CommandLookup::Ambiguous(names) => {
                assert!(names.contains(&"compact"));
                assert!(names.contains(&"context"));
                assert!(names.contains(&"clear-history"));
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn unknown_input_is_not_found() {
        let reg = CommandRegistry::with_builtins();
        assert_eq!(reg.find("zzz"), CommandLookup::NotFound);
        assert_eq!(reg.find(""), CommandLookup::NotFound);
        assert_eq!(reg.find(":"), CommandLookup::NotFound);
    }

    #[test]
    fn prefix_shared_with_exact_name_still_resolves_exactly() {
        // "context" is a prefix of nothing else, but "c" is shared; an exact
        // name must never be reported ambiguous.
        let reg = CommandRegistry::with_builtins();
        assert!(matches!(reg.find("context"), CommandLookup::Single(_)));
    }

    #[test]
    fn completions_filter_by_prefix_sorted() {
        let reg = CommandRegistry::with_builtins();
        let c = reg.completions("c");
        assert_eq!(c, vec!["clear-history", "compact", "context"]);
        assert!(reg.completions("").len() >= 12);
    }

    #[test]
    fn split_input_separates_args() {
        assert_eq!(split_input(":export full"), ("export", "full"));
        assert_eq!(split_input("help"), ("help", ""));
        assert_eq!(split_input(":init clear"), ("init", "clear"));
    }
}
