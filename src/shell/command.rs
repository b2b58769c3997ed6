//! Shell command grammar.
//!
//! The first word picks the command (case-insensitive); the remaining words are
//! selector tokens.

use crate::errors::ShellError;

/// Lines shown by `logs` when no count is given.
pub const DEFAULT_LOG_LINES: usize = 20;

/// Command names, aliases and help text, in help order.
pub const COMMANDS: &[(&str, &[&str], &str)] = &[
    ("help", &["h"], "List commands"),
    ("status", &["s"], "Show the status of every service"),
    ("branch", &["b", "branches"], "Show the checked-out branch of every service"),
    (
        "restart",
        &["r"],
        "Restart services (default: every FAILED or STOPPED service)",
    ),
    (
        "rebuild",
        &["rb", "remake"],
        "Run rebuild_command, then restart (default: every FAILED or STOPPED service)",
    ),
    ("filter", &["f"], "Only show logs from these services (no names: show all)"),
    ("frontend", &["fe"], "Run the frontend build for frontend services, no restart"),
    ("kill", &["k"], "Stop services (no names: stop everything)"),
    ("logs", &["l"], "Print recent lines: logs [N] [services]"),
    ("quit", &["q"], "Stop every service and exit"),
];

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Branch,
    Restart(Vec<String>),
    Rebuild(Vec<String>),
    Filter(Vec<String>),
    Frontend(Vec<String>),
    Kill(Vec<String>),
    Logs { count: usize, selector: Vec<String> },
    Quit,
    /// A blank line.
    Empty,
}

/// Parse one line of input.
pub fn parse(line: &str) -> Result<Command, ShellError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Empty);
    };
    let args: Vec<String> = words.map(str::to_string).collect();

    let command = match canonical_name(verb) {
        Some("help") => Command::Help,
        Some("status") => Command::Status,
        Some("branch") => Command::Branch,
        Some("restart") => Command::Restart(args),
        Some("rebuild") => Command::Rebuild(args),
        Some("filter") => Command::Filter(args),
        Some("frontend") => Command::Frontend(args),
        Some("kill") => Command::Kill(args),
        Some("logs") => parse_logs(args),
        Some("quit") => Command::Quit,
        _ => return Err(ShellError::UnknownCommand(verb.to_string())),
    };
    Ok(command)
}

/// Map a verb or alias to its command name.
pub fn canonical_name(verb: &str) -> Option<&'static str> {
    let verb = verb.to_lowercase();
    COMMANDS
        .iter()
        .find(|(name, aliases, _)| *name == verb || aliases.contains(&verb.as_str()))
        .map(|(name, _, _)| *name)
}

fn parse_logs(mut args: Vec<String>) -> Command {
    let count = match args.first().and_then(|a| a.parse::<usize>().ok()) {
        Some(n) => {
            args.remove(0);
            n
        }
        None => DEFAULT_LOG_LINES,
    };
    Command::Logs {
        count,
        selector: args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(w: &[&str]) -> Vec<String> {
        w.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(parse("h").unwrap(), Command::Help);
        assert_eq!(parse("s").unwrap(), Command::Status);
        assert_eq!(parse("branches").unwrap(), Command::Branch);
        assert_eq!(parse("b").unwrap(), Command::Branch);
        assert_eq!(parse("q").unwrap(), Command::Quit);
        assert_eq!(parse("remake").unwrap(), Command::Rebuild(vec![]));
        assert_eq!(parse("rb api").unwrap(), Command::Rebuild(words(&["api"])));
        assert_eq!(parse("fe buyer").unwrap(), Command::Frontend(words(&["buyer"])));
    }

    #[test]
    fn test_verb_is_case_insensitive() {
        assert_eq!(
            parse("RESTART Buyer api").unwrap(),
            Command::Restart(words(&["Buyer", "api"]))
        );
        assert_eq!(parse("  Kill  ").unwrap(), Command::Kill(vec![]));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(
            parse("launch api"),
            Err(ShellError::UnknownCommand("launch".to_string()))
        );
    }

    #[test]
    fn test_logs_count_and_selector() {
        assert_eq!(
            parse("logs").unwrap(),
            Command::Logs {
                count: DEFAULT_LOG_LINES,
                selector: vec![]
            }
        );
        assert_eq!(
            parse("l 50 api").unwrap(),
            Command::Logs {
                count: 50,
                selector: words(&["api"])
            }
        );
        assert_eq!(
            parse("logs api").unwrap(),
            Command::Logs {
                count: DEFAULT_LOG_LINES,
                selector: words(&["api"])
            }
        );
    }

    #[test]
    fn test_every_name_and_alias_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for (name, aliases, _) in COMMANDS {
            assert!(seen.insert(*name));
            for alias in *aliases {
                assert!(seen.insert(*alias), "duplicate alias {alias}");
            }
        }
    }
}
