//! Line sources for the shell.

use super::command::COMMANDS;
use dialoguer::{BasicHistory, Completion, Input};
use std::collections::VecDeque;
use std::io::BufRead;

/// Prompt shown before each command.
pub const PROMPT: &str = "devrunner";

/// Distinct commands remembered for up/down recall.
const HISTORY_SIZE: usize = 200;

/// Something that yields shell input one line at a time.
pub trait LineReader {
    /// The next line, or `None` on EOF or interrupt.
    fn read_line(&mut self) -> Option<String>;
}

/// Completes the first word against command names and later words against
/// service names.
#[derive(Debug, Clone)]
pub struct NameCompletion {
    commands: Vec<String>,
    services: Vec<String>,
}

impl NameCompletion {
    pub fn new(services: Vec<String>) -> Self {
        Self {
            commands: COMMANDS.iter().map(|(name, _, _)| name.to_string()).collect(),
            services,
        }
    }
}

impl Completion for NameCompletion {
    fn get(&self, input: &str) -> Option<String> {
        match input.rsplit_once(' ') {
            None => {
                let word = input.to_lowercase();
                if word.is_empty() {
                    return None;
                }
                self.commands
                    .iter()
                    .find(|c| c.starts_with(&word))
                    .map(|c| format!("{} ", c))
            }
            Some((head, word)) => {
                let word_lower = word.to_lowercase();
                if word_lower.is_empty() {
                    return None;
                }
                let found = self
                    .services
                    .iter()
                    .find(|s| s.to_lowercase().starts_with(&word_lower))
                    .or_else(|| {
                        self.services
                            .iter()
                            .find(|s| s.to_lowercase().contains(&word_lower))
                    })?;
                Some(format!("{} {}", head, found))
            }
        }
    }
}

/// Interactive prompt with history and completion.
pub struct PromptReader {
    history: BasicHistory,
    completion: NameCompletion,
}

impl PromptReader {
    pub fn new(services: Vec<String>) -> Self {
        Self {
            history: BasicHistory::new()
                .max_entries(HISTORY_SIZE)
                .no_duplicates(true),
            completion: NameCompletion::new(services),
        }
    }
}

impl LineReader for PromptReader {
    fn read_line(&mut self) -> Option<String> {
        let result = Input::<String>::new()
            .with_prompt(PROMPT)
            .allow_empty(true)
            .history_with(&mut self.history)
            .completion_with(&self.completion)
            .interact_text();
        match result {
            Ok(line) => Some(line),
            Err(e) => {
                // Ctrl-C and Ctrl-D both end up here.
                tracing::debug!(error = %e, "prompt closed");
                None
            }
        }
    }
}

/// Plain line reader for a non-terminal stdin.
pub struct StdinReader;

impl LineReader for StdinReader {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        }
    }
}

/// Pre-recorded input, for tests and scripted sessions.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    lines: VecDeque<String>,
}

impl ScriptedReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Interactive prompt when stdin is a terminal, plain lines otherwise.
pub fn default_reader(services: Vec<String>) -> Box<dyn LineReader + Send> {
    if console::Term::stdout().is_term() && std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        Box::new(PromptReader::new(services))
    } else {
        Box::new(StdinReader)
    }
}
