//! Interactive command shell.
//!
//! The shell is a small state machine driven by one blocking reader:
//!
//! ```text
//! WaitingForInput -> Parsing -> Dispatching -> WaitingForInput
//!        |                          |
//!        +--------(EOF)-------------+--(quit)--> Terminating
//! ```
//!
//! Reading happens on a blocking thread; each dispatched command is driven to
//! completion on the runtime before the next prompt. Terminating always runs a
//! full supervisor shutdown before the shell returns.

mod command;
mod input;
mod render;

pub use command::{COMMANDS, Command, DEFAULT_LOG_LINES, parse};
pub use input::{
    LineReader, NameCompletion, PROMPT, PromptReader, ScriptedReader, StdinReader, default_reader,
};
pub use render::{
    branch_table, format_uptime, help_lines, report_lines, shutdown_lines, startup_lines,
    status_table,
};

use crate::errors::SelectorError;
use crate::router::Console;
use crate::supervisor::{ActionReport, ShutdownReport, Supervisor};
use std::sync::Arc;
use tokio::runtime::Handle;

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Shell loop states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellState {
    WaitingForInput,
    Parsing(String),
    Dispatching(Command),
    Terminating,
}

/// Front end over the supervisor and the log router.
pub struct Shell {
    supervisor: Arc<Supervisor>,
    console: Arc<Console>,
}

impl Shell {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        let console = Arc::clone(supervisor.router().console());
        Self {
            supervisor,
            console,
        }
    }

    fn print(&self, lines: Vec<String>) {
        self.console.write_lines(&lines);
    }

    /// Print the start-up summary, with a log recap for each service that
    /// did not come up.
    pub fn print_startup(&self, report: &ActionReport) {
        self.print(startup_lines(report));
        let router = self.supervisor.router();
        for name in report.failed() {
            let recent = router.recent(DEFAULT_LOG_LINES, &[name.to_string()]);
            if recent.is_empty() {
                continue;
            }
            self.console.write_line(&format!("Last lines from {}:", name));
            for line in &recent {
                self.print(router.formatter().format(line));
            }
        }
    }

    /// Run one command.
    pub async fn execute(&self, command: Command) -> Flow {
        tracing::info!(?command, "shell command");
        let sup = &self.supervisor;
        match command {
            Command::Empty => {}
            Command::Help => self.print(help_lines()),
            Command::Status => {
                let filter = sup.router().filter();
                self.print(status_table(&sup.status(), &filter));
            }
            Command::Branch => {
                sup.refresh_branches().await;
                self.print(branch_table(&sup.status(), chrono::Local::now()));
            }
            Command::Restart(tokens) => self.report(sup.restart(&tokens).await),
            Command::Rebuild(tokens) => self.report(sup.rebuild(&tokens).await),
            Command::Frontend(tokens) => self.report(sup.frontend(&tokens).await),
            Command::Kill(tokens) => self.report(sup.kill(&tokens).await),
            Command::Filter(tokens) => self.filter(&tokens),
            Command::Logs { count, selector } => self.logs(count, &selector),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn report(&self, result: Result<ActionReport, SelectorError>) {
        match result {
            Ok(report) => self.print(report_lines(&report)),
            Err(e) => self.console.write_line(&e.to_string()),
        }
    }

    fn filter(&self, tokens: &[String]) {
        let router = self.supervisor.router();
        if tokens.is_empty() {
            router.set_filter(Vec::new());
            self.console
                .write_line("Showing logs from all services.");
            return;
        }
        match self.supervisor.select(tokens) {
            Ok(selection) => {
                let names = self.supervisor.names();
                let chosen: Vec<String> = selection
                    .indices
                    .iter()
                    .filter_map(|&i| names.get(i).cloned())
                    .collect();
                let mut lines = vec![format!(
                    "Only showing logs from: {}",
                    chosen.join(" ")
                )];
                if !selection.unmatched.is_empty() {
                    lines.push(format!(
                        "No service matches {}",
                        selection.unmatched.join(", ")
                    ));
                }
                router.set_filter(chosen);
                self.print(lines);
            }
            Err(e) => self.console.write_line(&e.to_string()),
        }
    }

    fn logs(&self, count: usize, selector: &[String]) {
        let names = if selector.is_empty() {
            Vec::new()
        } else {
            match self.supervisor.select(selector) {
                Ok(selection) => {
                    let all = self.supervisor.names();
                    selection
                        .indices
                        .iter()
                        .filter_map(|&i| all.get(i).cloned())
                        .collect()
                }
                Err(e) => {
                    self.console.write_line(&e.to_string());
                    return;
                }
            }
        };
        let router = self.supervisor.router();
        let lines = router.recent(count, &names);
        if lines.is_empty() {
            self.console.write_line("No log lines yet.");
            return;
        }
        for line in &lines {
            self.print(router.formatter().format(line));
        }
    }

    /// Drive the state machine on the current (blocking) thread until quit or
    /// EOF, then shut everything down.
    pub fn run_blocking(&self, reader: &mut dyn LineReader, rt: &Handle) -> ShutdownReport {
        let mut state = ShellState::WaitingForInput;
        loop {
            state = match state {
                ShellState::WaitingForInput => match reader.read_line() {
                    Some(line) => ShellState::Parsing(line),
                    None => ShellState::Terminating,
                },
                ShellState::Parsing(line) => match parse(&line) {
                    Ok(Command::Empty) => ShellState::WaitingForInput,
                    Ok(command) => ShellState::Dispatching(command),
                    Err(e) => {
                        self.console.write_line(&e.to_string());
                        ShellState::WaitingForInput
                    }
                },
                ShellState::Dispatching(command) => match rt.block_on(self.execute(command)) {
                    Flow::Continue => ShellState::WaitingForInput,
                    Flow::Quit => ShellState::Terminating,
                },
                ShellState::Terminating => break,
            };
        }

        self.console.write_line("Shutting down...");
        let report = rt.block_on(self.supervisor.shutdown());
        self.print(shutdown_lines(&report));
        report
    }

    /// Run the shell on the blocking pool.
    pub async fn run(self, mut reader: Box<dyn LineReader + Send>) -> ShutdownReport {
        let rt = Handle::current();
        let supervisor = Arc::clone(&self.supervisor);
        match tokio::task::spawn_blocking(move || self.run_blocking(reader.as_mut(), &rt)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "shell thread failed");
                supervisor.shutdown().await
            }
        }
    }
}
