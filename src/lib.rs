//! devrunner: run a set of local development services from one terminal.
//!
//! A [`supervisor::Supervisor`] launches services in dependency order and
//! watches their processes, a [`router::LogRouter`] multiplexes their output to
//! the terminal and to log files, and a [`shell::Shell`] drives both from an
//! interactive prompt.

#[cfg(not(unix))]
compile_error!("devrunner relies on Unix process groups and signals");

pub mod config;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod process;
pub mod registry;
pub mod router;
pub mod selector;
pub mod shell;
pub mod supervisor;
pub mod ui;
