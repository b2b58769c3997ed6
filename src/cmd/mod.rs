//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `config` | `Config`         |
//! | `graph`  | `Graph`          |

pub mod config;
pub mod graph;
pub mod run;

pub use config::cmd_config;
pub use graph::cmd_graph;
pub use run::cmd_run;

/// Clean quit, every child exited after the graceful signal.
pub const EXIT_OK: u8 = 0;
/// Fatal error before or during the run.
pub const EXIT_FAILURE: u8 = 1;
/// Quit completed, but at least one child needed a forced kill.
pub const EXIT_FORCED: u8 = 2;
/// Interrupted by SIGINT.
pub const EXIT_INTERRUPTED: u8 = 130;
