//! Child process control.
//!
//! Every service command runs as `sh -c <command>` in its own process group so
//! that a stop reaches everything the command forked. Output is read line by
//! line and forwarded to the log router as [`LogLine`](crate::router::LogLine)s.

mod env;
mod handle;
pub mod signal;

pub use env::ChildEnv;
pub use handle::{ProcessHandle, ProcessState, StopOutcome, run_to_completion};
