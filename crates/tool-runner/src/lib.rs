//! External tool execution.
//!
//! Spawns a command-line tool, waits for it under a timeout and hands back
//! the exit code together with stdout and stderr captured separately.
//! Interpreting the result is left to the caller.

mod error;
mod runner;
mod types;

pub use error::RunnerError;
pub use runner::ProcessRunner;
pub use types::*;
