//! signal-cli adapter.
//!
//! Builds argument vectors for the signal-cli sub-commands used during
//! registration and device linking, and runs them through a
//! [`tool_runner::CommandRunner`].

mod client;
mod types;

pub use client::SignalCli;
pub use tool_runner::{CommandRunner, ExternalCommandResult, RunnerError};
pub use types::*;
