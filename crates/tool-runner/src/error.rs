//! Tool runner errors.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while invoking an external tool.
///
/// A tool that runs and exits non-zero is not an error at this level.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The binary could not be found on the execution path.
    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    /// The tool did not exit within the allotted time and was killed.
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    /// Spawning or waiting on the process failed for another reason.
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    /// Name of the program the error refers to.
    pub fn program(&self) -> &str {
        match self {
            RunnerError::ToolNotFound(program) => program,
            RunnerError::Timeout { program, .. } => program,
            RunnerError::Io { program, .. } => program,
        }
    }
}
