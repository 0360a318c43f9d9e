//! Subprocess-backed command runner.

use crate::error::RunnerError;
use crate::types::{CommandRunner, ExternalCommandResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs tools as child processes of the current process.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        limit: Duration,
    ) -> Result<ExternalCommandResult, RunnerError> {
        // Arguments can carry captcha tokens and codes, so only the count is logged.
        debug!(program = %program, argc = args.len(), "Spawning external tool");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => RunnerError::ToolNotFound(program.to_string()),
                _ => RunnerError::Io {
                    program: program.to_string(),
                    source: e,
                },
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RunnerError::Io {
                    program: program.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                warn!(program = %program, timeout = ?limit, "External tool timed out");
                return Err(RunnerError::Timeout {
                    program: program.to_string(),
                    timeout: limit,
                });
            }
        };

        let result = ExternalCommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            program = %program,
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "External tool finished"
        );

        Ok(result)
    }
}
