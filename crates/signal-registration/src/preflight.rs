//! Checks run before a flow starts.

use crate::classify::runner_failure;
use crate::error::FlowError;
use crate::types::{FailureReason, FlowOutcome, PhoneNumber};
use signal_client::{RunnerError, SignalCli};
use tracing::{debug, info, warn};

/// Marker `listDevices` prints for every device of a known account.
const DEVICE_MARKER: &str = "Device";

/// Confirm signal-cli can be run and return its version line.
///
/// Only a missing binary is fatal; a version probe that fails for any other
/// reason is logged and the flow goes ahead.
pub async fn check_signal_cli(cli: &SignalCli) -> Result<Option<String>, FlowError> {
    match cli.version().await {
        Ok(result) if result.success() => {
            let version = result.stdout.trim().to_string();
            info!(version = %version, "Found signal-cli");
            Ok(Some(version))
        }
        Ok(result) => {
            warn!(
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "signal-cli --version failed"
            );
            Ok(None)
        }
        Err(RunnerError::ToolNotFound(program)) => Err(FlowError::ToolNotFound(program)),
        Err(e) => {
            warn!(error = %e, "Could not determine signal-cli version");
            Ok(None)
        }
    }
}

/// Check that signal-cli holds a registered account for `phone`.
///
/// Returns `Success`, or `Failed(NotRegistered)` when the account is
/// unknown.
pub async fn check_account_registered(
    cli: &SignalCli,
    phone: &PhoneNumber,
) -> Result<FlowOutcome, FlowError> {
    let result = match cli.list_devices(phone.as_str()).await {
        Ok(result) => result,
        Err(e) => return Ok(FlowOutcome::Failed(runner_failure(e)?)),
    };

    if result.success() && result.stdout.contains(DEVICE_MARKER) {
        debug!(phone_number = %phone, "Account is registered");
        Ok(FlowOutcome::Success)
    } else {
        warn!(
            phone_number = %phone,
            exit_code = result.exit_code,
            "Account is not registered in signal-cli"
        );
        Ok(FlowOutcome::Failed(FailureReason::NotRegistered))
    }
}
