//! Maps raw signal-cli output to a [`FlowOutcome`].
//!
//! signal-cli reports everything through its exit code and free text, so
//! the matching rules are tied to its current wording. They live here,
//! apart from the flows, and can be swapped for any
//! `Fn(&ExternalCommandResult) -> FlowOutcome`.

use crate::error::FlowError;
use crate::types::{FailureReason, FlowOutcome};
use tool_runner::{ExternalCommandResult, RunnerError};

/// Turns an external invocation result into a flow outcome.
pub trait OutputClassifier: Send + Sync {
    fn classify(&self, result: &ExternalCommandResult) -> FlowOutcome;
}

impl<F> OutputClassifier for F
where
    F: Fn(&ExternalCommandResult) -> FlowOutcome + Send + Sync,
{
    fn classify(&self, result: &ExternalCommandResult) -> FlowOutcome {
        self(result)
    }
}

/// Case-insensitive substrings that identify known failures.
#[derive(Debug, Clone)]
pub struct Markers {
    pub captcha_required: Vec<String>,
    pub rate_limited: Vec<String>,
    pub registration_locked: Vec<String>,
    pub invalid_code: Vec<String>,
    pub link_expired: Vec<String>,
    /// Lines carrying the tool's suggested wait time.
    pub retry_after: Vec<String>,
}

fn owned(markers: &[&str]) -> Vec<String> {
    markers.iter().map(|m| m.to_string()).collect()
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            captcha_required: owned(&[
                "captcha required",
                "invalid captcha",
                "captcharequiredexception",
            ]),
            rate_limited: owned(&[
                "rate limit",
                "ratelimitexception",
                "status code: 429",
                "[429]",
            ]),
            registration_locked: owned(&[
                "locked with a pin",
                "registration lock",
                "pin locked",
            ]),
            invalid_code: owned(&[
                "invalid verification code",
                "incorrect verification code",
                "verification code is incorrect",
                "code is incorrect",
                "incorrect code",
            ]),
            link_expired: Vec::new(),
            retry_after: owned(&["next attempt may be tried at", "retry after", "retry-after"]),
        }
    }
}

impl Markers {
    /// Markers for `addDevice` output, where an expired QR code is a
    /// distinct failure.
    pub fn linking() -> Self {
        Self {
            link_expired: owned(&["link request has expired", "qr code has expired"]),
            ..Self::default()
        }
    }
}

/// Default classifier driven by [`Markers`].
///
/// A zero exit is always success. For non-zero exits the checks run in a
/// fixed order: captcha, rate limit, registration lock, invalid code,
/// expired link. Anything else fails with the tool's stderr verbatim.
/// Expiry is only recognised by the [`for_linking`](Self::for_linking)
/// classifier.
#[derive(Debug, Clone, Default)]
pub struct MarkerClassifier {
    markers: Markers,
}

impl MarkerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier for the device-linking flow.
    pub fn for_linking() -> Self {
        Self::with_markers(Markers::linking())
    }

    pub fn with_markers(markers: Markers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// First output line (stderr before stdout) naming when to retry.
    fn retry_after(&self, result: &ExternalCommandResult) -> Option<String> {
        result
            .stderr
            .lines()
            .chain(result.stdout.lines())
            .find(|line| contains_any(&line.to_lowercase(), &self.markers.retry_after))
            .map(|line| line.trim().to_string())
    }
}

impl OutputClassifier for MarkerClassifier {
    fn classify(&self, result: &ExternalCommandResult) -> FlowOutcome {
        if result.success() {
            return FlowOutcome::Success;
        }

        let text = format!("{}\n{}", result.stderr, result.stdout).to_lowercase();
        let m = &self.markers;

        if contains_any(&text, &m.captcha_required) {
            FlowOutcome::NeedsCaptcha
        } else if contains_any(&text, &m.rate_limited) {
            FlowOutcome::RateLimited {
                retry_after: self.retry_after(result),
            }
        } else if contains_any(&text, &m.registration_locked) {
            FlowOutcome::NeedsPin
        } else if contains_any(&text, &m.invalid_code) {
            FlowOutcome::NeedsVerificationCode
        } else if contains_any(&text, &m.link_expired) {
            FlowOutcome::Failed(FailureReason::LinkExpired(
                result.failure_text().to_string(),
            ))
        } else {
            FlowOutcome::Failed(FailureReason::External(failure_text(result)))
        }
    }
}

/// Map an invocation error to the failure it causes.
///
/// A missing binary is fatal for the whole run; a timeout or spawn failure
/// only fails the current flow.
pub(crate) fn runner_failure(err: RunnerError) -> Result<FailureReason, FlowError> {
    match err {
        RunnerError::ToolNotFound(program) => Err(FlowError::ToolNotFound(program)),
        RunnerError::Timeout { program, timeout } => Ok(FailureReason::Timeout {
            program,
            seconds: timeout.as_secs(),
        }),
        other => Ok(FailureReason::External(other.to_string())),
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

fn failure_text(result: &ExternalCommandResult) -> String {
    let text = result.failure_text();
    if text.is_empty() {
        format!("exited with status {} and no output", result.exit_code)
    } else {
        text.to_string()
    }
}
