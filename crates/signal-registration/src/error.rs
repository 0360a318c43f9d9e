//! Error types.

use crate::types::{FlowOutcome, InputKind, LINKING_URI_PREFIX};
use thiserror::Error;
use tool_runner::RunnerError;

/// Bad operator input, caught before any external tool is invoked.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid phone number '{0}': expected + followed by 1 to 15 digits (e.g. +15551234567)")]
    InvalidPhoneNumber(String),

    #[error("Invalid linking URI '{0}': it must start with '{prefix}'", prefix = LINKING_URI_PREFIX)]
    InvalidLinkingUri(String),

    #[error("Captcha token is empty")]
    EmptyToken,

    #[error("Could not read captcha file {path}: {source}")]
    CaptchaFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Verification code must be 6 digits (e.g. 123456 or 123-456)")]
    InvalidVerificationCode,

    #[error("PIN is empty")]
    EmptyPin,
}

/// QR extraction failures.
///
/// `DecodeFailed` means no usable symbol was found (rescan);
/// `InvalidLinkingUri` means a symbol was found but it is not a Signal
/// linking code (wrong QR code).
#[derive(Debug, Error)]
pub enum QrError {
    #[error("No QR code found: {0}")]
    DecodeFailed(String),

    #[error("QR code is not a Signal linking code: '{0}'")]
    InvalidLinkingUri(String),

    #[error(transparent)]
    Tool(#[from] RunnerError),
}

impl QrError {
    /// Advice matching the failure kind.
    pub fn remediation(&self) -> &'static str {
        match self {
            QrError::DecodeFailed(_) => {
                "Take a new screenshot that contains the whole QR code and try again."
            }
            QrError::InvalidLinkingUri(_) => {
                "That is not the QR code from Signal Desktop's \"Link device\" screen."
            }
            QrError::Tool(_) => "Check that the QR decoder is installed and working.",
        }
    }
}

/// Errors that stop a flow from advancing.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error("{0} is not installed or not on PATH")]
    ToolNotFound(String),

    #[error("Expected a {0} at this step")]
    MissingInput(InputKind),

    #[error("Flow has already finished")]
    Finished,

    #[error("No {0} was provided")]
    Declined(InputKind),

    #[error("Gave up after {attempts} invalid attempts to enter a {input}")]
    InputAttemptsExhausted { input: InputKind, attempts: u32 },
}

/// Top-level error for the command-line front end.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0:#}")]
    Config(#[from] anyhow::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("{0}")]
    Outcome(FlowOutcome),

    #[error("Cancelled")]
    Cancelled,
}

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const INPUT: u8 = 1;
    pub const EXTERNAL: u8 = 2;
    pub const TOOL_NOT_FOUND: u8 = 3;
}

impl AppError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Validation(_) | AppError::Cancelled => exit_code::INPUT,
            AppError::Flow(FlowError::ToolNotFound(_)) => exit_code::TOOL_NOT_FOUND,
            AppError::Flow(FlowError::Qr(QrError::Tool(RunnerError::ToolNotFound(_)))) => {
                exit_code::TOOL_NOT_FOUND
            }
            AppError::Flow(FlowError::Qr(QrError::Tool(_))) => exit_code::EXTERNAL,
            AppError::Flow(_) => exit_code::INPUT,
            AppError::Outcome(FlowOutcome::Success) => exit_code::SUCCESS,
            AppError::Outcome(_) => exit_code::EXTERNAL,
        }
    }

    /// Extra guidance printed after the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            AppError::Flow(FlowError::ToolNotFound(program))
            | AppError::Flow(FlowError::Qr(QrError::Tool(RunnerError::ToolNotFound(program)))) => {
                Some(install_hint(program))
            }
            AppError::Flow(FlowError::Qr(e)) => Some(e.remediation().to_string()),
            AppError::Outcome(outcome) => Some(outcome.next_action().to_string()),
            _ => None,
        }
    }
}

fn install_hint(program: &str) -> String {
    if program.contains("zbar") {
        format!(
            "Install the QR decoder ({}) first:\n  brew install zbar      # macOS\n  apt install zbar-tools # Debian/Ubuntu",
            program
        )
    } else if program.contains("signal-cli") {
        format!(
            "Install signal-cli ({}) first:\n  brew install signal-cli\n  or download https://github.com/AsamK/signal-cli/releases/latest",
            program
        )
    } else {
        format!("Install {} and make sure it is on PATH.", program)
    }
}
