//! Human-in-the-loop inputs.
//!
//! Flows never read from the terminal themselves. When they need something
//! from the operator they return an outcome naming it; a driver asks an
//! [`Operator`] and feeds the answer back in as an [`OperatorInput`].

use crate::types::{CaptchaToken, FlowOutcome, InputKind};
use async_trait::async_trait;
use secrecy::SecretString;
use std::path::PathBuf;

/// Input fed back into a flow.
#[derive(Debug)]
pub enum OperatorInput {
    CaptchaToken(CaptchaToken),
    /// Raw code as typed; validated by the flow.
    VerificationCode(String),
    Pin(SecretString),
    /// Raw pasted linking URI; validated by the flow.
    LinkingUri(String),
    /// Screenshot of the QR code shown by Signal Desktop.
    QrImage(PathBuf),
}

impl OperatorInput {
    /// The kind of input this value answers.
    pub fn kind(&self) -> InputKind {
        match self {
            OperatorInput::CaptchaToken(_) => InputKind::CaptchaToken,
            OperatorInput::VerificationCode(_) => InputKind::VerificationCode,
            OperatorInput::Pin(_) => InputKind::Pin,
            OperatorInput::LinkingUri(_) | OperatorInput::QrImage(_) => InputKind::LinkingSource,
        }
    }

    /// Interpret a linking source: an existing file is a QR screenshot,
    /// anything else a pasted URI.
    pub fn linking_source(raw: &str) -> Self {
        let trimmed = raw.trim();
        let path = PathBuf::from(trimmed);
        if !trimmed.is_empty() && path.is_file() {
            OperatorInput::QrImage(path)
        } else {
            OperatorInput::LinkingUri(trimmed.to_string())
        }
    }
}

/// A prompt shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    pub kind: InputKind,
    /// 1-based count of how often this input has been requested.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl InputRequest {
    pub fn new(kind: InputKind, attempt: u32, max_attempts: u32) -> Self {
        Self {
            kind,
            attempt,
            max_attempts,
        }
    }

    /// Whether this is a repeated prompt.
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}

/// The human (or a script standing in for one).
#[async_trait]
pub trait Operator: Send {
    /// Ask for input. `None` means the operator declined.
    async fn provide(&mut self, request: &InputRequest) -> Option<String>;

    /// Tell the operator what a flow step produced.
    fn report(&mut self, outcome: &FlowOutcome);

    /// Informational or warning message.
    fn notice(&mut self, message: &str);
}
