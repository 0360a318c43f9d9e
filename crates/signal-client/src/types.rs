//! signal-cli argument types.

use std::fmt;
use std::time::Duration;

/// Default binary name looked up on PATH.
pub const DEFAULT_BINARY: &str = "signal-cli";

/// How Signal should deliver the verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationMethod {
    #[default]
    Sms,
    Voice,
}

impl VerificationMethod {
    /// Extra `register` flags for this method.
    pub fn register_flags(&self) -> &'static [&'static str] {
        match self {
            VerificationMethod::Sms => &[],
            VerificationMethod::Voice => &["--voice"],
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMethod::Sms => write!(f, "SMS"),
            VerificationMethod::Voice => write!(f, "voice call"),
        }
    }
}

/// Invocation settings for the signal-cli binary.
#[derive(Debug, Clone)]
pub struct SignalCliOptions {
    /// Binary name or path.
    pub binary: String,
    /// Alternative data directory, forwarded as `--config`.
    pub config_dir: Option<String>,
    /// Timeout for ordinary sub-commands.
    pub timeout: Duration,
    /// Timeout for `receive`, which blocks while draining the queue.
    pub receive_timeout: Duration,
}

impl Default for SignalCliOptions {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.into(),
            config_dir: None,
            timeout: Duration::from_secs(90),
            receive_timeout: Duration::from_secs(10),
        }
    }
}
