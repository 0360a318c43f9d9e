//! Values passed between registration and linking steps.
//!
//! Nothing here is persisted; every value lives for a single run.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Scheme Signal Desktop uses for linking URIs.
pub const LINKING_URI_PREFIX: &str = "sgnl://linkdevice?";

/// Scheme of links produced by the captcha page.
pub const CAPTCHA_SCHEME: &str = "signalcaptcha://";

/// Longest number allowed by E.164, excluding the `+`.
const E164_MAX_DIGITS: usize = 15;

const VERIFICATION_CODE_LEN: usize = 6;

/// Phone number in E.164 form: `+` followed by 1 to 15 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate `input` without any normalisation.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let valid = input
            .strip_prefix('+')
            .map(|digits| {
                !digits.is_empty()
                    && digits.len() <= E164_MAX_DIGITS
                    && digits.bytes().all(|b| b.is_ascii_digit())
            })
            .unwrap_or(false);

        if valid {
            Ok(Self(input.to_string()))
        } else {
            Err(ValidationError::InvalidPhoneNumber(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Captcha token with its `signalcaptcha://` scheme removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaToken(String);

impl CaptchaToken {
    /// Wrap an already-normalised token.
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token in the URI form signal-cli expects for `--captcha`.
    pub fn to_uri(&self) -> String {
        format!("{}{}", CAPTCHA_SCHEME, self.0)
    }
}

/// Six-digit code delivered by SMS or voice call.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Accepts `123456` as well as the `123-456` form shown in the SMS.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let code = match trimmed.split_once('-') {
            Some((head, tail)) => format!("{}{}", head.trim(), tail.trim()),
            None => trimmed.to_string(),
        };

        if code.len() == VERIFICATION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidVerificationCode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(******)")
    }
}

/// Linking URI shown by Signal Desktop as a QR code.
///
/// Only the scheme prefix is checked; the query parameters are handed to
/// signal-cli untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkingUri(String);

impl LinkingUri {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.starts_with(LINKING_URI_PREFIX) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::InvalidLinkingUri(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input the operator can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    CaptchaToken,
    VerificationCode,
    Pin,
    LinkingSource,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::CaptchaToken => write!(f, "captcha token"),
            InputKind::VerificationCode => write!(f, "verification code"),
            InputKind::Pin => write!(f, "registration lock PIN"),
            InputKind::LinkingSource => write!(f, "linking URI or QR image"),
        }
    }
}

/// Why a flow ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Signal refused the request; `retry_after` is the tool's own wording.
    RateLimited { retry_after: Option<String> },
    /// The QR code expired before signal-cli could use it.
    LinkExpired(String),
    /// An external invocation exceeded its timeout.
    Timeout { program: String, seconds: u64 },
    /// The operator used up the allowed number of retries.
    RetriesExhausted { input: InputKind, attempts: u32 },
    /// signal-cli has no registered account for the number.
    NotRegistered,
    /// Unrecognised failure, carrying the tool's stderr verbatim.
    External(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RateLimited { retry_after: Some(when) } => {
                write!(f, "rate limited by Signal ({})", when)
            }
            FailureReason::RateLimited { retry_after: None } => write!(f, "rate limited by Signal"),
            FailureReason::LinkExpired(detail) => write!(f, "linking QR code expired: {}", detail),
            FailureReason::Timeout { program, seconds } => {
                write!(f, "{} did not finish within {}s", program, seconds)
            }
            FailureReason::RetriesExhausted { input, attempts } => {
                write!(f, "gave up after {} attempts to supply a {}", attempts, input)
            }
            FailureReason::NotRegistered => write!(f, "account is not registered in signal-cli"),
            FailureReason::External(stderr) => write!(f, "{}", stderr),
        }
    }
}

/// Result of one flow step, telling the operator what happened and what is
/// needed next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Success,
    NeedsCaptcha,
    NeedsVerificationCode,
    NeedsPin,
    NeedsLinkingUri,
    RateLimited { retry_after: Option<String> },
    Failed(FailureReason),
}

impl FlowOutcome {
    /// The input required to continue, if any.
    pub fn input_needed(&self) -> Option<InputKind> {
        match self {
            FlowOutcome::NeedsCaptcha => Some(InputKind::CaptchaToken),
            FlowOutcome::NeedsVerificationCode => Some(InputKind::VerificationCode),
            FlowOutcome::NeedsPin => Some(InputKind::Pin),
            FlowOutcome::NeedsLinkingUri => Some(InputKind::LinkingSource),
            _ => None,
        }
    }

    /// Whether the flow has ended.
    pub fn is_terminal(&self) -> bool {
        self.input_needed().is_none()
    }

    /// What the operator should do about this outcome.
    pub fn next_action(&self) -> &'static str {
        match self {
            FlowOutcome::Success => "Nothing more to do.",
            FlowOutcome::NeedsCaptcha => "Solve a new captcha and paste the signalcaptcha:// link.",
            FlowOutcome::NeedsVerificationCode => {
                "Enter the 6-digit code Signal sent by SMS or voice call."
            }
            FlowOutcome::NeedsPin => "Enter the registration lock PIN set on this number.",
            FlowOutcome::NeedsLinkingUri => {
                "Paste the sgnl://linkdevice link or the path of a screenshot of the QR code."
            }
            FlowOutcome::RateLimited { .. } => "Wait before requesting another code.",
            FlowOutcome::Failed(FailureReason::LinkExpired(_)) => {
                "Refresh the QR code in Signal Desktop and scan it again."
            }
            FlowOutcome::Failed(FailureReason::NotRegistered) => {
                "Register the number first with the `register` command."
            }
            FlowOutcome::Failed(FailureReason::Timeout { .. }) => {
                "Check your network connection and run the command again."
            }
            FlowOutcome::Failed(_) => "Review the error above and start over.",
        }
    }
}

impl fmt::Display for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOutcome::Success => write!(f, "success"),
            FlowOutcome::NeedsCaptcha => write!(f, "captcha required"),
            FlowOutcome::NeedsVerificationCode => write!(f, "verification code required"),
            FlowOutcome::NeedsPin => write!(f, "registration lock PIN required"),
            FlowOutcome::NeedsLinkingUri => write!(f, "linking URI required"),
            FlowOutcome::RateLimited { retry_after: Some(when) } => {
                write!(f, "rate limited: {}", when)
            }
            FlowOutcome::RateLimited { retry_after: None } => write!(f, "rate limited"),
            FlowOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Bounds on the operator-visible retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLimits {
    /// Fresh captcha tokens requested after the tool demands one.
    pub captcha_retries: u32,
    /// Re-entries allowed after Signal rejects a verification code.
    pub code_retries: u32,
    /// Malformed inputs tolerated per prompt before giving up.
    pub input_attempts: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            captcha_retries: 3,
            code_retries: 3,
            input_attempts: 3,
        }
    }
}
