//! Registration flow: request a verification code, then submit it.
//!
//! ```text
//! Start ──request──▶ VerificationRequested ──▶ AwaitingCode ──verify──▶ Registered
//!   ▲                                             │    ▲
//!   └── AwaitingCaptcha ◀── captcha required      │    └── invalid code (bounded)
//!                                                 └──▶ AwaitingPin ──verify+PIN──▶ Registered
//! ```
//!
//! Any step can end in `Failed`.

use crate::classify::{runner_failure, MarkerClassifier, OutputClassifier};
use crate::error::{FlowError, ValidationError};
use crate::operator::OperatorInput;
use crate::types::{
    CaptchaToken, FailureReason, FlowOutcome, InputKind, PhoneNumber, RetryLimits,
    VerificationCode,
};
use secrecy::{ExposeSecret, SecretString};
use signal_client::{SignalCli, VerificationMethod};
use std::sync::Arc;
use tool_runner::{ExternalCommandResult, RunnerError};
use tracing::{debug, info, warn};

/// Where the registration currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Start,
    AwaitingCaptcha,
    VerificationRequested,
    AwaitingCode,
    AwaitingPin,
    Registered,
    Failed(FailureReason),
}

/// Registers one phone number with signal-cli as the primary device.
///
/// Each call to [`advance`](Self::advance) performs at most one external
/// invocation. The account state itself is owned by signal-cli, so starting
/// over after a captcha challenge only repeats the request.
pub struct RegistrationFlow {
    phone: PhoneNumber,
    method: VerificationMethod,
    captcha: Option<CaptchaToken>,
    limits: RetryLimits,
    classifier: Arc<dyn OutputClassifier>,
    state: RegistrationState,
    captcha_challenges: u32,
    rejected_codes: u32,
    pending_code: Option<VerificationCode>,
}

impl RegistrationFlow {
    pub fn new(phone: PhoneNumber, method: VerificationMethod) -> Self {
        Self {
            phone,
            method,
            captcha: None,
            limits: RetryLimits::default(),
            classifier: Arc::new(MarkerClassifier::new()),
            state: RegistrationState::Start,
            captcha_challenges: 0,
            rejected_codes: 0,
            pending_code: None,
        }
    }

    /// Use a captcha token for the first request.
    pub fn with_captcha(mut self, captcha: CaptchaToken) -> Self {
        self.captcha = Some(captcha);
        self
    }

    pub fn with_limits(mut self, limits: RetryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the output classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    pub fn method(&self) -> VerificationMethod {
        self.method
    }

    pub fn limits(&self) -> &RetryLimits {
        &self.limits
    }

    /// Captcha challenges received so far.
    pub fn captcha_challenges(&self) -> u32 {
        self.captcha_challenges
    }

    /// Verification codes Signal has rejected so far.
    pub fn rejected_codes(&self) -> u32 {
        self.rejected_codes
    }

    /// Move the flow forward.
    ///
    /// `input` must answer the outcome returned by the previous call. From
    /// `Start` it may be `None` or a captcha token.
    pub async fn advance(
        &mut self,
        cli: &SignalCli,
        input: Option<OperatorInput>,
    ) -> Result<FlowOutcome, FlowError> {
        match (&self.state, input) {
            (RegistrationState::Start, None) => self.request_code(cli).await,
            (
                RegistrationState::Start | RegistrationState::AwaitingCaptcha,
                Some(OperatorInput::CaptchaToken(token)),
            ) => {
                self.captcha = Some(token);
                self.transition(RegistrationState::Start);
                self.request_code(cli).await
            }
            (RegistrationState::AwaitingCaptcha, _) => {
                Err(FlowError::MissingInput(InputKind::CaptchaToken))
            }
            (
                RegistrationState::VerificationRequested | RegistrationState::AwaitingCode,
                Some(OperatorInput::VerificationCode(raw)),
            ) => {
                let code = VerificationCode::parse(&raw)?;
                self.submit_code(cli, code, None).await
            }
            (RegistrationState::VerificationRequested | RegistrationState::AwaitingCode, _) => {
                Err(FlowError::MissingInput(InputKind::VerificationCode))
            }
            (RegistrationState::AwaitingPin, Some(OperatorInput::Pin(pin))) => {
                if pin.expose_secret().trim().is_empty() {
                    return Err(ValidationError::EmptyPin.into());
                }
                let code = match self.pending_code.take() {
                    Some(code) => code,
                    None => return Err(FlowError::MissingInput(InputKind::VerificationCode)),
                };
                self.submit_code(cli, code, Some(pin)).await
            }
            (RegistrationState::AwaitingPin, _) => Err(FlowError::MissingInput(InputKind::Pin)),
            (RegistrationState::Start, Some(_)) => {
                Err(FlowError::MissingInput(InputKind::CaptchaToken))
            }
            (RegistrationState::Registered | RegistrationState::Failed(_), _) => {
                Err(FlowError::Finished)
            }
        }
    }

    async fn request_code(&mut self, cli: &SignalCli) -> Result<FlowOutcome, FlowError> {
        info!(
            phone_number = %self.phone,
            method = %self.method,
            has_captcha = self.captcha.is_some(),
            "Requesting verification code"
        );

        let captcha = self.captcha.as_ref().map(CaptchaToken::to_uri);
        let result = cli
            .register(self.phone.as_str(), self.method, captcha.as_deref())
            .await;
        let result = match self.completed(result)? {
            Ok(result) => result,
            Err(outcome) => return Ok(outcome),
        };

        match self.classifier.classify(&result) {
            FlowOutcome::Success => {
                self.transition(RegistrationState::VerificationRequested);
                self.transition(RegistrationState::AwaitingCode);
                Ok(FlowOutcome::NeedsVerificationCode)
            }
            FlowOutcome::NeedsCaptcha => {
                // A token is single-use once Signal has seen it.
                self.captcha = None;
                self.captcha_challenges += 1;
                if self.captcha_challenges > self.limits.captcha_retries {
                    warn!(challenges = self.captcha_challenges, "Captcha retries exhausted");
                    return Ok(self.fail(FailureReason::RetriesExhausted {
                        input: InputKind::CaptchaToken,
                        attempts: self.captcha_challenges,
                    }));
                }
                self.transition(RegistrationState::AwaitingCaptcha);
                Ok(FlowOutcome::NeedsCaptcha)
            }
            FlowOutcome::RateLimited { retry_after } => {
                Ok(self.fail(FailureReason::RateLimited { retry_after }))
            }
            FlowOutcome::Failed(reason) => Ok(self.fail(reason)),
            _ => Ok(self.fail(FailureReason::External(
                result.failure_text().to_string(),
            ))),
        }
    }

    async fn submit_code(
        &mut self,
        cli: &SignalCli,
        code: VerificationCode,
        pin: Option<SecretString>,
    ) -> Result<FlowOutcome, FlowError> {
        info!(phone_number = %self.phone, with_pin = pin.is_some(), "Submitting verification code");

        let result = cli
            .verify(
                self.phone.as_str(),
                code.as_str(),
                pin.as_ref().map(|p| p.expose_secret().as_str()),
            )
            .await;
        let result = match self.completed(result)? {
            Ok(result) => result,
            Err(outcome) => return Ok(outcome),
        };

        match self.classifier.classify(&result) {
            FlowOutcome::Success => {
                info!(phone_number = %self.phone, "Registration complete");
                self.transition(RegistrationState::Registered);
                Ok(FlowOutcome::Success)
            }
            FlowOutcome::NeedsVerificationCode => {
                self.rejected_codes += 1;
                if self.rejected_codes > self.limits.code_retries {
                    warn!(rejected = self.rejected_codes, "Verification code retries exhausted");
                    return Ok(self.fail(FailureReason::RetriesExhausted {
                        input: InputKind::VerificationCode,
                        attempts: self.rejected_codes,
                    }));
                }
                self.transition(RegistrationState::AwaitingCode);
                Ok(FlowOutcome::NeedsVerificationCode)
            }
            FlowOutcome::NeedsPin if pin.is_none() => {
                self.pending_code = Some(code);
                self.transition(RegistrationState::AwaitingPin);
                Ok(FlowOutcome::NeedsPin)
            }
            FlowOutcome::RateLimited { retry_after } => {
                Ok(self.fail(FailureReason::RateLimited { retry_after }))
            }
            FlowOutcome::Failed(reason) => Ok(self.fail(reason)),
            _ => Ok(self.fail(FailureReason::External(
                result.failure_text().to_string(),
            ))),
        }
    }

    /// Unwrap an invocation result, turning timeouts into a failed flow.
    fn completed(
        &mut self,
        result: Result<ExternalCommandResult, RunnerError>,
    ) -> Result<Result<ExternalCommandResult, FlowOutcome>, FlowError> {
        match result {
            Ok(result) => Ok(Ok(result)),
            Err(e) => {
                let reason = runner_failure(e)?;
                Ok(Err(self.fail(reason)))
            }
        }
    }

    fn fail(&mut self, reason: FailureReason) -> FlowOutcome {
        warn!(phone_number = %self.phone, reason = %reason, "Registration failed");
        self.transition(RegistrationState::Failed(reason.clone()));
        match reason {
            FailureReason::RateLimited { retry_after } => FlowOutcome::RateLimited { retry_after },
            reason => FlowOutcome::Failed(reason),
        }
    }

    fn transition(&mut self, next: RegistrationState) {
        debug!(from = ?self.state, to = ?next, "Registration state transition");
        self.state = next;
    }
}
