//! Drivers that run a flow to completion against an [`Operator`].
//!
//! Every outcome is reported. When a flow asks for input the operator is
//! prompted; input that fails validation is shown back to the operator and
//! the same prompt repeats, up to a fixed number of attempts.

use crate::captcha;
use crate::error::{FlowError, QrError, ValidationError};
use crate::linking::LinkingFlow;
use crate::operator::{InputRequest, Operator, OperatorInput};
use crate::qr::QrDecoder;
use crate::registration::RegistrationFlow;
use crate::types::{FlowOutcome, InputKind, PhoneNumber};
use secrecy::SecretString;
use signal_client::SignalCli;
use tracing::{info, instrument, warn};

/// Message sent to the new account once registration completes.
pub const TEST_MESSAGE: &str = "signal-cli registration complete";

/// Run a registration to a terminal outcome.
#[instrument(skip_all, fields(phone_number = %flow.phone()))]
pub async fn drive_registration(
    flow: &mut RegistrationFlow,
    cli: &SignalCli,
    operator: &mut dyn Operator,
) -> Result<FlowOutcome, FlowError> {
    let max_attempts = flow.limits().input_attempts.max(1);
    let mut prompt = Prompt::new(max_attempts);
    let mut input = None;

    loop {
        let outcome = match flow.advance(cli, input.take()).await {
            Ok(outcome) => outcome,
            Err(e) if is_bad_input(&e) => {
                input = Some(prompt.retry(operator, e).await?);
                continue;
            }
            Err(e) => return Err(e),
        };

        operator.report(&outcome);
        match outcome.input_needed() {
            Some(kind) => input = Some(prompt.ask(operator, kind).await?),
            None => return Ok(outcome),
        }
    }
}

/// Run a device link to a terminal outcome.
///
/// `initial` is a linking source given up front (command-line flag); if it
/// is invalid the error is returned rather than prompting.
#[instrument(skip_all, fields(phone_number = %flow.phone(), device_name = %flow.device_name()))]
pub async fn drive_linking(
    flow: &mut LinkingFlow,
    cli: &SignalCli,
    decoder: &QrDecoder,
    operator: &mut dyn Operator,
    initial: Option<OperatorInput>,
    max_attempts: u32,
) -> Result<FlowOutcome, FlowError> {
    let mut prompt = Prompt::new(max_attempts.max(1));
    let mut input = initial;

    loop {
        let outcome = match flow.advance(cli, decoder, input.take()).await {
            Ok(outcome) => outcome,
            Err(e) if is_bad_input(&e) => {
                input = Some(prompt.retry(operator, e).await?);
                continue;
            }
            Err(e) => return Err(e),
        };

        operator.report(&outcome);
        match outcome.input_needed() {
            Some(kind) => input = Some(prompt.ask(operator, kind).await?),
            None => return Ok(outcome),
        }
    }
}

/// Send a note-to-self so the new account has some activity.
///
/// Failure is reported but never fails the registration.
pub async fn send_test_message(
    cli: &SignalCli,
    phone: &PhoneNumber,
    operator: &mut dyn Operator,
) -> bool {
    match cli.send_note_to_self(phone.as_str(), TEST_MESSAGE).await {
        Ok(result) if result.success() => {
            info!(phone_number = %phone, "Test message sent");
            operator.notice("Sent a test message to Note to Self.");
            true
        }
        Ok(result) => {
            warn!(exit_code = result.exit_code, "Test message failed");
            operator.notice(&format!(
                "Could not send a test message: {}",
                result.failure_text()
            ));
            false
        }
        Err(e) => {
            warn!(error = %e, "Test message failed");
            operator.notice(&format!("Could not send a test message: {}", e));
            false
        }
    }
}

/// Pull contacts and groups onto the freshly linked device.
///
/// `receive` often runs until its timeout when there is nothing queued, so a
/// timeout here is expected.
pub async fn sync_after_link(
    cli: &SignalCli,
    phone: &PhoneNumber,
    operator: &mut dyn Operator,
) -> bool {
    operator.notice("Syncing contacts and groups...");
    match cli.receive(phone.as_str()).await {
        Ok(result) if result.success() => {
            info!(phone_number = %phone, "Initial sync complete");
            true
        }
        Ok(result) => {
            warn!(exit_code = result.exit_code, "Initial sync failed");
            operator.notice(&format!("Initial sync failed: {}", result.failure_text()));
            false
        }
        Err(e) => {
            warn!(error = %e, "Initial sync did not complete");
            operator.notice("Initial sync did not complete; it will continue on the next receive.");
            false
        }
    }
}

/// How to keep the account alive after the run.
pub fn maintenance_hints(binary: &str, phone: &PhoneNumber) -> String {
    format!(
        "Keep the account active by receiving messages regularly:\n  {binary} -a {phone} receive\nor run signal-cli as a daemon:\n  {binary} -a {phone} daemon"
    )
}

fn is_bad_input(err: &FlowError) -> bool {
    matches!(
        err,
        FlowError::Validation(_)
            | FlowError::Qr(QrError::DecodeFailed(_))
            | FlowError::Qr(QrError::InvalidLinkingUri(_))
    )
}

/// Prompt state for the input currently being asked for.
struct Prompt {
    kind: Option<InputKind>,
    attempt: u32,
    max_attempts: u32,
}

impl Prompt {
    fn new(max_attempts: u32) -> Self {
        Self {
            kind: None,
            attempt: 0,
            max_attempts,
        }
    }

    /// Ask for a fresh input of `kind`.
    async fn ask(
        &mut self,
        operator: &mut dyn Operator,
        kind: InputKind,
    ) -> Result<OperatorInput, FlowError> {
        self.kind = Some(kind);
        self.attempt = 0;
        self.next(operator, kind).await
    }

    /// Repeat the current prompt after the flow rejected the last answer.
    async fn retry(
        &mut self,
        operator: &mut dyn Operator,
        err: FlowError,
    ) -> Result<OperatorInput, FlowError> {
        let kind = match self.kind {
            Some(kind) => kind,
            None => return Err(err),
        };
        operator.notice(&rejection(&err));
        self.next(operator, kind).await
    }

    async fn next(
        &mut self,
        operator: &mut dyn Operator,
        kind: InputKind,
    ) -> Result<OperatorInput, FlowError> {
        loop {
            self.attempt += 1;
            if self.attempt > self.max_attempts {
                warn!(input = %kind, attempts = self.max_attempts, "Input attempts exhausted");
                return Err(FlowError::InputAttemptsExhausted {
                    input: kind,
                    attempts: self.max_attempts,
                });
            }

            let request = InputRequest::new(kind, self.attempt, self.max_attempts);
            let raw = operator
                .provide(&request)
                .await
                .ok_or(FlowError::Declined(kind))?;

            match convert(kind, &raw) {
                Ok(input) => return Ok(input),
                Err(e) => operator.notice(&e.to_string()),
            }
        }
    }
}

fn rejection(err: &FlowError) -> String {
    match err {
        FlowError::Qr(e) => format!("{}\n{}", e, e.remediation()),
        other => other.to_string(),
    }
}

/// Turn operator text into flow input. Verification codes and linking URIs
/// are checked by the flows themselves.
fn convert(kind: InputKind, raw: &str) -> Result<OperatorInput, ValidationError> {
    match kind {
        InputKind::CaptchaToken => captcha::extract_token(raw).map(OperatorInput::CaptchaToken),
        InputKind::VerificationCode => Ok(OperatorInput::VerificationCode(raw.trim().to_string())),
        InputKind::Pin => Ok(OperatorInput::Pin(SecretString::new(raw.trim().to_string()))),
        InputKind::LinkingSource => Ok(OperatorInput::linking_source(raw)),
    }
}
