//! Registration flow driven against scripted signal-cli output.

mod common;

use common::*;
use secrecy::SecretString;
use signal_registration::driver::{drive_registration, send_test_message, TEST_MESSAGE};
use signal_registration::types::{
    CaptchaToken, FailureReason, FlowOutcome, InputKind, PhoneNumber, RetryLimits,
};
use signal_registration::{
    FlowError, OperatorInput, RegistrationFlow, RegistrationState, ValidationError,
    VerificationMethod,
};
use std::sync::Arc;
use std::time::Duration;
use tool_runner::RunnerError;

fn flow() -> RegistrationFlow {
    RegistrationFlow::new(phone(), VerificationMethod::Sms)
}

fn code(raw: &str) -> Option<OperatorInput> {
    Some(OperatorInput::VerificationCode(raw.to_string()))
}

#[test]
fn test_invalid_phone_numbers_are_rejected() {
    for input in [
        "",
        "+",
        "15551112222",
        "+1555111222233334",
        "+1 555 111 2222",
        "+1-555-111-2222",
        " +15551112222",
        "+15551112222\n",
        "++15551112222",
        "+1555abc2222",
    ] {
        assert!(
            matches!(
                PhoneNumber::parse(input),
                Err(ValidationError::InvalidPhoneNumber(_))
            ),
            "accepted {:?}",
            input
        );
    }
    assert!(PhoneNumber::parse("+1").is_ok());
    assert!(PhoneNumber::parse("+123456789012345").is_ok());
}

#[tokio::test]
async fn test_registers_after_exactly_two_calls() {
    let runner = Arc::new(ScriptedRunner::new().ok("").ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let outcome = flow.advance(&cli, None).await.unwrap();
    assert_eq!(outcome, FlowOutcome::NeedsVerificationCode);
    assert_eq!(flow.state(), &RegistrationState::AwaitingCode);

    let outcome = flow.advance(&cli, code("123456")).await.unwrap();
    assert_eq!(outcome, FlowOutcome::Success);
    assert_eq!(flow.state(), &RegistrationState::Registered);

    assert_eq!(runner.call_count(), 2);
    let calls = runner.calls();
    assert_eq!(calls[0].args, ["-a", "+15551112222", "register"]);
    assert_eq!(calls[1].args, ["-a", "+15551112222", "verify", "123456"]);
}

#[tokio::test]
async fn test_voice_method_and_initial_captcha() {
    let runner = Arc::new(ScriptedRunner::new().ok(""));
    let cli = signal_cli(&runner);
    let mut flow = RegistrationFlow::new(phone(), VerificationMethod::Voice)
        .with_captcha(CaptchaToken::new("AbCd123").unwrap());

    flow.advance(&cli, None).await.unwrap();

    assert_eq!(
        runner.calls()[0].args,
        [
            "-a",
            "+15551112222",
            "register",
            "--voice",
            "--captcha",
            "signalcaptcha://AbCd123"
        ]
    );
}

#[tokio::test]
async fn test_captcha_challenge_reported_once_per_request() {
    let runner = Arc::new(ScriptedRunner::new().fails(1, CAPTCHA_REQUIRED).ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let outcome = flow.advance(&cli, None).await.unwrap();
    assert_eq!(outcome, FlowOutcome::NeedsCaptcha);
    assert_eq!(flow.state(), &RegistrationState::AwaitingCaptcha);
    assert_eq!(flow.captcha_challenges(), 1);
    assert_eq!(runner.call_count(), 1);

    let token = CaptchaToken::new("AbCd123").unwrap();
    let outcome = flow
        .advance(&cli, Some(OperatorInput::CaptchaToken(token)))
        .await
        .unwrap();
    assert_eq!(outcome, FlowOutcome::NeedsVerificationCode);

    // Retrying with a fresh token repeats only the request.
    assert_eq!(runner.subcommands(), ["register", "register"]);
    assert!(runner.calls()[1]
        .args
        .ends_with(&["--captcha".to_string(), "signalcaptcha://AbCd123".to_string()]));
}

#[tokio::test]
async fn test_awaiting_captcha_requires_a_token() {
    let runner = Arc::new(ScriptedRunner::new().fails(1, CAPTCHA_REQUIRED));
    let cli = signal_cli(&runner);
    let mut flow = flow();
    flow.advance(&cli, None).await.unwrap();

    let err = flow.advance(&cli, None).await.unwrap_err();
    assert!(matches!(err, FlowError::MissingInput(InputKind::CaptchaToken)));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_captcha_retries_are_bounded() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .fails(1, CAPTCHA_REQUIRED)
            .fails(1, CAPTCHA_REQUIRED)
            .fails(1, CAPTCHA_REQUIRED),
    );
    let cli = signal_cli(&runner);
    let mut flow = flow().with_limits(RetryLimits {
        captcha_retries: 2,
        ..RetryLimits::default()
    });
    let mut operator = ScriptedOperator::new(&["signalcaptcha://one", "signalcaptcha://two/"]);

    let outcome = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::RetriesExhausted {
            input: InputKind::CaptchaToken,
            attempts: 3
        })
    );
    assert_eq!(runner.call_count(), 3);
    assert_eq!(
        operator.reports,
        [
            FlowOutcome::NeedsCaptcha,
            FlowOutcome::NeedsCaptcha,
            outcome.clone()
        ]
    );
    assert!(runner.calls()[2]
        .args
        .contains(&"signalcaptcha://two".to_string()));
}

#[tokio::test]
async fn test_rate_limit_surfaces_wait_time() {
    let runner = Arc::new(ScriptedRunner::new().fails(1, RATE_LIMITED));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let outcome = flow.advance(&cli, None).await.unwrap();

    let retry_after = Some("Next attempt may be tried at 2024-05-01T12:00:00Z".to_string());
    assert_eq!(
        outcome,
        FlowOutcome::RateLimited {
            retry_after: retry_after.clone()
        }
    );
    assert_eq!(
        flow.state(),
        &RegistrationState::Failed(FailureReason::RateLimited { retry_after })
    );
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_failed_sms_request_does_not_fall_back_to_voice() {
    let stderr = "Failed to register: SMS delivery failed";
    let runner = Arc::new(ScriptedRunner::new().fails(1, stderr).ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let outcome = flow.advance(&cli, None).await.unwrap();
    let err = flow.advance(&cli, None).await.unwrap_err();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::External(stderr.to_string()))
    );
    assert!(matches!(err, FlowError::Finished));
    assert_eq!(flow.method(), VerificationMethod::Sms);
    assert_eq!(runner.call_count(), 1);
    assert!(!runner.calls()[0].args.contains(&"--voice".to_string()));
}

#[tokio::test]
async fn test_invalid_code_can_be_reentered() {
    let runner = Arc::new(ScriptedRunner::new().ok("").fails(1, INVALID_CODE).ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();
    let mut operator = ScriptedOperator::new(&["111111", "222-222"]);

    let outcome = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap();

    assert_eq!(outcome, FlowOutcome::Success);
    assert_eq!(flow.rejected_codes(), 1);
    assert_eq!(
        operator.reports,
        [
            FlowOutcome::NeedsVerificationCode,
            FlowOutcome::NeedsVerificationCode,
            FlowOutcome::Success
        ]
    );
    assert_eq!(runner.calls()[2].args.last().map(String::as_str), Some("222222"));
}

#[tokio::test]
async fn test_invalid_code_retries_are_bounded() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok("")
            .fails(1, INVALID_CODE)
            .fails(1, INVALID_CODE),
    );
    let cli = signal_cli(&runner);
    let mut flow = flow().with_limits(RetryLimits {
        code_retries: 1,
        ..RetryLimits::default()
    });
    let mut operator = ScriptedOperator::new(&["111111", "222222"]);

    let outcome = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::RetriesExhausted {
            input: InputKind::VerificationCode,
            attempts: 2
        })
    );
    assert_eq!(runner.call_count(), 3);
}

#[tokio::test]
async fn test_malformed_code_never_reaches_signal_cli() {
    let runner = Arc::new(ScriptedRunner::new().ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();
    flow.advance(&cli, None).await.unwrap();

    let err = flow.advance(&cli, code("12ab56")).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Validation(ValidationError::InvalidVerificationCode)
    ));
    assert_eq!(flow.state(), &RegistrationState::AwaitingCode);
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_code_is_prompted_again() {
    let runner = Arc::new(ScriptedRunner::new().ok("").ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();
    let mut operator = ScriptedOperator::new(&["12", "123-456"]);

    let outcome = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap();

    assert_eq!(outcome, FlowOutcome::Success);
    assert_eq!(operator.requests.len(), 2);
    assert_eq!(operator.requests[0].attempt, 1);
    assert_eq!(operator.requests[1].attempt, 2);
    assert!(operator.requests[1].is_retry());
    assert!(operator
        .notices
        .iter()
        .any(|n| n.contains("6 digits") || n.contains("code")));
    assert_eq!(runner.call_count(), 2);
}

#[tokio::test]
async fn test_malformed_input_attempts_are_bounded() {
    let runner = Arc::new(ScriptedRunner::new().ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow().with_limits(RetryLimits {
        input_attempts: 2,
        ..RetryLimits::default()
    });
    let mut operator = ScriptedOperator::new(&["1", "2", "3"]);

    let err = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::InputAttemptsExhausted {
            input: InputKind::VerificationCode,
            attempts: 2
        }
    ));
    assert_eq!(operator.requests.len(), 2);
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_declined_prompt_stops_the_driver() {
    let runner = Arc::new(ScriptedRunner::new().ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();
    let mut operator = ScriptedOperator::default().then_decline();

    let err = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Declined(InputKind::VerificationCode)));
}

#[tokio::test]
async fn test_registration_lock_pin() {
    let runner = Arc::new(ScriptedRunner::new().ok("").fails(1, PIN_LOCKED).ok(""));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    flow.advance(&cli, None).await.unwrap();
    let outcome = flow.advance(&cli, code("123456")).await.unwrap();
    assert_eq!(outcome, FlowOutcome::NeedsPin);
    assert_eq!(flow.state(), &RegistrationState::AwaitingPin);

    let pin = SecretString::new("4321".to_string());
    let outcome = flow
        .advance(&cli, Some(OperatorInput::Pin(pin)))
        .await
        .unwrap();
    assert_eq!(outcome, FlowOutcome::Success);
    assert_eq!(
        runner.calls()[2].args,
        ["-a", "+15551112222", "verify", "123456", "--pin", "4321"]
    );
}

#[tokio::test]
async fn test_wrong_pin_fails() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok("")
            .fails(1, PIN_LOCKED)
            .fails(1, PIN_LOCKED),
    );
    let cli = signal_cli(&runner);
    let mut flow = flow();
    let mut operator = ScriptedOperator::new(&["123456", "0000"]);

    let outcome = drive_registration(&mut flow, &cli, &mut operator)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        FlowOutcome::Failed(FailureReason::External(ref stderr)) if stderr.contains("locked with a pin")
    ));
    assert_eq!(operator.requests[1].kind, InputKind::Pin);
}

#[tokio::test]
async fn test_unknown_failure_is_passed_through() {
    let stderr = "Verification failed: java.io.IOException: Connection reset";
    let runner = Arc::new(ScriptedRunner::new().ok("").fails(3, stderr));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    flow.advance(&cli, None).await.unwrap();
    let outcome = flow.advance(&cli, code("123456")).await.unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::External(stderr.to_string()))
    );
}

#[tokio::test]
async fn test_expired_verification_code_is_not_a_link_expiry() {
    let stderr = "Verification failed: verification code has expired";
    let runner = Arc::new(ScriptedRunner::new().ok("").fails(1, stderr));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    flow.advance(&cli, None).await.unwrap();
    let outcome = flow.advance(&cli, code("123456")).await.unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::External(stderr.to_string()))
    );
    assert!(!outcome.next_action().contains("QR"));
}

#[tokio::test]
async fn test_timeout_fails_without_retry() {
    let runner = Arc::new(ScriptedRunner::new().respond(Err(RunnerError::Timeout {
        program: "signal-cli".into(),
        timeout: Duration::from_secs(90),
    })));
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let outcome = flow.advance(&cli, None).await.unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Failed(FailureReason::Timeout {
            program: "signal-cli".into(),
            seconds: 90
        })
    );
    assert_eq!(runner.call_count(), 1);
    assert!(matches!(
        flow.advance(&cli, None).await,
        Err(FlowError::Finished)
    ));
}

#[tokio::test]
async fn test_missing_signal_cli() {
    let runner = Arc::new(
        ScriptedRunner::new().respond(Err(RunnerError::ToolNotFound("signal-cli".into()))),
    );
    let cli = signal_cli(&runner);
    let mut flow = flow();

    let err = flow.advance(&cli, None).await.unwrap_err();

    assert!(matches!(err, FlowError::ToolNotFound(ref p) if p == "signal-cli"));
}

#[tokio::test]
async fn test_custom_classifier() {
    let runner = Arc::new(ScriptedRunner::new().fails(1, "Bitte Captcha lösen"));
    let cli = signal_cli(&runner);
    let mut flow = flow().with_classifier(Arc::new(
        |result: &tool_runner::ExternalCommandResult| {
            if result.stderr.contains("Captcha") {
                FlowOutcome::NeedsCaptcha
            } else {
                FlowOutcome::Success
            }
        },
    ));

    let outcome = flow.advance(&cli, None).await.unwrap();

    assert_eq!(outcome, FlowOutcome::NeedsCaptcha);
}

#[tokio::test]
async fn test_note_to_self_after_registration() {
    let runner = Arc::new(ScriptedRunner::new().ok("1700000000000\n"));
    let mut operator = ScriptedOperator::default();

    let sent = send_test_message(&signal_cli(&runner), &phone(), &mut operator).await;

    assert!(sent);
    assert_eq!(
        runner.calls()[0].args,
        ["-a", "+15551112222", "send", "--note-to-self", "-m", TEST_MESSAGE]
    );
}

#[tokio::test]
async fn test_failed_note_to_self_is_only_reported() {
    let runner = Arc::new(ScriptedRunner::new().fails(1, "Failed to send message"));
    let mut operator = ScriptedOperator::default();

    let sent = send_test_message(&signal_cli(&runner), &phone(), &mut operator).await;

    assert!(!sent);
    assert_eq!(
        operator.notices,
        ["Could not send a test message: Failed to send message"]
    );
}
