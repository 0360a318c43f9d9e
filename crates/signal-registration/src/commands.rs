//! Command implementations shared by the subcommands and the wizard.

use signal_registration::config::Config;
use signal_registration::driver::{self, drive_linking, drive_registration};
use signal_registration::preflight::{check_account_registered, check_signal_cli};
use signal_registration::types::{CaptchaToken, FlowOutcome, PhoneNumber};
use signal_registration::{
    AppError, LinkingFlow, Operator, OperatorInput, QrDecoder, RegistrationFlow, SignalCli,
    VerificationMethod,
};
use std::sync::Arc;
use tool_runner::{CommandRunner, ProcessRunner};
use tracing::info;

/// Everything a command needs to talk to the external tools.
pub struct Context {
    pub config: Config,
    pub cli: SignalCli,
    pub decoder: QrDecoder,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let cli = SignalCli::with_options(runner.clone(), config.signal_cli_options());
        let decoder = QrDecoder::new(runner)
            .with_program(config.qr.decoder.clone())
            .with_timeout(config.qr.timeout);
        Self {
            config,
            cli,
            decoder,
        }
    }
}

pub struct RegisterRequest {
    pub phone: PhoneNumber,
    pub method: VerificationMethod,
    pub captcha: Option<CaptchaToken>,
}

pub struct LinkRequest {
    pub phone: PhoneNumber,
    pub device_name: String,
    pub source: Option<OperatorInput>,
}

pub async fn register(
    ctx: &Context,
    operator: &mut dyn Operator,
    request: RegisterRequest,
) -> Result<FlowOutcome, AppError> {
    check_signal_cli(&ctx.cli).await?;

    let mut flow = RegistrationFlow::new(request.phone.clone(), request.method)
        .with_limits(ctx.config.retry_limits());
    if let Some(captcha) = request.captcha {
        flow = flow.with_captcha(captcha);
    }

    operator.notice(&format!(
        "Requesting a verification code for {} by {}.",
        request.phone, request.method
    ));
    let outcome = drive_registration(&mut flow, &ctx.cli, operator).await?;

    if outcome == FlowOutcome::Success {
        info!(phone_number = %request.phone, "Registered");
        if ctx.config.registration.send_test_message {
            driver::send_test_message(&ctx.cli, &request.phone, operator).await;
        }
        operator.notice(&driver::maintenance_hints(ctx.cli.binary(), &request.phone));
    }

    Ok(outcome)
}

pub async fn add_device(
    ctx: &Context,
    operator: &mut dyn Operator,
    request: LinkRequest,
) -> Result<FlowOutcome, AppError> {
    check_signal_cli(&ctx.cli).await?;

    let registered = check_account_registered(&ctx.cli, &request.phone).await?;
    if registered != FlowOutcome::Success {
        operator.report(&registered);
        return Ok(registered);
    }

    if request.source.is_none() {
        operator.notice(
            "Open Signal Desktop and choose \"Link to an existing account\".\n\
             Copy the sgnl://linkdevice link under the QR code, or take a screenshot of the QR code.",
        );
    }

    let mut flow = LinkingFlow::new(request.phone.clone(), request.device_name);
    let outcome = drive_linking(
        &mut flow,
        &ctx.cli,
        &ctx.decoder,
        operator,
        request.source,
        ctx.config.linking.uri_attempts,
    )
    .await?;

    if outcome == FlowOutcome::Success {
        operator.notice(&format!(
            "Linked \"{}\" to {}.",
            flow.device_name(),
            request.phone
        ));
        if ctx.config.linking.sync_after_link {
            driver::sync_after_link(&ctx.cli, &request.phone, operator).await;
        }
    }

    Ok(outcome)
}
