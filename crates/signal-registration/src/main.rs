//! signal-registration - Entry point.

mod cli;
mod commands;
mod console;
mod wizard;

use crate::cli::{AddDeviceArgs, Cli, Commands, RegisterArgs};
use crate::commands::{Context, LinkRequest, RegisterRequest};
use crate::console::ConsoleOperator;
use clap::Parser;
use signal_registration::captcha;
use signal_registration::config::Config;
use signal_registration::types::{FlowOutcome, PhoneNumber};
use signal_registration::{AppError, OperatorInput, VerificationMethod};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => return exit_with(AppError::Config(e)),
    };

    // Initialize logging
    init_logging(&config.log.level, cli.verbose);

    match run(cli, config).await {
        Ok(FlowOutcome::Success) => ExitCode::SUCCESS,
        Ok(outcome) => exit_with(AppError::Outcome(outcome)),
        Err(e) => exit_with(e),
    }
}

async fn run(cli: Cli, config: Config) -> Result<FlowOutcome, AppError> {
    let ctx = Context::new(config);
    let mut console = ConsoleOperator::new();

    match cli.command {
        Some(Commands::Register(args)) => {
            let request = register_request(args)?;
            commands::register(&ctx, &mut console, request).await
        }
        Some(Commands::AddDevice(args)) => {
            let request = link_request(args, &ctx.config)?;
            commands::add_device(&ctx, &mut console, request).await
        }
        None => wizard::run(&ctx, &mut console).await,
    }
}

fn register_request(args: RegisterArgs) -> Result<RegisterRequest, AppError> {
    let phone = PhoneNumber::parse(&args.phone)?;
    let captcha = match (args.captcha, args.captcha_file) {
        (Some(raw), _) => Some(captcha::extract_token(&raw)?),
        (None, Some(path)) => Some(captcha::read_token_file(&path)?),
        (None, None) => None,
    };
    let method = if args.voice {
        VerificationMethod::Voice
    } else {
        VerificationMethod::Sms
    };

    Ok(RegisterRequest {
        phone,
        method,
        captcha,
    })
}

fn link_request(args: AddDeviceArgs, config: &Config) -> Result<LinkRequest, AppError> {
    let phone = PhoneNumber::parse(&args.phone)?;
    let source = match (args.uri, args.qr_image) {
        (Some(uri), _) => Some(OperatorInput::LinkingUri(uri)),
        (None, Some(path)) => Some(OperatorInput::QrImage(path)),
        (None, None) => None,
    };

    Ok(LinkRequest {
        phone,
        device_name: args
            .device_name
            .unwrap_or_else(|| config.linking.device_name.clone()),
        source,
    })
}

/// Print the error with its remediation and pick the exit code.
fn exit_with(err: AppError) -> ExitCode {
    match &err {
        // The outcome itself has already been shown.
        AppError::Outcome(outcome) => debug!(outcome = %outcome, "Flow did not succeed"),
        _ => eprintln!("Error: {}", err),
    }
    if let Some(hint) = err.hint() {
        eprintln!("{}", hint);
    }
    ExitCode::from(err.exit_code())
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
