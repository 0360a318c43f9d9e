//! Interactive mode used when no subcommand is given.

use crate::commands::{self, Context, LinkRequest, RegisterRequest};
use crate::console::ConsoleOperator;
use signal_registration::captcha;
use signal_registration::types::{CaptchaToken, FlowOutcome, PhoneNumber};
use signal_registration::{AppError, VerificationMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Register,
    Link,
}

pub async fn run(ctx: &Context, console: &mut ConsoleOperator) -> Result<FlowOutcome, AppError> {
    console.say("Signal registration wizard");
    console.say("  1) Register a phone number with signal-cli");
    console.say("  2) Link Signal Desktop to a registered number");

    let mode = loop {
        let answer = console.read_line("Choose [1/2]: ").await;
        let answer = answered(answer)?;
        match parse_mode(&answer) {
            Some(mode) => break mode,
            None => console.say("Please answer 1 or 2."),
        }
    };

    let phone = ask_phone(console).await?;

    match mode {
        Mode::Register => {
            let method = ask_method(console).await?;
            let captcha = ask_captcha(console).await?;
            let request = RegisterRequest {
                phone,
                method,
                captcha,
            };
            commands::register(ctx, console, request).await
        }
        Mode::Link => {
            let request = LinkRequest {
                phone,
                device_name: ctx.config.linking.device_name.clone(),
                source: None,
            };
            commands::add_device(ctx, console, request).await
        }
    }
}

async fn ask_phone(console: &mut ConsoleOperator) -> Result<PhoneNumber, AppError> {
    loop {
        let answer = console
            .read_line("Phone number (e.g. +15551234567): ")
            .await;
        let answer = answered(answer)?;
        match PhoneNumber::parse(&answer) {
            Ok(phone) => return Ok(phone),
            Err(e) => console.say(&e.to_string()),
        }
    }
}

async fn ask_method(console: &mut ConsoleOperator) -> Result<VerificationMethod, AppError> {
    loop {
        let answer = console
            .read_line("Receive the code by [s]ms or [v]oice call? [s]: ")
            .await;
        match parse_method(&answered(answer)?) {
            Some(method) => return Ok(method),
            None => console.say("Please answer s or v."),
        }
    }
}

/// An empty answer skips the captcha.
async fn ask_captcha(console: &mut ConsoleOperator) -> Result<Option<CaptchaToken>, AppError> {
    console.say("If Signal asks for a captcha, solve it at");
    console.say("  https://signalcaptchas.org/registration/generate.html");
    console.say("and copy the signalcaptcha:// link. Press Enter to try without one.");
    loop {
        let answer = console.read_line("Captcha link, token or file: ").await;
        let answer = answered(answer)?;
        if answer.trim().is_empty() {
            return Ok(None);
        }
        match captcha::extract_token(&answer) {
            Ok(token) => return Ok(Some(token)),
            Err(e) => console.say(&e.to_string()),
        }
    }
}

/// End of input at any prompt cancels the wizard.
fn answered(answer: Option<String>) -> Result<String, AppError> {
    answer.ok_or(AppError::Cancelled)
}

pub fn parse_mode(answer: &str) -> Option<Mode> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "1" | "r" | "register" => Some(Mode::Register),
        "2" | "l" | "link" | "adddevice" | "add-device" => Some(Mode::Link),
        _ => None,
    }
}

pub fn parse_method(answer: &str) -> Option<VerificationMethod> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sms" => Some(VerificationMethod::Sms),
        "v" | "voice" => Some(VerificationMethod::Voice),
        _ => None,
    }
}
