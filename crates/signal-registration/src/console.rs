//! Terminal operator.

use async_trait::async_trait;
use signal_registration::types::{FlowOutcome, InputKind};
use signal_registration::{InputRequest, Operator};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

/// Prompts on stdout and reads answers from stdin.
pub struct ConsoleOperator {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one line. `None` on end of input.
    pub async fn read_line(&mut self, prompt: &str) -> Option<String> {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }

    /// Read a line without echoing it.
    async fn read_secret(&mut self, prompt: String) -> Option<String> {
        let read = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt)).await;
        match read {
            Ok(Ok(secret)) => Some(secret),
            Ok(Err(e)) => {
                debug!(error = %e, "Failed to read secret");
                None
            }
            Err(e) => {
                debug!(error = %e, "Secret prompt task failed");
                None
            }
        }
    }

    pub fn say(&self, text: &str) {
        println!("{}", text);
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn provide(&mut self, request: &InputRequest) -> Option<String> {
        let prompt = prompt_text(request);
        match request.kind {
            InputKind::Pin => self.read_secret(prompt).await,
            _ => self.read_line(&prompt).await,
        }
    }

    fn report(&mut self, outcome: &FlowOutcome) {
        match outcome {
            FlowOutcome::Success => println!("==> Done."),
            outcome if outcome.input_needed().is_some() => {
                println!("==> {}", capitalize(&outcome.to_string()));
                println!("    {}", outcome.next_action());
            }
            outcome => println!("==> {}", capitalize(&outcome.to_string())),
        }
    }

    fn notice(&mut self, text: &str) {
        println!("{}", text);
    }
}

fn prompt_text(request: &InputRequest) -> String {
    let label = match request.kind {
        InputKind::CaptchaToken => "Captcha link or token",
        InputKind::VerificationCode => "Verification code",
        InputKind::Pin => "Registration lock PIN",
        InputKind::LinkingSource => "Linking URI or QR screenshot path",
    };
    if request.is_retry() {
        format!(
            "{} (attempt {}/{}): ",
            label, request.attempt, request.max_attempts
        )
    } else {
        format!("{}: ", label)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
