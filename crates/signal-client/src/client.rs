//! signal-cli subprocess adapter.

use crate::types::{SignalCliOptions, VerificationMethod};
use std::sync::Arc;
use std::time::Duration;
use tool_runner::{CommandRunner, ExternalCommandResult, RunnerError};
use tracing::{debug, instrument};

/// Adapter that turns account operations into signal-cli invocations.
///
/// Every method returns the raw [`ExternalCommandResult`]; deciding what a
/// non-zero exit means is up to the caller.
#[derive(Clone)]
pub struct SignalCli {
    runner: Arc<dyn CommandRunner>,
    options: SignalCliOptions,
}

impl SignalCli {
    /// Create an adapter with default options.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_options(runner, SignalCliOptions::default())
    }

    /// Create an adapter with explicit options.
    pub fn with_options(runner: Arc<dyn CommandRunner>, options: SignalCliOptions) -> Self {
        Self { runner, options }
    }

    /// The binary this adapter invokes.
    pub fn binary(&self) -> &str {
        &self.options.binary
    }

    pub fn options(&self) -> &SignalCliOptions {
        &self.options
    }

    /// Run signal-cli with an arbitrary argument list.
    pub async fn run(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<ExternalCommandResult, RunnerError> {
        self.runner.run(&self.options.binary, args, timeout).await
    }

    /// `signal-cli --version`, used to confirm the tool is installed.
    #[instrument(skip(self))]
    pub async fn version(&self) -> Result<ExternalCommandResult, RunnerError> {
        self.run(&["--version".to_string()], self.options.timeout).await
    }

    /// Ask Signal to send a verification code to `account`.
    ///
    /// `captcha` is passed through as-is and should be the full
    /// `signalcaptcha://` URI.
    #[instrument(skip(self, captcha))]
    pub async fn register(
        &self,
        account: &str,
        method: VerificationMethod,
        captcha: Option<&str>,
    ) -> Result<ExternalCommandResult, RunnerError> {
        let mut sub = vec!["register"];
        sub.extend_from_slice(method.register_flags());
        if let Some(captcha) = captcha {
            sub.push("--captcha");
            sub.push(captcha);
        }

        debug!(method = %method, has_captcha = captcha.is_some(), "Requesting verification code");
        self.account_command(account, &sub, self.options.timeout).await
    }

    /// Submit the verification code, with the registration lock PIN if set.
    #[instrument(skip(self, code, pin))]
    pub async fn verify(
        &self,
        account: &str,
        code: &str,
        pin: Option<&str>,
    ) -> Result<ExternalCommandResult, RunnerError> {
        let mut sub = vec!["verify", code];
        if let Some(pin) = pin {
            sub.push("--pin");
            sub.push(pin);
        }

        self.account_command(account, &sub, self.options.timeout).await
    }

    /// Link a new secondary device using its `sgnl://linkdevice` URI.
    #[instrument(skip(self, uri))]
    pub async fn add_device(
        &self,
        account: &str,
        uri: &str,
    ) -> Result<ExternalCommandResult, RunnerError> {
        self.account_command(account, &["addDevice", "--uri", uri], self.options.timeout)
            .await
    }

    /// List the devices attached to `account`.
    #[instrument(skip(self))]
    pub async fn list_devices(&self, account: &str) -> Result<ExternalCommandResult, RunnerError> {
        self.account_command(account, &["listDevices"], self.options.timeout).await
    }

    /// Send a message to the account's own note-to-self thread.
    #[instrument(skip(self, message))]
    pub async fn send_note_to_self(
        &self,
        account: &str,
        message: &str,
    ) -> Result<ExternalCommandResult, RunnerError> {
        self.account_command(
            account,
            &["send", "--note-to-self", "-m", message],
            self.options.timeout,
        )
        .await
    }

    /// Drain pending messages for `account`.
    #[instrument(skip(self))]
    pub async fn receive(&self, account: &str) -> Result<ExternalCommandResult, RunnerError> {
        self.account_command(account, &["receive"], self.options.receive_timeout)
            .await
    }

    async fn account_command(
        &self,
        account: &str,
        sub: &[&str],
        timeout: Duration,
    ) -> Result<ExternalCommandResult, RunnerError> {
        let args = self.account_args(account, sub);
        self.run(&args, timeout).await
    }

    fn account_args(&self, account: &str, sub: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(sub.len() + 4);
        if let Some(dir) = &self.options.config_dir {
            args.push("--config".to_string());
            args.push(dir.clone());
        }
        args.push("-a".to_string());
        args.push(account.to_string());
        args.extend(sub.iter().map(|s| s.to_string()));
        args
    }
}
