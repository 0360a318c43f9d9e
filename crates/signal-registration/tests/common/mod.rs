//! Shared test utilities: scripted stand-ins for the external tools and the
//! operator.

#![allow(dead_code)]

use async_trait::async_trait;
use signal_registration::types::{FlowOutcome, PhoneNumber};
use signal_registration::{InputRequest, Operator, QrDecoder, SignalCli};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tool_runner::{CommandRunner, ExternalCommandResult, RunnerError};

// signal-cli output used across tests.
pub const CAPTCHA_REQUIRED: &str = "Captcha required for verification, use --captcha CAPTCHA\n\
    To get the token, go to https://signalcaptchas.org/registration/generate.html\n";
pub const RATE_LIMITED: &str = "Failed to register: Rate limit exceeded: 413\n\
    Next attempt may be tried at 2024-05-01T12:00:00Z\n";
pub const INVALID_CODE: &str = "Verification failed: Invalid verification code\n";
pub const PIN_LOCKED: &str =
    "Verification failed! This number is locked with a pin. Hours remaining until reset: 167\n";
pub const LINK_EXPIRED: &str =
    "Link request error: Device link request has expired or is invalid.\n";

pub const LINKING_URI: &str = "sgnl://linkdevice?deviceId=1&pubKey=abc";

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Replays queued results in order and records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<Result<ExternalCommandResult, RunnerError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a zero exit with `stdout`.
    pub fn ok(self, stdout: &str) -> Self {
        self.respond(Ok(ExternalCommandResult::ok(stdout)))
    }

    /// Queue a non-zero exit with `stderr`.
    pub fn fails(self, exit_code: i32, stderr: &str) -> Self {
        self.respond(Ok(ExternalCommandResult::failed(exit_code, stderr)))
    }

    /// Queue an arbitrary result or invocation error.
    pub fn respond(self, response: Result<ExternalCommandResult, RunnerError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Sub-command names in call order (the first argument after `-a PHONE`).
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| match call.args.iter().position(|a| a == "-a") {
                Some(i) => call.args.get(i + 2).cloned().unwrap_or_default(),
                None => call.args.first().cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ExternalCommandResult, RunnerError> {
        self.calls.lock().unwrap().push(Call {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call: {} {:?}", program, args))
    }
}

/// Answers prompts from a fixed list and records what it was told.
#[derive(Default)]
pub struct ScriptedOperator {
    answers: VecDeque<Option<String>>,
    pub requests: Vec<InputRequest>,
    pub reports: Vec<FlowOutcome>,
    pub notices: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| Some(a.to_string())).collect(),
            ..Default::default()
        }
    }

    /// Queue a declined prompt after the existing answers.
    pub fn then_decline(mut self) -> Self {
        self.answers.push_back(None);
        self
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn provide(&mut self, request: &InputRequest) -> Option<String> {
        self.requests.push(request.clone());
        self.answers.pop_front().flatten()
    }

    fn report(&mut self, outcome: &FlowOutcome) {
        self.reports.push(outcome.clone());
    }

    fn notice(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}

pub fn phone() -> PhoneNumber {
    PhoneNumber::parse("+15551112222").unwrap()
}

pub fn signal_cli(runner: &Arc<ScriptedRunner>) -> SignalCli {
    SignalCli::new(runner.clone())
}

pub fn qr_decoder(runner: &Arc<ScriptedRunner>) -> QrDecoder {
    QrDecoder::new(runner.clone())
}
