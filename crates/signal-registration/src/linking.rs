//! Device-linking flow: attach Signal Desktop to an account that
//! signal-cli already holds.
//!
//! ```text
//! Start ──URI or QR image──▶ UriObtained ──addDevice──▶ Submitted ──▶ Linked
//! ```
//!
//! A linking URI that fails validation never reaches signal-cli.

use crate::classify::{runner_failure, MarkerClassifier, OutputClassifier};
use crate::error::{FlowError, QrError};
use crate::operator::OperatorInput;
use crate::qr::QrDecoder;
use crate::types::{FailureReason, FlowOutcome, InputKind, LinkingUri, PhoneNumber};
use signal_client::{RunnerError, SignalCli};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default name reported for the linked device.
pub const DEFAULT_DEVICE_NAME: &str = "signal-cli-desktop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkingState {
    Start,
    UriObtained(LinkingUri),
    Submitted,
    Linked,
    Failed(FailureReason),
}

/// Links one secondary device to the account `phone`.
pub struct LinkingFlow {
    phone: PhoneNumber,
    device_name: String,
    classifier: Arc<dyn OutputClassifier>,
    state: LinkingState,
}

impl LinkingFlow {
    pub fn new(phone: PhoneNumber, device_name: impl Into<String>) -> Self {
        Self {
            phone,
            device_name: device_name.into(),
            classifier: Arc::new(MarkerClassifier::for_linking()),
            state: LinkingState::Start,
        }
    }

    /// Replace the output classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn state(&self) -> &LinkingState {
        &self.state
    }

    pub fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Move the flow forward.
    ///
    /// From `Start`, `None` asks for a linking source. A pasted URI or a QR
    /// image is validated first; an invalid one leaves the flow in `Start`
    /// so the operator can try again.
    pub async fn advance(
        &mut self,
        cli: &SignalCli,
        decoder: &QrDecoder,
        input: Option<OperatorInput>,
    ) -> Result<FlowOutcome, FlowError> {
        match (&self.state, input) {
            (LinkingState::Start, None) => Ok(FlowOutcome::NeedsLinkingUri),
            (LinkingState::Start, Some(OperatorInput::LinkingUri(raw))) => {
                let uri = LinkingUri::parse(&raw)?;
                self.submit(cli, uri).await
            }
            (LinkingState::Start, Some(OperatorInput::QrImage(path))) => {
                let uri = self.decode(decoder, &path).await?;
                self.submit(cli, uri).await
            }
            (LinkingState::Start, Some(_)) => Err(FlowError::MissingInput(InputKind::LinkingSource)),
            (
                LinkingState::UriObtained(_)
                | LinkingState::Submitted
                | LinkingState::Linked
                | LinkingState::Failed(_),
                _,
            ) => Err(FlowError::Finished),
        }
    }

    async fn decode(&self, decoder: &QrDecoder, image: &Path) -> Result<LinkingUri, FlowError> {
        info!(image = %image.display(), "Decoding linking QR code");
        decoder.decode(image).await.map_err(|e| match e {
            QrError::Tool(RunnerError::ToolNotFound(program)) => FlowError::ToolNotFound(program),
            other => FlowError::Qr(other),
        })
    }

    async fn submit(&mut self, cli: &SignalCli, uri: LinkingUri) -> Result<FlowOutcome, FlowError> {
        self.transition(LinkingState::UriObtained(uri.clone()));
        info!(
            phone_number = %self.phone,
            device_name = %self.device_name,
            "Submitting linking URI"
        );

        let result = cli.add_device(self.phone.as_str(), uri.as_str()).await;
        self.transition(LinkingState::Submitted);

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                let reason = runner_failure(e)?;
                return Ok(self.fail(reason));
            }
        };

        match self.classifier.classify(&result) {
            FlowOutcome::Success => {
                info!(device_name = %self.device_name, "Device linked");
                self.transition(LinkingState::Linked);
                Ok(FlowOutcome::Success)
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

    fn fail(&mut self, reason: FailureReason) -> FlowOutcome {
        warn!(phone_number = %self.phone, reason = %reason, "Linking failed");
        self.transition(LinkingState::Failed(reason.clone()));
        FlowOutcome::Failed(reason)
    }

    fn transition(&mut self, next: LinkingState) {
        debug!(from = ?self.state, to = ?next, "Linking state transition");
        self.state = next;
    }
}
