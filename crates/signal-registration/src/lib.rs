//! Signal account registration and device linking on top of signal-cli.
//!
//! Two flows are provided:
//!
//! - [`RegistrationFlow`] registers a phone number with signal-cli as the
//!   primary device (captcha, SMS or voice code, optional registration lock
//!   PIN).
//! - [`LinkingFlow`] links Signal Desktop to that account from a pasted
//!   `sgnl://linkdevice` URI or a screenshot of its QR code.
//!
//! Flows never prompt on their own. They return a [`FlowOutcome`] naming the
//! input they need; the [`driver`] functions close the loop with an
//! [`Operator`].

pub mod captcha;
pub mod classify;
pub mod config;
pub mod driver;
pub mod error;
pub mod linking;
pub mod operator;
pub mod preflight;
pub mod qr;
pub mod registration;
pub mod types;

pub use classify::{MarkerClassifier, Markers, OutputClassifier};
pub use config::Config;
pub use error::{AppError, FlowError, QrError, ValidationError};
pub use linking::{LinkingFlow, LinkingState};
pub use operator::{InputRequest, Operator, OperatorInput};
pub use qr::QrDecoder;
pub use registration::{RegistrationFlow, RegistrationState};
pub use signal_client::{SignalCli, VerificationMethod};
pub use types::*;
