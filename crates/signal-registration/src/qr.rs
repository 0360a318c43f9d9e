//! Linking URI extraction from QR code screenshots.
//!
//! Pixel decoding is delegated to an external decoder (zbar's `zbarimg`);
//! this module only runs it and checks what comes back.

use crate::error::QrError;
use crate::types::{LinkingUri, LINKING_URI_PREFIX};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tool_runner::CommandRunner;
use tracing::{debug, instrument, warn};

/// Default decoder binary.
pub const DEFAULT_DECODER: &str = "zbarimg";

/// zbarimg exits with 4 when the image holds no barcode.
const NO_SYMBOLS_EXIT: i32 = 4;

/// Label zbarimg prints before each symbol when `--raw` is not honoured.
const SYMBOL_LABEL: &str = "QR-Code:";

/// Runs the external QR decoder.
#[derive(Clone)]
pub struct QrDecoder {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl QrDecoder {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: DEFAULT_DECODER.into(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Use a different decoder binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the decoder timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Decode the linking URI from the QR code in `image`.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn decode(&self, image: &Path) -> Result<LinkingUri, QrError> {
        if !image.is_file() {
            return Err(QrError::DecodeFailed(format!(
                "image {} does not exist",
                image.display()
            )));
        }

        let args = vec![
            "--quiet".to_string(),
            "--raw".to_string(),
            image.display().to_string(),
        ];
        let result = self.runner.run(&self.program, &args, self.timeout).await?;

        if result.exit_code == NO_SYMBOLS_EXIT {
            debug!("Decoder found no symbols");
            return Err(QrError::DecodeFailed(format!(
                "no QR code detected in {}",
                image.display()
            )));
        }

        let payload = match extract_payload(&result.stdout) {
            Some(payload) => payload,
            None if result.success() => {
                return Err(QrError::DecodeFailed("decoder returned no data".into()))
            }
            None => {
                warn!(exit_code = result.exit_code, "Decoder failed");
                return Err(QrError::DecodeFailed(result.failure_text().to_string()));
            }
        };

        LinkingUri::parse(&payload).map_err(|_| QrError::InvalidLinkingUri(payload))
    }
}

/// Pick the decoded text out of decoder output.
///
/// Prefers a line carrying the linking prefix; otherwise the first
/// non-empty line.
pub fn extract_payload(output: &str) -> Option<String> {
    let lines: Vec<&str> = output
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(SYMBOL_LABEL).unwrap_or(line).trim()
        })
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .find(|line| line.starts_with(LINKING_URI_PREFIX))
        .or_else(|| lines.first())
        .map(|line| line.to_string())
}
