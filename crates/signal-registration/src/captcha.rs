//! Captcha token normalisation.
//!
//! The token reaches us in several shapes: the bare token, the copied
//! `signalcaptcha://` link, a line of browser console output containing the
//! link, or a file holding any of these.

use crate::error::ValidationError;
use crate::types::{CaptchaToken, CAPTCHA_SCHEME};
use std::path::Path;

/// Extract a captcha token from operator input.
///
/// If `raw` names an existing file its contents are used instead.
pub fn extract_token(raw: &str) -> Result<CaptchaToken, ValidationError> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && !trimmed.contains(CAPTCHA_SCHEME) && Path::new(trimmed).is_file() {
        return read_token_file(Path::new(trimmed));
    }
    normalize(trimmed)
}

/// Read and normalise a token stored in `path`.
pub fn read_token_file(path: &Path) -> Result<CaptchaToken, ValidationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ValidationError::CaptchaFile {
        path: path.display().to_string(),
        source: e,
    })?;
    normalize(&content)
}

fn normalize(text: &str) -> Result<CaptchaToken, ValidationError> {
    let text = strip_quotes(text.trim());

    let token = match text.find(CAPTCHA_SCHEME) {
        // Console output may surround the link with quotes and prose.
        Some(start) => text[start + CAPTCHA_SCHEME.len()..]
            .split(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            .next()
            .unwrap_or_default(),
        None => text,
    };

    CaptchaToken::new(token.trim_end_matches('/'))
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'').trim()
}
