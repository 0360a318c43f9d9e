//! Configuration loaded from environment variables.

use crate::types::RetryLimits;
use anyhow::{Context, Result};
use serde::Deserialize;
use signal_client::SignalCliOptions;
use std::time::Duration;

/// Tool configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// signal-cli invocation
    #[serde(default)]
    pub signal_cli: SignalCliConfig,

    /// QR decoder invocation
    #[serde(default)]
    pub qr: QrConfig,

    /// Registration flow settings
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Device-linking flow settings
    #[serde(default)]
    pub linking: LinkingConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalCliConfig {
    /// Binary name or absolute path
    #[serde(default = "default_signal_cli_binary")]
    pub binary: String,

    /// Alternative signal-cli data directory
    #[serde(default)]
    pub config_dir: Option<String>,

    /// Timeout for each signal-cli invocation
    #[serde(default = "default_signal_cli_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Timeout for the post-link `receive`
    #[serde(default = "default_receive_timeout", with = "humantime_serde")]
    pub receive_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QrConfig {
    /// QR decoder binary
    #[serde(default = "default_qr_decoder")]
    pub decoder: String,

    /// Timeout for each decoder invocation
    #[serde(default = "default_qr_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// How many fresh captcha tokens may be requested
    #[serde(default = "default_retries")]
    pub captcha_retries: u32,

    /// How many times a rejected verification code may be re-entered
    #[serde(default = "default_retries")]
    pub code_retries: u32,

    /// How many malformed inputs are tolerated per prompt
    #[serde(default = "default_retries")]
    pub input_attempts: u32,

    /// Send a note-to-self once registered
    #[serde(default = "default_true")]
    pub send_test_message: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkingConfig {
    /// Name reported for the linked desktop
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// How many linking URIs / QR images may be tried
    #[serde(default = "default_retries")]
    pub uri_attempts: u32,

    /// Run one `receive` after linking to sync contacts and groups
    #[serde(default = "default_true")]
    pub sync_after_link: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for SignalCliConfig {
    fn default() -> Self {
        Self {
            binary: default_signal_cli_binary(),
            config_dir: None,
            timeout: default_signal_cli_timeout(),
            receive_timeout: default_receive_timeout(),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            decoder: default_qr_decoder(),
            timeout: default_qr_timeout(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            captcha_retries: default_retries(),
            code_retries: default_retries(),
            input_attempts: default_retries(),
            send_test_message: true,
        }
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            uri_attempts: default_retries(),
            sync_after_link: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_signal_cli_binary() -> String {
    signal_client::DEFAULT_BINARY.into()
}

fn default_signal_cli_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_receive_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_qr_decoder() -> String {
    crate::qr::DEFAULT_DECODER.into()
}

fn default_qr_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_device_name() -> String {
    crate::linking::DEFAULT_DEVICE_NAME.into()
}

fn default_log_level() -> String {
    "warn".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Parsing would turn "+15551234567" into a number.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// signal-cli adapter options.
    pub fn signal_cli_options(&self) -> SignalCliOptions {
        SignalCliOptions {
            binary: self.signal_cli.binary.clone(),
            config_dir: self.signal_cli.config_dir.clone(),
            timeout: self.signal_cli.timeout,
            receive_timeout: self.signal_cli.receive_timeout,
        }
    }

    /// Retry bounds for the registration flow.
    pub fn retry_limits(&self) -> RetryLimits {
        RetryLimits {
            captcha_retries: self.registration.captcha_retries,
            code_retries: self.registration.code_retries,
            input_attempts: self.registration.input_attempts,
        }
    }
}
