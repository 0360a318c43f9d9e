//! CLI argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "signal-registration")]
#[command(version, about = "Register a Signal account with signal-cli and link Signal Desktop to it")]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a phone number as the primary device
    Register(RegisterArgs),

    /// Link Signal Desktop to a registered number
    #[command(alias = "addDevice")]
    AddDevice(AddDeviceArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Phone number in international format, e.g. +15551234567
    #[arg(value_name = "PHONE")]
    pub phone: String,

    /// Captcha token or the full signalcaptcha:// link
    #[arg(long, value_name = "TOKEN", conflicts_with = "captcha_file")]
    pub captcha: Option<String>,

    /// File holding the captcha link
    #[arg(long, value_name = "PATH")]
    pub captcha_file: Option<PathBuf>,

    /// Request the code by voice call instead of SMS
    #[arg(long)]
    pub voice: bool,
}

#[derive(Args)]
pub struct AddDeviceArgs {
    /// Registered phone number
    #[arg(value_name = "PHONE")]
    pub phone: String,

    /// sgnl://linkdevice URI copied from Signal Desktop
    #[arg(long, value_name = "URI", conflicts_with = "qr_image")]
    pub uri: Option<String>,

    /// Screenshot of the QR code shown by Signal Desktop
    #[arg(long, value_name = "PATH")]
    pub qr_image: Option<PathBuf>,

    /// Name reported for the linked device
    #[arg(long, value_name = "NAME")]
    pub device_name: Option<String>,
}
