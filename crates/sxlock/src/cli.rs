//! Command-line flags

use std::path::PathBuf;

use clap::Parser;
use sxlock_core::LockConfig;
use tracing::warn;

/// Simple screen locker
#[derive(Parser, Debug)]
#[command(name = "sxlock")]
#[command(about = "Simple screen locker", long_about = None)]
#[command(version, disable_version_flag = true)]
pub struct Cli {
    /// Font name (X logical font description)
    #[arg(short, long)]
    pub font: Option<String>,

    /// Username shown on the lock screen
    #[arg(short, long)]
    pub username: Option<String>,

    /// Characters used to obfuscate the password
    #[arg(short = 'p', long = "passchar")]
    pub passchar: Option<String>,

    /// Hide the password length
    #[arg(short = 'l', long = "hidelength")]
    pub hide_length: bool,

    /// Leave display power management alone
    #[arg(short = 'd', long = "nodpms")]
    pub no_dpms: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/sxlock/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

impl Cli {
    /// Overrides file settings with the given flags
    pub fn apply(&self, config: &mut LockConfig) {
        if let Some(font) = &self.font {
            config.font = font.clone();
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        match self.passchar.as_deref() {
            Some("") => warn!("-p: password characters must not be empty, using default"),
            Some(passchars) => config.passchars = passchars.to_string(),
            None => {}
        }
        if self.hide_length {
            config.hide_length = true;
        }
        if self.no_dpms {
            config.use_dpms = false;
        }
    }
}
