//! Lock configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LockError, Result};
use crate::mask::DEFAULT_PASSCHARS;
use crate::power::DEFAULT_SESSION_TIMEOUT;
use crate::retry::{RetryPolicy, DEFAULT_ATTEMPTS};

/// Core X font used for the prompt
pub const DEFAULT_FONT: &str = "-misc-fixed-medium-r-*--17-120-*-*-*-*-iso8859-1";

/// Default authentication service name
pub const DEFAULT_PAM_SERVICE: &str = "sxlock";

/// Settings of one lock session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Font name (X logical font description)
    pub font: String,

    /// Name shown on the lock screen; defaults to the authenticated identity
    pub username: Option<String>,

    /// Characters used to mask the typed credential
    pub passchars: String,

    /// Perturb the displayed credential length
    pub hide_length: bool,

    /// Override display power management while locked
    pub use_dpms: bool,

    /// Standby/suspend/off timeout while locked (seconds)
    pub dpms_timeout_secs: u16,

    /// Attempts per device when grabbing input
    pub grab_attempts: u32,

    /// Pause between grab attempts (microseconds)
    pub grab_interval_us: u64,

    /// Authentication service name
    pub pam_service: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            username: None,
            passchars: DEFAULT_PASSCHARS.to_string(),
            hide_length: false,
            use_dpms: true,
            dpms_timeout_secs: DEFAULT_SESSION_TIMEOUT,
            grab_attempts: DEFAULT_ATTEMPTS,
            grab_interval_us: 50,
            pam_service: DEFAULT_PAM_SERVICE.to_string(),
        }
    }
}

impl LockConfig {
    /// `$XDG_CONFIG_HOME/sxlock/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sxlock").join("config.toml"))
    }

    /// Loads and validates a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LockError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LockError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Loads `explicit` if given (it must exist), otherwise the default file.
    /// A missing or broken default file falls back to built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        match Self::load(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "ignoring configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Rejects settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.font.is_empty() {
            return Err(LockError::Config("font must not be empty".into()));
        }
        if self.passchars.is_empty() {
            return Err(LockError::Config("passchars must not be empty".into()));
        }
        if self.dpms_timeout_secs == 0 {
            return Err(LockError::Config("dpms_timeout_secs must be positive".into()));
        }
        if self.grab_attempts == 0 {
            return Err(LockError::Config("grab_attempts must be positive".into()));
        }
        if self.pam_service.is_empty() {
            return Err(LockError::Config("pam_service must not be empty".into()));
        }
        Ok(())
    }

    /// Grab budget and pacing
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.grab_attempts,
            Duration::from_micros(self.grab_interval_us),
        )
    }
}
