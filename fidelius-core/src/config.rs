///! Two-factor subsystem configuration

use fidelius_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Interoperability constants plus backup-code policy
///
/// The defaults are what standard authenticator apps expect: 6 digits,
/// a 30-second step, SHA1, one step of skew on either side. They are
/// configuration values, not negotiated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    /// Issuer shown in authenticator apps
    pub issuer: String,
    /// Code length in digits
    pub digits: u32,
    /// TOTP time step in seconds
    pub step_seconds: u64,
    /// Accepted clock skew, in steps on either side of now
    pub window_steps: u64,
    /// Number of backup codes issued per (re)generation
    pub backup_code_count: usize,
    /// Length of each backup code in characters
    pub backup_code_length: usize,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: "Fidelius".to_string(),
            digits: 6,
            step_seconds: 30,
            window_steps: 1,
            backup_code_count: 10,
            backup_code_length: 10,
        }
    }
}

impl TwoFactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_step_seconds(mut self, step_seconds: u64) -> Self {
        self.step_seconds = step_seconds;
        self
    }

    pub fn with_window_steps(mut self, window_steps: u64) -> Self {
        self.window_steps = window_steps;
        self
    }

    pub fn with_backup_code_count(mut self, count: usize) -> Self {
        self.backup_code_count = count;
        self
    }

    pub fn with_backup_code_length(mut self, length: usize) -> Self {
        self.backup_code_length = length;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.issuer.is_empty() {
            return Err(Error::InvalidConfig("issuer must not be empty".to_string()));
        }

        if !(6..=8).contains(&self.digits) {
            return Err(Error::InvalidConfig(format!(
                "digits must be between 6 and 8, got {}",
                self.digits
            )));
        }

        if self.step_seconds == 0 {
            return Err(Error::InvalidConfig(
                "step_seconds must be greater than zero".to_string(),
            ));
        }

        if self.window_steps > 2 {
            return Err(Error::InvalidConfig(format!(
                "window_steps must not exceed 2, got {}",
                self.window_steps
            )));
        }

        if self.backup_code_count == 0 {
            return Err(Error::InvalidConfig(
                "backup_code_count must be greater than zero".to_string(),
            ));
        }

        if self.backup_code_length < 8 {
            return Err(Error::InvalidConfig(format!(
                "backup_code_length must be at least 8, got {}",
                self.backup_code_length
            )));
        }

        Ok(())
    }
}
