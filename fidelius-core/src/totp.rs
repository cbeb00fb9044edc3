//! TOTP window validation (RFC 6238)

use subtle::ConstantTimeEq;

use fidelius_common::{Result, Secret};

use crate::config::TwoFactorConfig;
use crate::hotp::hotp;

/// Validates submitted codes against the time-derived counter, with a
/// skew window on either side of now
///
/// Side-effect free: no replay tracking, safe to run in parallel across
/// accounts and attempts. Brute-force rate limiting belongs to the
/// caller.
#[derive(Debug, Clone)]
pub struct TotpValidator {
    digits: u32,
    step_seconds: u64,
    window_steps: u64,
}

impl TotpValidator {
    /// Build a validator; fails with `InvalidConfig` when the
    /// configuration does not pass `TwoFactorConfig::validate`
    pub fn new(config: &TwoFactorConfig) -> Result<Self> {
        config.validate()?;

        Ok(TotpValidator {
            digits: config.digits,
            step_seconds: config.step_seconds,
            window_steps: config.window_steps,
        })
    }

    /// Counter value for a Unix timestamp
    pub fn counter_at(&self, now_unix: u64) -> u64 {
        now_unix / self.step_seconds
    }

    /// The code an authenticator app shows at `now_unix`
    pub fn code_at(&self, secret: &Secret, now_unix: u64) -> Result<String> {
        hotp(secret.as_bytes(), self.counter_at(now_unix), self.digits)
    }

    /// Check a submitted code against the current window
    ///
    /// Input that is not exactly `digits` ASCII digits is rejected
    /// before any HMAC work. Comparison is constant-time.
    pub fn verify_at(&self, secret: &Secret, submitted: &str, now_unix: u64) -> Result<bool> {
        if submitted.len() != self.digits as usize
            || !submitted.bytes().all(|b| b.is_ascii_digit())
        {
            return Ok(false);
        }

        let current = self.counter_at(now_unix);
        let window = self.window_steps as i64;

        for offset in -window..=window {
            // Counters below zero cannot exist
            let Some(counter) = current.checked_add_signed(offset) else {
                continue;
            };

            let expected = hotp(secret.as_bytes(), counter, self.digits)?;
            if bool::from(expected.as_bytes().ct_eq(submitted.as_bytes())) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
