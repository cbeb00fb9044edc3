//! Two-factor enrollment state machine
//!
//! `TwoFactorManager` drives the per-account lifecycle
//! `Disabled -> Pending -> Enabled`. Promotion out of `Pending` takes a
//! first valid TOTP code; leaving `Enabled` (disable, backup-code
//! regeneration) takes a currently valid proof. All state lives behind
//! the store port, so callers can be distributed across processes.

use std::sync::Arc;

use fidelius_common::{
    BackupCode, Error, Result, Secret, TwoFactorSetup, TwoFactorState, TwoFactorStatus,
};

use crate::backup;
use crate::clock::{Clock, SystemClock};
use crate::config::TwoFactorConfig;
use crate::generate::{generate_backup_codes, generate_secret};
use crate::provisioning::otpauth_uri;
use crate::store::TwoFactorStore;
use crate::totp::TotpValidator;

/// Manager for two-factor enrollment and verification
pub struct TwoFactorManager {
    store: Arc<dyn TwoFactorStore>,
    validator: TotpValidator,
    config: TwoFactorConfig,
    clock: Arc<dyn Clock>,
}

impl TwoFactorManager {
    pub fn new(store: Arc<dyn TwoFactorStore>, config: TwoFactorConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Construct with an explicit time source
    pub fn with_clock(
        store: Arc<dyn TwoFactorStore>,
        config: TwoFactorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let validator = TotpValidator::new(&config)?;

        Ok(TwoFactorManager {
            store,
            validator,
            config,
            clock,
        })
    }

    /// Begin enrollment for an account
    ///
    /// Returns the only plaintext rendering of the secret and backup
    /// codes; nothing but salted hashes is persisted. The account is not
    /// protected until `verify_enable` confirms a code.
    pub async fn setup(&self, account_id: &str) -> Result<TwoFactorSetup> {
        let state = self.store.get_state(account_id).await?;
        if state.status() != TwoFactorStatus::Disabled {
            return Err(invalid_state("setup", state.status()));
        }

        let secret = generate_secret()?;
        let plaintext = generate_backup_codes(
            self.config.backup_code_count,
            self.config.backup_code_length,
        )?;
        let records = backup::new_code_set(&plaintext)?;

        // Response is assembled before the secret moves into the state
        let setup = TwoFactorSetup {
            secret: secret.to_base32(),
            qr_code_uri: otpauth_uri(&self.config, account_id, &secret),
            backup_codes: plaintext.iter().map(|c| backup::display_code(c)).collect(),
        };

        self.store
            .set_state(
                account_id,
                TwoFactorState::Pending {
                    secret,
                    backup_codes: records,
                },
            )
            .await?;

        tracing::info!(account = %account_id, "Two-factor setup started");
        Ok(setup)
    }

    /// Confirm enrollment with a first TOTP code
    ///
    /// Only a TOTP code proves the authenticator app holds the secret;
    /// backup codes are not accepted while `Pending`.
    pub async fn verify_enable(&self, account_id: &str, code: &str) -> Result<()> {
        let state = self.store.get_state(account_id).await?;
        let status = state.status();
        let TwoFactorState::Pending {
            secret,
            backup_codes,
        } = state
        else {
            return Err(invalid_state("verify_enable", status));
        };

        let submitted = clean_totp_input(code);
        if !self
            .validator
            .verify_at(&secret, &submitted, self.clock.now_unix())?
        {
            tracing::warn!(account = %account_id, "Enrollment confirmation code rejected");
            return Err(Error::AuthenticationFailed);
        }

        self.store
            .set_state(
                account_id,
                TwoFactorState::Enabled {
                    secret,
                    backup_codes,
                },
            )
            .await?;

        tracing::info!(account = %account_id, "Two-factor enabled");
        Ok(())
    }

    /// Check a second factor at login time
    ///
    /// Accepts a current TOTP code or a live backup code. A replayed
    /// backup code fails with `BackupCodeAlreadyUsed`; everything else
    /// that does not match fails with `AuthenticationFailed`.
    pub async fn verify(&self, account_id: &str, code: &str) -> Result<()> {
        let state = self.store.get_state(account_id).await?;
        let status = state.status();
        let TwoFactorState::Enabled {
            secret,
            backup_codes,
        } = state
        else {
            return Err(invalid_state("verify", status));
        };

        self.verify_proof(account_id, &secret, &backup_codes, code)
            .await
    }

    /// Turn two-factor off
    ///
    /// Requires a currently valid proof (TOTP or a live backup code).
    /// Clears the secret and every backup code.
    pub async fn disable(&self, account_id: &str, code: &str) -> Result<()> {
        let state = self.store.get_state(account_id).await?;
        let status = state.status();
        let TwoFactorState::Enabled {
            secret,
            backup_codes,
        } = state
        else {
            return Err(invalid_state("disable", status));
        };

        self.verify_proof(account_id, &secret, &backup_codes, code)
            .await?;

        self.store
            .set_state(account_id, TwoFactorState::Disabled)
            .await?;

        tracing::info!(account = %account_id, "Two-factor disabled");
        Ok(())
    }

    /// Replace the whole backup-code set
    ///
    /// Proof required. Every previous code stops working; the fresh
    /// plaintext codes are returned exactly once.
    pub async fn regenerate_backup_codes(
        &self,
        account_id: &str,
        code: &str,
    ) -> Result<Vec<String>> {
        let state = self.store.get_state(account_id).await?;
        let status = state.status();
        let TwoFactorState::Enabled {
            secret,
            backup_codes,
        } = state
        else {
            return Err(invalid_state("regenerate_backup_codes", status));
        };

        self.verify_proof(account_id, &secret, &backup_codes, code)
            .await?;

        let plaintext = generate_backup_codes(
            self.config.backup_code_count,
            self.config.backup_code_length,
        )?;
        let records = backup::new_code_set(&plaintext)?;

        self.store
            .set_state(
                account_id,
                TwoFactorState::Enabled {
                    secret,
                    backup_codes: records,
                },
            )
            .await?;

        tracing::info!(account = %account_id, "Backup codes regenerated");
        Ok(plaintext.iter().map(|c| backup::display_code(c)).collect())
    }

    /// Whether logins on this account need a second factor
    pub async fn is_enabled(&self, account_id: &str) -> Result<bool> {
        Ok(self.store.get_state(account_id).await?.is_enabled())
    }

    pub async fn status(&self, account_id: &str) -> Result<TwoFactorStatus> {
        Ok(self.store.get_state(account_id).await?.status())
    }

    /// Count of still-usable backup codes, for settings display
    pub async fn backup_codes_remaining(&self, account_id: &str) -> Result<usize> {
        let state = self.store.get_state(account_id).await?;
        let status = state.status();
        match state.backup_codes() {
            Some(codes) => Ok(codes.iter().filter(|c| !c.consumed).count()),
            None => Err(invalid_state("backup_codes_remaining", status)),
        }
    }

    /// Check one proof against the account's secret and backup codes
    async fn verify_proof(
        &self,
        account_id: &str,
        secret: &Secret,
        backup_codes: &[BackupCode],
        code: &str,
    ) -> Result<()> {
        // Try TOTP first
        let submitted = clean_totp_input(code);
        if self
            .validator
            .verify_at(secret, &submitted, self.clock.now_unix())?
        {
            return Ok(());
        }

        let Some(normalized) = backup::normalize(code, self.config.backup_code_length) else {
            tracing::warn!(account = %account_id, "Second-factor code rejected");
            return Err(Error::AuthenticationFailed);
        };

        let Some(index) = backup::find_match(backup_codes, &normalized) else {
            tracing::warn!(account = %account_id, "Second-factor code rejected");
            return Err(Error::AuthenticationFailed);
        };

        if backup_codes[index].consumed {
            tracing::warn!(account = %account_id, "Replay of a consumed backup code");
            return Err(Error::BackupCodeAlreadyUsed);
        }

        // Compare-and-set at the store so racing requests cannot both win
        if !self
            .store
            .consume_backup_code(account_id, &backup_codes[index].hash)
            .await?
        {
            tracing::warn!(account = %account_id, "Replay of a consumed backup code");
            return Err(Error::BackupCodeAlreadyUsed);
        }

        tracing::info!(account = %account_id, "Backup code consumed");
        Ok(())
    }
}

fn invalid_state(operation: &str, status: TwoFactorStatus) -> Error {
    Error::InvalidState(format!(
        "{} not permitted while two-factor is {}",
        operation, status
    ))
}

/// Authenticator apps display codes with separators; strip them
fn clean_totp_input(code: &str) -> String {
    code.replace([' ', '-'], "")
}
