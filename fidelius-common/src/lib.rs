//! Common types shared between fidelius-core and its embedders

pub mod base32;
pub mod twofactor;

pub use twofactor::{BackupCode, Secret, TwoFactorSetup, TwoFactorState, TwoFactorStatus};

/// Two-factor subsystem error types
///
/// Messages never contain secret material or a submitted code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid base32 data: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Backup code already used")]
    BackupCodeAlreadyUsed,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
