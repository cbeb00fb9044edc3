///! Two-factor enrollment types
///!
///! The enrollment state is a tagged variant so that a populated secret
///! with no pending or enabled marker cannot be represented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{base32, Error, Result};

/// Shared secret length in bytes (160 bits, RFC 4226 recommendation)
pub const SECRET_LEN: usize = 20;

/// Opaque TOTP shared secret
///
/// The base32 form exists for provisioning and storage; `Debug` output
/// is redacted so the secret cannot reach a log line by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Secret(bytes)
    }

    /// Parse the base32 textual form back into a secret
    pub fn from_base32(input: &str) -> Result<Self> {
        let bytes = base32::decode(input)?;
        let bytes: [u8; SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Decode(format!("secret must be {} bytes", SECRET_LEN)))?;
        Ok(Secret(bytes))
    }

    pub fn to_base32(&self) -> String {
        base32::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(redacted)")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Secret::from_base32(&s).map_err(serde::de::Error::custom)
    }
}

/// Stored form of a single backup code
///
/// Only the salted hash is kept; `consumed` moves from false to true
/// exactly once and never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupCode {
    pub salt: String,
    pub hash: String,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl BackupCode {
    pub fn new(salt: String, hash: String) -> Self {
        BackupCode {
            salt,
            hash,
            consumed: false,
            consumed_at: None,
        }
    }
}

/// Enrollment status discriminant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TwoFactorStatus {
    Disabled,
    Pending,
    Enabled,
}

impl std::fmt::Display for TwoFactorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Pending => write!(f, "pending"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

/// Two-factor enrollment state for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TwoFactorState {
    /// Two-factor is off
    #[default]
    Disabled,
    /// Secret issued, waiting for the user to confirm a first code
    Pending {
        secret: Secret,
        backup_codes: Vec<BackupCode>,
    },
    /// A second factor is required on the account
    Enabled {
        secret: Secret,
        backup_codes: Vec<BackupCode>,
    },
}

impl TwoFactorState {
    pub fn status(&self) -> TwoFactorStatus {
        match self {
            Self::Disabled => TwoFactorStatus::Disabled,
            Self::Pending { .. } => TwoFactorStatus::Pending,
            Self::Enabled { .. } => TwoFactorStatus::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    pub fn secret(&self) -> Option<&Secret> {
        match self {
            Self::Disabled => None,
            Self::Pending { secret, .. } | Self::Enabled { secret, .. } => Some(secret),
        }
    }

    pub fn backup_codes(&self) -> Option<&[BackupCode]> {
        match self {
            Self::Disabled => None,
            Self::Pending { backup_codes, .. } | Self::Enabled { backup_codes, .. } => {
                Some(backup_codes)
            }
        }
    }

    pub fn backup_codes_mut(&mut self) -> Option<&mut Vec<BackupCode>> {
        match self {
            Self::Disabled => None,
            Self::Pending { backup_codes, .. } | Self::Enabled { backup_codes, .. } => {
                Some(backup_codes)
            }
        }
    }
}

/// Setup payload returned to the caller exactly once
///
/// Carries the only plaintext rendering of the backup codes; nothing in
/// here is persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub qr_code_uri: String,
    pub backup_codes: Vec<String>,
}
