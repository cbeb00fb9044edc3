//! Persistence port for enrollment state

use async_trait::async_trait;

use fidelius_common::{Result, TwoFactorState};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage backend for per-account two-factor state
///
/// An account with no stored record reads back as
/// `TwoFactorState::Disabled`. `consume_backup_code` is compare-and-set:
/// of any number of racing callers presenting the same code, exactly one
/// observes `true`.
#[async_trait]
pub trait TwoFactorStore: Send + Sync {
    /// Load the enrollment state for an account
    async fn get_state(&self, account_id: &str) -> Result<TwoFactorState>;

    /// Replace the enrollment state for an account
    async fn set_state(&self, account_id: &str, state: TwoFactorState) -> Result<()>;

    /// Mark one backup code consumed if it is still live
    ///
    /// Returns `true` only when this call performed the flip; a consumed
    /// or unknown hash returns `false`.
    async fn consume_backup_code(&self, account_id: &str, hash: &str) -> Result<bool>;
}
