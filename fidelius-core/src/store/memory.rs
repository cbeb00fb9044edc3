///! In-memory store for tests and single-process embedders

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use fidelius_common::{Result, TwoFactorState};

use super::TwoFactorStore;

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, TwoFactorState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TwoFactorStore for MemoryStore {
    async fn get_state(&self, account_id: &str) -> Result<TwoFactorState> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(account_id).cloned().unwrap_or_default())
    }

    async fn set_state(&self, account_id: &str, state: TwoFactorState) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        match state {
            TwoFactorState::Disabled => {
                accounts.remove(account_id);
            }
            state => {
                accounts.insert(account_id.to_string(), state);
            }
        }
        Ok(())
    }

    async fn consume_backup_code(&self, account_id: &str, hash: &str) -> Result<bool> {
        // The write lock serializes racing consumers; the first one wins
        let mut accounts = self.accounts.write().await;

        let Some(state) = accounts.get_mut(account_id) else {
            return Ok(false);
        };
        let Some(codes) = state.backup_codes_mut() else {
            return Ok(false);
        };

        for code in codes.iter_mut() {
            if code.hash == hash && !code.consumed {
                code.consumed = true;
                code.consumed_at = Some(Utc::now());
                return Ok(true);
            }
        }

        Ok(false)
    }
}
