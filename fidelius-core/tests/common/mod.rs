//! Common test utilities and helpers

use std::sync::Arc;

use fidelius_common::Secret;
use fidelius_core::clock::FixedClock;
use fidelius_core::store::MemoryStore;
use fidelius_core::totp::TotpValidator;
use fidelius_core::{TwoFactorConfig, TwoFactorManager};
use tracing_subscriber::EnvFilter;

/// Fixed wall-clock instant the tests enroll at
pub const T0: u64 = 1_700_000_000;

/// Install a test subscriber; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Manager over a fresh in-memory store with a controllable clock
pub fn memory_manager() -> (TwoFactorManager, Arc<FixedClock>) {
    init_tracing();

    let clock = Arc::new(FixedClock::at(T0));
    let manager = TwoFactorManager::with_clock(
        Arc::new(MemoryStore::new()),
        TwoFactorConfig::default(),
        clock.clone(),
    )
    .expect("default config is valid");

    (manager, clock)
}

/// The code an authenticator app holding `secret_base32` shows at `now`
pub fn code_at(secret_base32: &str, now: u64) -> String {
    let secret = Secret::from_base32(secret_base32).expect("setup secret parses");
    TotpValidator::new(&TwoFactorConfig::default())
        .expect("default config is valid")
        .code_at(&secret, now)
        .expect("code computation succeeds")
}
