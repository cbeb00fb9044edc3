///! Injected time source
///!
///! Validation never reads the wall clock directly; it goes through this
///! trait so tests can replay the published algorithm vectors at fixed
///! timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of "now" for the TOTP counter
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds
    fn now_unix(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually advanced time for tests
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn at(now_unix: u64) -> Self {
        FixedClock {
            now: AtomicU64::new(now_unix),
        }
    }

    pub fn set(&self, now_unix: u64) {
        self.now.store(now_unix, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
