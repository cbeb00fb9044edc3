//! Fidelius core library
//!
//! Time-based one-time-password (TOTP) second factor: secret issuance,
//! code validation with a clock-skew window, single-use backup codes,
//! and the enrollment state machine, all over a pluggable storage port.
//! Password checks, sessions, rate limiting, and transport framing stay
//! with the embedding application.

// Code generation and validation
pub mod generate;
pub mod hotp;
pub mod totp;

// Backup codes
pub mod backup;

// Enrollment orchestration
pub mod enrollment;
pub use enrollment::TwoFactorManager;

// Configuration
pub mod config;
pub use config::TwoFactorConfig;

// Time source
pub mod clock;

// Provisioning for authenticator apps
pub mod provisioning;

// Storage
pub mod store;
