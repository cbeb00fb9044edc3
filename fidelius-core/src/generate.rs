///! Secret and backup-code generation
///!
///! All entropy comes from the operating system CSPRNG; an unavailable
///! entropy source surfaces as `Error::Generation` and aborts the
///! operation.

use rand::rngs::OsRng;
use rand::RngCore;

use fidelius_common::twofactor::SECRET_LEN;
use fidelius_common::{Error, Result, Secret};

/// Backup-code alphabet: 32 characters, no 0/O or 1/I. A byte masked to
/// five bits indexes it uniformly.
pub const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a fresh 160-bit shared secret
pub fn generate_secret() -> Result<Secret> {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Generation(format!("entropy source unavailable: {}", e)))?;

    Ok(Secret::from_bytes(bytes))
}

/// Generate `count` plaintext backup codes of `length` characters each
pub fn generate_backup_codes(count: usize, length: usize) -> Result<Vec<String>> {
    let mut codes = Vec::with_capacity(count);

    for _ in 0..count {
        let mut raw = vec![0u8; length];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| Error::Generation(format!("entropy source unavailable: {}", e)))?;

        let code: String = raw
            .iter()
            .map(|b| BACKUP_CODE_ALPHABET[(b & 0x1f) as usize] as char)
            .collect();
        codes.push(code);
    }

    Ok(codes)
}

/// Generate a random 16-byte salt in hex form
pub fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Generation(format!("entropy source unavailable: {}", e)))?;

    Ok(hex::encode(bytes))
}
