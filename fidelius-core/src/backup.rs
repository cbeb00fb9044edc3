///! Backup code hashing and matching
///!
///! Plaintext backup codes exist only in the setup response. Storage
///! keeps a per-code salted SHA-256 hash, so a leaked state record
///! cannot be replayed as a login.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use fidelius_common::{BackupCode, Result};

use crate::generate::{generate_salt, BACKUP_CODE_ALPHABET};

/// Hash one backup code under its salt
pub fn hash_code(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build storage records for freshly generated plaintext codes
pub fn new_code_set(codes: &[String]) -> Result<Vec<BackupCode>> {
    let mut records = Vec::with_capacity(codes.len());
    for code in codes {
        let salt = generate_salt()?;
        let hash = hash_code(&salt, code);
        records.push(BackupCode::new(salt, hash));
    }
    Ok(records)
}

/// Canonicalize a submitted backup code
///
/// Strips whitespace and dashes and uppercases, then requires the
/// result to be exactly `expected_length` characters from the code
/// alphabet. Returns `None` for anything else.
pub fn normalize(submitted: &str, expected_length: usize) -> Option<String> {
    let cleaned: String = submitted
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() != expected_length {
        return None;
    }
    if !cleaned.bytes().all(|b| BACKUP_CODE_ALPHABET.contains(&b)) {
        return None;
    }

    Some(cleaned)
}

/// Find the record matching a normalized code
///
/// Consumed records still match; the caller tells a replayed code apart
/// from an unknown one. Every record is hashed and compared so the scan
/// cost does not depend on where the match sits.
pub fn find_match(records: &[BackupCode], normalized: &str) -> Option<usize> {
    let mut found = None;
    for (index, record) in records.iter().enumerate() {
        let candidate = hash_code(&record.salt, normalized);
        let matches = bool::from(candidate.as_bytes().ct_eq(record.hash.as_bytes()));
        if matches && found.is_none() {
            found = Some(index);
        }
    }
    found
}

/// Render a code with the dash users see during setup
///
/// Short or non-ASCII input comes back unchanged; generated codes are
/// always ASCII.
pub fn display_code(code: &str) -> String {
    if code.len() < 6 || !code.is_ascii() {
        return code.to_string();
    }
    let (head, tail) = code.split_at(code.len() / 2);
    format!("{}-{}", head, tail)
}
