//! HOTP code computation (RFC 4226)
//!
//! Pure counter-to-code function shared by TOTP validation and tests.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use fidelius_common::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Compute the HOTP code for a counter value
///
/// HMAC-SHA1 over the counter's 8-byte big-endian form, dynamically
/// truncated to a 31-bit integer and reduced modulo 10^digits, left
/// padded with zeros. Identical inputs always produce the identical
/// code.
pub fn hotp(key: &[u8], counter: u64, digits: u32) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| Error::Generation(format!("HMAC key setup failed: {}", e)))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);

    Ok(format!("{:0width$}", code, width = digits as usize))
}
