///! Base32 codec for shared secrets (RFC 4648)
///!
///! Encoded form is uppercase and unpadded, the alphabet authenticator
///! apps expect. Decoding is forgiving about case, surrounding
///! whitespace, and trailing padding.

use data_encoding::BASE32_NOPAD;

use crate::{Error, Result};

/// Encode bytes as uppercase unpadded base32
pub fn encode(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

/// Decode base32 input, tolerating lowercase and `=` padding
pub fn decode(input: &str) -> Result<Vec<u8>> {
    let cleaned = input.trim().trim_end_matches('=').to_ascii_uppercase();

    BASE32_NOPAD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::Decode(e.to_string()))
}
