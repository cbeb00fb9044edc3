//! otpauth:// provisioning URI for authenticator apps

use fidelius_common::Secret;

use crate::config::TwoFactorConfig;

/// Hash algorithm advertised in the URI; fixed to what rfc6238 mandates
/// for interoperability and what every major authenticator implements.
const ALGORITHM: &str = "SHA1";

/// Build the Key Uri Format string encoded into the enrollment QR code
///
/// Issuer appears both in the label prefix and as a query parameter;
/// some authenticator apps only read one of the two.
pub fn otpauth_uri(config: &TwoFactorConfig, account_label: &str, secret: &Secret) -> String {
    let issuer = urlencoding::encode(&config.issuer);
    let label = urlencoding::encode(account_label);

    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm={}&digits={}&period={}",
        issuer,
        label,
        secret.to_base32(),
        issuer,
        ALGORITHM,
        config.digits,
        config.step_seconds,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> Secret {
        Secret::from_bytes(*b"12345678901234567890")
    }

    #[test]
    fn test_uri_shape() {
        let config = TwoFactorConfig::default();
        let uri = otpauth_uri(&config, "alice@example.com", &test_secret());

        assert_eq!(
            uri,
            "otpauth://totp/Fidelius:alice%40example.com\
             ?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ\
             &issuer=Fidelius&algorithm=SHA1&digits=6&period=30"
        );
    }

    #[test]
    fn test_uri_escapes_issuer() {
        let config = TwoFactorConfig::default().with_issuer("Fidelius Ops");
        let uri = otpauth_uri(&config, "alice", &test_secret());

        assert!(uri.starts_with("otpauth://totp/Fidelius%20Ops:alice?"));
        assert!(uri.contains("&issuer=Fidelius%20Ops&"));
    }

    #[test]
    fn test_uri_reflects_config() {
        let config = TwoFactorConfig::default()
            .with_digits(8)
            .with_step_seconds(60);
        let uri = otpauth_uri(&config, "alice", &test_secret());

        assert!(uri.ends_with("&digits=8&period=60"));
    }
}
