//! # Webhook Signatures
//!
//! The platform signs each webhook body with HMAC-SHA256 using the app's
//! client secret and sends the hex digest in `X-LinkedStore-HMAC-SHA256`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CloudError, CloudResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "X-LinkedStore-HMAC-SHA256";

/// Hex HMAC-SHA256 of `body`.
pub fn sign(secret: &str, body: &[u8]) -> CloudResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CloudError::InvalidSignature)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` (hex) against the raw body in constant time.
pub fn verify(secret: &str, body: &[u8], signature: Option<&str>) -> CloudResult<()> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CloudError::InvalidSignature)?;
    let expected = hex::decode(signature).map_err(|_| CloudError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CloudError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| CloudError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"id":991,"event":"order/created"}"#;
        let sig = sign("s3cret", body).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify("s3cret", body, Some(&sig)).is_ok());
        assert!(verify("s3cret", body, Some(&sig.to_uppercase())).is_ok());
    }

    #[test]
    fn test_rejects_tampered_or_missing() {
        let body = br#"{"id":991}"#;
        let sig = sign("s3cret", body).unwrap();

        assert!(verify("s3cret", br#"{"id":992}"#, Some(&sig)).is_err());
        assert!(verify("other", body, Some(&sig)).is_err());
        assert!(verify("s3cret", body, None).is_err());
        assert!(verify("s3cret", body, Some("not-hex")).is_err());
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
