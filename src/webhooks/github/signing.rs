use hmac::{digest::KeyInit, Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;
use tracing::trace;

/// The two signature headers GitHub may attach to a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// `X-Hub-Signature: sha1=<hex>`
    Sha1,
    /// `X-Hub-Signature-256: sha256=<hex>`
    Sha256,
}

impl SignatureScheme {
    pub fn header(self) -> &'static str {
        match self {
            Self::Sha1 => "X-Hub-Signature",
            Self::Sha256 => "X-Hub-Signature-256",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1=",
            Self::Sha256 => "sha256=",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature doesn't start with `{0}`")]
    MissingPrefix(&'static str),
    #[error("signature doesn't match payload")]
    Mismatch,
}

/// Signs `payload` the same way GitHub does, returning the lowercase hex digest without prefix.
#[cfg(test)]
pub fn sign_payload(scheme: SignatureScheme, secret: &[u8], payload: &[u8]) -> String {
    match scheme {
        SignatureScheme::Sha1 => hex::encode(digest::<Hmac<Sha1>>(secret, payload)),
        SignatureScheme::Sha256 => hex::encode(digest::<Hmac<Sha256>>(secret, payload)),
    }
}

/// Validates a prefixed signature header value against the payload.
///
/// The comparison goes through [`Mac::verify_slice`], which is constant-time with respect to the
/// computed digest.
pub fn validate_signature(
    scheme: SignatureScheme,
    secret: &[u8],
    signature: &str,
    payload: &[u8],
) -> Result<(), SignatureError> {
    trace!("validating {:?} signature...", scheme);

    // GitHub puts a prefix in front of its hex digest
    let signature = match signature.strip_prefix(scheme.prefix()) {
        Some(s) => s,
        None => {
            trace!("couldn't strip prefix from signature `{}`", signature);
            return Err(SignatureError::MissingPrefix(scheme.prefix()));
        }
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            trace!("couldn't decode hex-encoded signature {}", signature);
            return Err(SignatureError::Mismatch);
        }
    };

    let verified = match scheme {
        SignatureScheme::Sha1 => verify_mac::<Hmac<Sha1>>(secret, payload, &expected),
        SignatureScheme::Sha256 => verify_mac::<Hmac<Sha256>>(secret, payload, &expected),
    };

    if verified {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn keyed<M: Mac + KeyInit>(secret: &[u8], payload: &[u8]) -> M {
    // HMAC accepts keys of any length
    let mut mac = <M as KeyInit>::new_from_slice(secret).expect("this should never fail");
    mac.update(payload);
    mac
}

#[cfg(test)]
fn digest<M: Mac + KeyInit>(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    keyed::<M>(secret, payload).finalize().into_bytes().to_vec()
}

fn verify_mac<M: Mac + KeyInit>(secret: &[u8], payload: &[u8], expected: &[u8]) -> bool {
    keyed::<M>(secret, payload).verify_slice(expected).is_ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn verify(raw_body: &[u8], secret: &[u8], supplied_signature: &str) -> bool {
        validate_signature(SignatureScheme::Sha1, secret, supplied_signature, raw_body).is_ok()
    }

    #[test]
    fn signs_empty_object_like_github() {
        assert_eq!(
            sign_payload(SignatureScheme::Sha1, b"secret", b"{}"),
            "5d61605c3feea9799210ddcb71307d4ba264225f"
        );
        assert_eq!(
            sign_payload(SignatureScheme::Sha256, b"secret", b"{}"),
            "77325902caca812dc259733aacd046b73817372c777b8d95b402647474516e13"
        );
    }

    #[test]
    fn accepts_own_signature() {
        let body = br#"{"zen":"Keep it logically awesome."}"#;
        let signature = format!("sha1={}", sign_payload(SignatureScheme::Sha1, b"s3cr3t", body));

        assert!(verify(body, b"s3cr3t", &signature));
    }

    #[test]
    fn uppercase_hex_is_still_the_same_digest() {
        let signature = "sha1=5D61605C3FEEA9799210DDCB71307D4BA264225F";
        assert!(verify(b"{}", b"secret", signature));
    }

    #[test]
    fn rejects_any_flipped_body_bit() {
        let body = b"{\"ref\":\"refs/heads/main\"}".to_vec();
        let signature = format!("sha1={}", sign_payload(SignatureScheme::Sha1, b"secret", &body));

        for byte in 0..body.len() {
            for bit in 0..8 {
                let mut tampered = body.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    !verify(&tampered, b"secret", &signature),
                    "bit {} of byte {} went unnoticed",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn rejects_any_flipped_signature_bit() {
        let digest = digest::<Hmac<Sha1>>(b"secret", b"{}");

        for byte in 0..digest.len() {
            for bit in 0..8 {
                let mut tampered = digest.clone();
                tampered[byte] ^= 1 << bit;
                let signature = format!("sha1={}", hex::encode(&tampered));
                assert!(!verify(b"{}", b"secret", &signature));
            }
        }
    }

    #[test]
    fn missing_prefix_is_its_own_error() {
        let result = validate_signature(
            SignatureScheme::Sha1,
            b"secret",
            "5d61605c3feea9799210ddcb71307d4ba264225f",
            b"{}",
        );
        assert_eq!(result, Err(SignatureError::MissingPrefix("sha1=")));

        let result = validate_signature(
            SignatureScheme::Sha256,
            b"secret",
            "sha1=5d61605c3feea9799210ddcb71307d4ba264225f",
            b"{}",
        );
        assert_eq!(result, Err(SignatureError::MissingPrefix("sha256=")));
    }

    #[test]
    fn garbage_and_truncated_digests_mismatch() {
        for signature in ["sha1=", "sha1=zz", "sha1=5d61605c3feea979"] {
            assert_eq!(
                validate_signature(SignatureScheme::Sha1, b"secret", signature, b"{}"),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn empty_secret_still_yields_a_deterministic_digest() {
        let first = sign_payload(SignatureScheme::Sha1, b"", b"{}");
        let second = sign_payload(SignatureScheme::Sha1, b"", b"{}");
        assert_eq!(first, second);
        assert!(!verify(b"{}", b"", "sha1=5d61605c3feea9799210ddcb71307d4ba264225f"));
    }
}
