//! RS256 JWT assembly over a pluggable signer
//!
//! The signing input is built by hand (base64url header `.` base64url
//! claims) instead of going through a JWT library's signing entry point, so
//! that a hardware signer can produce the signature without ever exposing
//! the private key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};
use steward_domain::{Result, StewardError};

use super::ports::Signer;

/// Build a signed RS256 JWT from the given claim set.
///
/// # Errors
/// Returns `StewardError::Signer` when the signer fails, or `Internal` when
/// the claims cannot be serialized.
pub fn signed_jwt(signer: &dyn Signer, claims: &Value) -> Result<String> {
    let header = json!({
        "alg": "RS256",
        "typ": "JWT",
        "kid": signer.key_id(),
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(encode_json(&header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(encode_json(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = signer.sign(signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

fn encode_json(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| StewardError::Internal(format!("failed to serialize JWT part: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
            // Deterministic stand-in signature; structure is what's tested.
            Ok(message.iter().rev().copied().take(8).collect())
        }

        fn key_id(&self) -> &str {
            "test-key-1"
        }
    }

    #[test]
    fn produces_three_base64url_segments() {
        let claims = json!({"iss": "svc@example.com", "aud": "https://oauth2.example.com/token"});
        let jwt = signed_jwt(&FixedSigner, &claims).unwrap();

        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert!(URL_SAFE_NO_PAD.decode(part).is_ok());
        }
    }

    #[test]
    fn header_carries_algorithm_and_key_id() {
        let jwt = signed_jwt(&FixedSigner, &json!({"iss": "svc"})).unwrap();
        let header_b64 = jwt.split('.').next().unwrap();
        let header: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();

        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "test-key-1");
    }

    #[test]
    fn signature_covers_header_and_claims() {
        let jwt = signed_jwt(&FixedSigner, &json!({"iss": "svc"})).unwrap();
        let mut parts = jwt.split('.');
        let header = parts.next().unwrap();
        let claims = parts.next().unwrap();
        let signature = URL_SAFE_NO_PAD.decode(parts.next().unwrap()).unwrap();

        let signing_input = format!("{header}.{claims}");
        let expected: Vec<u8> = signing_input.bytes().rev().take(8).collect();
        assert_eq!(signature, expected);
    }
}
