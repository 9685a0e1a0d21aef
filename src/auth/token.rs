//! Signed bearer tokens (compact HS256 JWT).
//!
//! Claims: `sub` (user id), `iat`, `exp` (unix seconds). Validity is purely
//! a function of signature and expiry at verification time; nothing is
//! stored server-side and nothing can be revoked before its `exp`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a token failed validation. Clients see the same 401 for every
/// variant; the split exists for logs and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is structurally malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has no subject")]
    MissingSubject,
    #[error("token is expired")]
    Expired,
}

/// Issues and validates access tokens with a process-wide secret, loaded
/// once at startup and constant for the process lifetime.
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Issue a token for `identity`, valid for `ttl` from now.
    pub fn issue(&self, identity: &str, ttl: Duration) -> String {
        let now = Utc::now().timestamp();
        self.encode(&serde_json::json!({
            "sub": identity,
            "iat": now,
            "exp": now + ttl.num_seconds(),
        }))
    }

    /// Verify a token and extract its subject.
    ///
    /// Nothing in the payload is trusted until the signature has checked
    /// out; expiry uses `now >= exp`, so a token is already invalid at the
    /// exact expiry instant.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(parts[0].as_bytes());
        mac.update(b".");
        mac.update(parts[1].as_bytes());
        // verify_slice is constant-time.
        if mac.verify_slice(&signature).is_err() {
            return Err(TokenError::BadSignature);
        }

        let header = decode_json(parts[0])?;
        if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(TokenError::Malformed);
        }

        let claims = decode_json(parts[1])?;
        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64())
            .ok_or(TokenError::Malformed)?;
        if Utc::now().timestamp() >= exp {
            return Err(TokenError::Expired);
        }

        match claims.get("sub").and_then(|v| v.as_str()) {
            Some(sub) if !sub.is_empty() => Ok(sub.to_string()),
            _ => Err(TokenError::MissingSubject),
        }
    }

    fn encode(&self, claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&header, &payload));
        format!("{header}.{payload}.{signature}")
    }

    fn sign(&self, header_b64: &str, payload_b64: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn decode_json(segment: &str) -> Result<serde_json::Value, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("unit-test-secret")
    }

    #[test]
    fn issue_then_validate_round_trip() {
        let token = signer().issue("user-123", Duration::minutes(30));
        assert_eq!(signer().validate(&token).unwrap(), "user-123");
    }

    #[test]
    fn token_is_three_base64url_segments() {
        let token = signer().issue("user-123", Duration::minutes(30));
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["sub"], "user-123");
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = signer().issue("user-123", Duration::seconds(-5));
        assert_eq!(signer().validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn zero_ttl_is_already_expired() {
        let token = signer().issue("user-123", Duration::seconds(0));
        assert_eq!(signer().validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = signer().issue("user-123", Duration::minutes(30));
        let other = TokenSigner::new("a different secret");
        assert_eq!(other.validate(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = signer().issue("user-123", Duration::minutes(30));
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = serde_json::json!({
            "sub": "somebody-else",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_claims.to_string());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(signer().validate(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(signer().validate(""), Err(TokenError::Malformed));
        assert_eq!(signer().validate("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(signer().validate("a.b"), Err(TokenError::Malformed));
        assert_eq!(signer().validate("a.b.c.d"), Err(TokenError::Malformed));
        assert_eq!(
            signer().validate("??not!.base64#.segments%"),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn missing_subject_is_rejected() {
        let s = signer();
        let exp = Utc::now().timestamp() + 3600;

        let no_sub = s.encode(&serde_json::json!({ "exp": exp }));
        assert_eq!(s.validate(&no_sub), Err(TokenError::MissingSubject));

        let empty_sub = s.encode(&serde_json::json!({ "sub": "", "exp": exp }));
        assert_eq!(s.validate(&empty_sub), Err(TokenError::MissingSubject));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let s = signer();
        let token = s.encode(&serde_json::json!({ "sub": "user-123" }));
        assert_eq!(s.validate(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn foreign_algorithm_header_is_rejected() {
        let s = signer();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "sub": "user-123", "exp": Utc::now().timestamp() + 3600 })
                .to_string(),
        );
        // Signed with the right key, but the header claims another algorithm.
        let signature = URL_SAFE_NO_PAD.encode(s.sign(&header, &payload));
        let token = format!("{header}.{payload}.{signature}");

        assert_eq!(s.validate(&token), Err(TokenError::Malformed));
    }
}
