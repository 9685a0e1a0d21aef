//! Password hashing (PBKDF2-SHA256, PHC string format).
//!
//! The salt and round count are embedded in the produced string, so `verify`
//! needs no configuration and keeps working after the round count changes.

use anyhow::Result;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;

/// Default PBKDF2 round count (OWASP recommendation for SHA-256).
pub const DEFAULT_ROUNDS: u32 = 600_000;

/// Salt byte length before base64 encoding.
const SALT_BYTES: usize = 16;

/// Hash a password with a fresh random salt. Two calls with the same input
/// produce different strings.
pub fn hash(plaintext: &str, rounds: u32) -> Result<String> {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)
        .map_err(|e| anyhow::anyhow!("salt encoding failed: {e}"))?;

    let params = Params {
        rounds,
        output_length: 32,
    };
    let hash = Pbkdf2
        .hash_password_customized(plaintext.as_bytes(), None, None, params, &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed input is a
/// mismatch, never a panic or an error.
pub fn verify(plaintext: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Pbkdf2.verify_password(plaintext.as_bytes(), &parsed).is_ok()
}

// ── Tests ───────────────────────────────────────────────────────────
