//! Registration, login, and bearer-session resolution.

pub mod password;
pub mod token;

use std::sync::Arc;

use chrono::Duration;

use crate::error::ApiError;
use crate::store::{NoteStore, User};
use token::TokenSigner;

/// Orchestrates the store, the password hasher, and the token signer.
pub struct AuthService {
    store: Arc<NoteStore>,
    signer: TokenSigner,
    token_ttl: Duration,
    pbkdf2_rounds: u32,
}

impl AuthService {
    pub fn new(
        store: Arc<NoteStore>,
        secret: &str,
        token_ttl_minutes: i64,
        pbkdf2_rounds: u32,
    ) -> Self {
        Self {
            store,
            signer: TokenSigner::new(secret),
            token_ttl: Duration::minutes(token_ttl_minutes),
            pbkdf2_rounds,
        }
    }

    /// Create an account. Fails with `EmailTaken` if the email is already
    /// registered.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ApiError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Name cannot be empty".into()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::BadRequest("A valid email is required".into()));
        }

        if self.store.find_user_by_email(email)?.is_some() {
            return Err(ApiError::EmailTaken);
        }

        let password_hash = password::hash(password, self.pbkdf2_rounds)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        // The UNIQUE constraint backs the pre-check: a concurrent register
        // for the same email still comes out as EmailTaken here.
        let user = self.store.create_user(name, email, &password_hash)?;
        tracing::info!(user_id = %user.user_id, "user registered");
        Ok(user)
    }

    /// Exchange email + password for a bearer token.
    ///
    /// The failure is uniform: a missing account and a wrong password both
    /// report `InvalidCredentials`, so responses do not reveal which emails
    /// are registered.
    pub fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let Some(user) = self.store.find_user_by_email(email.trim())? else {
            // Dummy hash to keep timing uniform with the verify path.
            let _ = password::hash(password, self.pbkdf2_rounds);
            return Err(ApiError::InvalidCredentials);
        };
        if !password::verify(password, &user.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(self.signer.issue(&user.user_id, self.token_ttl))
    }

    /// Resolve a bearer token to a live user.
    ///
    /// A structurally valid token is not enough: the subject must still
    /// exist in the store, so a stale token for a removed account fails the
    /// same way as a forged one.
    pub fn resolve(&self, raw_token: &str) -> Result<User, ApiError> {
        let user_id = self.signer.validate(raw_token).map_err(|err| {
            tracing::debug!("token rejected: {err}");
            ApiError::Unauthenticated
        })?;
        match self.store.find_user_by_id(&user_id)? {
            Some(user) => Ok(user),
            None => Err(ApiError::Unauthenticated),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
