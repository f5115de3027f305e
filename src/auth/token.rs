//! API token issuance and verification.
//!
//! Clients hold `kubebill_<lookup>_<secret>`. The store keeps the lookup in
//! clear (to find the row) and an Argon2id hash of the whole string.

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Token, User};

const TOKEN_PREFIX: &str = "kubebill";
const LOOKUP_LENGTH: usize = 8;
const SECRET_BYTES: usize = 12;
const SECRET_LENGTH: usize = SECRET_BYTES * 2;

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Plaintext token as handed to a client. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    lookup: String,
    secret: String,
}

impl RawToken {
    fn random() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let mut lookup = Uuid::new_v4().simple().to_string();
        lookup.truncate(LOOKUP_LENGTH);

        Self {
            lookup,
            secret: hex::encode(bytes),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or(Error::InvalidTokenFormat)?;
        let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

        let well_formed = lookup.len() == LOOKUP_LENGTH
            && secret.len() == SECRET_LENGTH
            && lookup.chars().all(|c| c.is_ascii_alphanumeric())
            && secret.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(Error::InvalidTokenFormat);
        }

        Ok(Self {
            lookup: lookup.to_string(),
            secret: secret.to_string(),
        })
    }

    #[must_use]
    pub fn lookup(&self) -> &str {
        &self.lookup
    }
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOKEN_PREFIX}_{}_{}", self.lookup, self.secret)
    }
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("argon2 params are constant and valid");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Panel operator token; not tied to any user.
    pub fn issue_admin(&self) -> Result<(Token, String)> {
        self.issue(true, None, None)
    }

    /// Token that acts as `user` on the billing routes.
    pub fn issue_for_user(
        &self,
        user: &User,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(Token, String)> {
        self.issue(false, Some(user.id.clone()), expires_at)
    }

    /// Returns the record to persist and the plaintext to show once.
    fn issue(
        &self,
        is_admin: bool,
        user_id: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(Token, String)> {
        let raw = RawToken::random();
        let plaintext = raw.to_string();

        let token = Token {
            id: Uuid::new_v4().to_string(),
            token_hash: self.hash(&plaintext)?,
            token_lookup: raw.lookup,
            is_admin,
            user_id,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };
        Ok((token, plaintext))
    }

    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))
    }

    /// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}
