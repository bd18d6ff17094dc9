//! Salted password hashing with argon2id.
//!
//! Stored values are PHC strings (`$argon2id$v=19$...`). Rows written before
//! hashing was introduced hold the plaintext password; those still verify by
//! equality and are reported as [`Verification::LegacyMatch`] so the caller
//! can rehash them.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
};
use tracing::warn;

use br_core::config::AuthConfig;
use br_core::error::{BrError, BrResult};

/// Outcome of checking a password against a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Match,
    /// Matched a plaintext row. The row should be rehashed.
    LegacyMatch,
    Mismatch,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        !matches!(self, Verification::Mismatch)
    }
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(config: &AuthConfig) -> BrResult<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| BrError::Config(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> BrResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| BrError::PasswordHash(e.to_string()))
    }

    /// Check `password` against a stored PHC string or legacy plaintext value.
    pub fn verify(&self, password: &str, stored: &str) -> BrResult<Verification> {
        if !is_phc_string(stored) {
            warn!("verifying against a legacy plaintext password row");
            return Ok(if constant_time_eq(password.as_bytes(), stored.as_bytes()) {
                Verification::LegacyMatch
            } else {
                Verification::Mismatch
            });
        }

        let parsed = PasswordHash::new(stored).map_err(|e| BrError::PasswordHash(e.to_string()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(Verification::Match),
            Err(argon2::password_hash::Error::Password) => Ok(Verification::Mismatch),
            Err(e) => Err(BrError::PasswordHash(e.to_string())),
        }
    }
}

/// Whether a stored value is a PHC hash rather than legacy plaintext.
pub fn is_phc_string(stored: &str) -> bool {
    stored.starts_with("$argon2")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
