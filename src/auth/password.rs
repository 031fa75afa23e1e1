//! Password hashing and verification (Argon2id)
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`),
//! so the cost parameters travel with every hash and older hashes keep
//! verifying after the configured cost changes.
//!
//! Both operations are CPU-bound; async callers run them on
//! `tokio::task::spawn_blocking`.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordHashConfig;
use crate::error::AppError;

/// Hashes and verifies local passwords
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    params: Params,
}

impl CredentialVerifier {
    /// Build a verifier from configured Argon2 cost parameters
    ///
    /// # Errors
    /// `Config` if the parameters are out of Argon2's accepted range
    pub fn new(config: &PasswordHashConfig) -> Result<Self, AppError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AppError::Config(format!("auth.password is invalid: {e}")))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    ///
    /// # Errors
    /// `Internal` only if the hasher itself fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {e}")))?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored PHC hash
    ///
    /// A malformed hash is a failed verification, never an error.
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("Stored password hash could not be parsed");
            return false;
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
