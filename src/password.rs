//! Password Hashing
//!
//! Argon2id with configurable cost factors. Hashes are stored in PHC string
//! format, so the salt and parameters travel with each hash.

use crate::config::PasswordConfig;
use crate::error::AppError;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

/// One-way credential hasher
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random secret, verified when no stored hash exists
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher from configured cost factors
    pub fn new(config: &PasswordConfig) -> Result<Self, AppError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| AppError::Config(format!("Invalid Argon2 parameters: {e}")))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        let secret = SaltString::generate(&mut OsRng);
        hasher.dummy_hash = hasher.hash(secret.as_str())?;

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// Malformed hashes verify as `false`. The cost parameters embedded in
    /// the stored hash are used, so hashes survive cost changes.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Stored password hash is malformed: {:?}", err);
                return false;
            }
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend one verification's worth of work on a password that has no
    /// stored hash. Always `false`.
    pub fn verify_absent(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}
