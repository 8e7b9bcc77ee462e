//! Argon2id password hashing for stored credentials.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::PasswordCost;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Memory cost (KiB), iterations, lanes.
fn params_for(cost: PasswordCost) -> (u32, u32, u32) {
    match cost {
        PasswordCost::Standard => (19_456, 2, 1),
        PasswordCost::Testing => (1_024, 1, 1),
    }
}

pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new(cost: PasswordCost) -> Result<Self, CredentialError> {
        let (memory, iterations, lanes) = params_for(cost);
        let params = Params::new(memory, iterations, lanes, None)
            .map_err(|err| CredentialError::Params(err.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// PHC string with an embedded random salt.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| CredentialError::Hash(err.to_string()))
    }

    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|err| CredentialError::MalformedHash(err.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CredentialError::MalformedHash(err.to_string())),
        }
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_and_rejects_wrong_password() {
        let hasher = CredentialHasher::new(PasswordCost::Testing).expect("params valid");
        let stored = hasher.hash("password123").expect("hash");

        assert!(stored.starts_with("$argon2id$"));
        assert!(hasher.verify("password123", &stored).expect("verify"));
        assert!(!hasher.verify("password124", &stored).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = CredentialHasher::new(PasswordCost::Testing).expect("params valid");
        assert!(matches!(
            hasher.verify("password123", "plaintext"),
            Err(CredentialError::MalformedHash(_))
        ));
    }
}
