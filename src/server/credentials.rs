use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GuardError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Argon2id password hashing for protected pastes.
///
/// Hashes are PHC strings, so the salt and cost travel with the hash and
/// verification honours whatever cost a record was created with.
#[derive(Clone)]
pub struct CredentialGuard {
    argon2: Argon2<'static>,
}

impl CredentialGuard {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Custom cost: memory in KiB, iteration count and lane count.
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, GuardError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|e| GuardError::InvalidParams(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, GuardError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GuardError::Hash(e.to_string()))
    }

    /// `Ok(false)` on mismatch; errors are reserved for corrupted stored hashes.
    pub fn verify(&self, stored_hash: &str, candidate: &str) -> Result<bool, GuardError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|e| GuardError::MalformedHash(e.to_string()))?;
        match self.argon2.verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(GuardError::MalformedHash(e.to_string())),
        }
    }
}

impl Default for CredentialGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_guard() -> CredentialGuard {
        CredentialGuard::with_cost(64, 1, 1).expect("valid params")
    }

    #[test]
    fn hash_embeds_salt_and_algorithm() {
        let guard = cheap_guard();
        let first = guard.hash("secret").unwrap();
        let second = guard.hash("secret").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
    }

    #[test]
    fn verify_rejects_wrong_password_without_error() {
        let guard = cheap_guard();
        let hash = guard.hash("secret").unwrap();
        assert_eq!(guard.verify(&hash, "secret"), Ok(true));
        assert_eq!(guard.verify(&hash, "Secret"), Ok(false));
        assert_eq!(guard.verify(&hash, ""), Ok(false));
    }

    #[test]
    fn verify_fails_on_malformed_hash() {
        let guard = cheap_guard();
        assert!(matches!(
            guard.verify("not-a-phc-string", "secret"),
            Err(GuardError::MalformedHash(_))
        ));
    }

    #[test]
    fn rejects_invalid_cost() {
        assert!(matches!(
            CredentialGuard::with_cost(1, 0, 0),
            Err(GuardError::InvalidParams(_))
        ));
    }
}
