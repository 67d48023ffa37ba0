//! # Credential Hashing
//!
//! Argon2id hashing for user passwords and the store's admin key.
//! Only PHC strings are ever stored; plaintext never touches the database.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Hashes a secret into a PHC string (`$argon2id$v=19$...`).
///
/// The salt is 16 random bytes taken from a v4 UUID.
pub fn hash_secret(secret: &str) -> DbResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| DbError::Internal(format!("salt encoding failed: {e}")))?;

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::Internal(format!("hashing failed: {e}")))
}

/// Verifies a secret against a stored PHC string.
///
/// A malformed hash verifies as `false`.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_secret("open-sesame").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("open-sesame", &hash));
        assert!(!verify_secret("open-sesame!", &hash));
    }

    #[test]
    fn test_same_secret_hashes_differently() {
        let a = hash_secret("1234").unwrap();
        let b = hash_secret("1234").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_secret("anything", "not-a-phc-string"));
        assert!(!verify_secret("", ""));
    }
}
