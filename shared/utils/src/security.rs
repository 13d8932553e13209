//! Password and session token hashing.
//!
//! Passwords are bcrypt hashes at cost 10. Session tokens are opaque random
//! strings; only their SHA-256 digest is persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{MrfError, MrfResult};

pub const PASSWORD_COST: u32 = 10;

pub fn hash_password(password: &str) -> MrfResult<String> {
    bcrypt::hash(password, PASSWORD_COST)
        .map_err(|e| MrfError::internal(format!("Failed to hash password: {}", e)))
}

/// False for a wrong password and for anything that is not a bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// New bearer token: 64 hex characters from two random UUIDs.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("hunter22").unwrap();
        assert!(stored.starts_with("$2b$10$"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator"));
        assert!(!verify_password("anything", ""));
        // Old salted SHA-256 digests are not accepted.
        let legacy = format!("{}${}", "a".repeat(32), "0".repeat(64));
        assert!(!verify_password("anything", &legacy));
    }

    #[test]
    fn test_tokens() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_eq!(hash_token(&token).len(), 64);
    }
}
