//! Password hashing and verification.
//!
//! Two schemes are supported. `SaltedSha256` reproduces the legacy
//! fixed-salt digest, with the salt injected from configuration rather than
//! compiled in. `Argon2` stores a PHC string with a per-user random salt.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash as PhcHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ServiceError, ServiceResult};
use crate::types::PasswordHash;
use crate::utils::constant_time_eq;

/// Hashing scheme applied to passwords before they reach the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum PasswordScheme {
    /// `hex(sha256(salt || password))` with one process-wide salt.
    SaltedSha256 { salt: String },
    /// Argon2id with default parameters and a random salt per hash.
    Argon2,
}

impl Default for PasswordScheme {
    fn default() -> Self {
        Self::SaltedSha256 {
            salt: String::new(),
        }
    }
}

impl PasswordScheme {
    /// Hash a password for storage.
    pub fn hash(&self, password: &str) -> ServiceResult<PasswordHash> {
        match self {
            Self::SaltedSha256 { salt } => Ok(salted_digest(salt, password)),
            Self::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| ServiceError::Internal(format!("hash password: {e}")))?;
                Ok(PasswordHash::new(hash.to_string()))
            }
        }
    }

    /// Check a password against a stored hash.
    ///
    /// A stored hash that does not parse under this scheme is reported as a
    /// mismatch, not an error, so callers keep one response shape for every
    /// failed login.
    pub fn verify(&self, password: &str, stored: &PasswordHash) -> bool {
        match self {
            Self::SaltedSha256 { salt } => {
                let candidate = salted_digest(salt, password);
                constant_time_eq(candidate.as_str().as_bytes(), stored.as_str().as_bytes())
            }
            Self::Argon2 => match PhcHash::new(stored.as_str()) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
        }
    }
}

fn salted_digest(salt: &str, password: &str) -> PasswordHash {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    PasswordHash::new(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salted(salt: &str) -> PasswordScheme {
        PasswordScheme::SaltedSha256 {
            salt: salt.to_string(),
        }
    }

    #[test]
    fn test_salted_hash_is_deterministic_hex() {
        let scheme = salted("2ru035c3x3w25");
        let h1 = scheme.hash("hunter2").unwrap();
        let h2 = scheme.hash("hunter2").unwrap();

        assert_eq!(h1, h2);
        assert_eq!(h1.as_str().len(), 64);
        assert!(h1.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h1.as_str(), "hunter2");
    }

    #[test]
    fn test_salt_changes_digest() {
        let a = salted("salt-a").hash("hunter2").unwrap();
        let b = salted("salt-b").hash("hunter2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_salted_verify() {
        let scheme = salted("pepper");
        let stored = scheme.hash("correct horse").unwrap();

        assert!(scheme.verify("correct horse", &stored));
        assert!(!scheme.verify("correct horse!", &stored));
        assert!(!salted("other").verify("correct horse", &stored));
    }

    #[test]
    fn test_argon2_round_trip_uses_random_salt() {
        let scheme = PasswordScheme::Argon2;
        let h1 = scheme.hash("s3cret").unwrap();
        let h2 = scheme.hash("s3cret").unwrap();

        assert!(h1.as_str().starts_with("$argon2"));
        assert_ne!(h1, h2);
        assert!(scheme.verify("s3cret", &h1));
        assert!(scheme.verify("s3cret", &h2));
        assert!(!scheme.verify("S3cret", &h1));
    }

    #[test]
    fn test_argon2_rejects_foreign_hash() {
        let legacy = salted("x").hash("s3cret").unwrap();
        assert!(!PasswordScheme::Argon2.verify("s3cret", &legacy));
    }

    #[test]
    fn test_scheme_deserialization() {
        let scheme: PasswordScheme =
            serde_json::from_str(r#"{"scheme":"salted_sha256","salt":"abc"}"#).unwrap();
        assert_eq!(scheme, salted("abc"));

        let scheme: PasswordScheme = serde_json::from_str(r#"{"scheme":"argon2"}"#).unwrap();
        assert_eq!(scheme, PasswordScheme::Argon2);
    }
}
