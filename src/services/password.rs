//! Salted PBKDF2-HMAC-SHA256 password hashing.
//!
//! Hash and salt are stored separately, both base64 encoded. Parameters are fixed so existing
//! hashes keep verifying: 16-byte random salt, 10 000 iterations, 32-byte derived key.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::error::AppError;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;
pub const ITERATIONS: u32 = 10_000;

/// A freshly derived credential, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub hash: String,
    pub salt: String,
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn derive_key(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ITERATIONS, &mut out);
    out
}

/// Hashes `password` under a new random salt.
pub fn hash_password(password: &str) -> PasswordDigest {
    let salt = generate_salt();
    let hash = derive_key(password, &salt);
    PasswordDigest {
        hash: STANDARD.encode(hash),
        salt: STANDARD.encode(salt),
    }
}

/// Recomputes the hash with the stored salt and compares. Errors only when the stored values
/// are not valid base64.
pub fn verify_password(password: &str, stored_hash: &str, stored_salt: &str) -> Result<bool, AppError> {
    let salt = STANDARD
        .decode(stored_salt)
        .map_err(|e| AppError::Hashing(format!("invalid stored salt: {}", e)))?;
    let expected = STANDARD
        .decode(stored_hash)
        .map_err(|e| AppError::Hashing(format!("invalid stored hash: {}", e)))?;

    let computed = derive_key(password, &salt);
    Ok(computed.as_slice() == expected.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash_password("correct horse");
        assert!(verify_password("correct horse", &digest.hash, &digest.salt).unwrap());
        assert!(!verify_password("wrong horse", &digest.hash, &digest.salt).unwrap());
    }

    #[test]
    fn salts_differ_between_calls() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn encoded_lengths() {
        let digest = hash_password("pw");
        assert_eq!(STANDARD.decode(&digest.salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(&digest.hash).unwrap().len(), HASH_LEN);
    }

    #[test]
    fn malformed_stored_values_are_errors() {
        assert!(matches!(
            verify_password("pw", "not base64!!", "AAAA"),
            Err(AppError::Hashing(_))
        ));
    }
}
