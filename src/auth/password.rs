//! One-way password hashing
//!
//! Hashes are Argon2id PHC strings with a random 16-byte salt. Verification
//! goes through the argon2 verifier, which compares digests in constant time.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier};
use rand::RngCore;

use crate::error::{Result, TrackerError};

#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| TrackerError::PasswordHashError(e.to_string()))?;

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| TrackerError::PasswordHashError(e.to_string()))
    }

    /// Check a plaintext password against a stored hash
    pub fn verify(&self, hash: &str, plaintext: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                log::error!("Stored password hash is not a valid PHC string: {}", e);
                false
            }
        }
    }
}
