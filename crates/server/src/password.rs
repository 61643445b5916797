//! Argon2id password hashing.
//!
//! The async wrappers run the CPU-bound work on tokio's blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::SessionError;

/// Hash a password into a PHC string (`$argon2id$...`).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Unparsable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub async fn hash_password_blocking(password: String) -> Result<String, SessionError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| SessionError::PasswordHash(e.to_string()))?
        .map_err(|e| SessionError::PasswordHash(e.to_string()))
}

pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}
