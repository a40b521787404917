//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=...`), which embed the
//! salt and cost parameters.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::HashingParams;
use crate::{Result, WorkflowError};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

fn hashing_error(e: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Hashing(e.to_string())
}

/// Generate a random 16-byte salt.
fn generate_salt() -> Result<SaltString> {
    let mut salt = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut salt);
    SaltString::encode_b64(&salt).map_err(hashing_error)
}

/// Hash a password with fresh salt.
pub fn hash_password(password: &str, params: &HashingParams) -> Result<String> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, None)
        .map_err(hashing_error)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = generate_salt()?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(hashing_error)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. A mismatch is `Ok(false)`;
/// an unparseable hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(hashing_error)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hashing_error(e)),
    }
}
