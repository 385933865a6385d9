//! Password credential derivation and verification.
//!
//! Credentials are stored as a 32-byte Argon2id hash plus the 32-byte
//! random salt it was derived with. The salt is generated once at
//! credential creation and never reused; changing a password replaces
//! hash and salt wholesale.

use anyhow::{Context, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

/// Length of the derived hash, in bytes.
pub const HASH_LEN: usize = 32;

/// Length of the per-credential salt, in bytes.
pub const SALT_LEN: usize = 32;

// Argon2id cost parameters: one pass over 8 MiB with four lanes.
const TIME_COST: u32 = 1;
const MEMORY_KIB: u32 = 8 * 1024;
const PARALLELISM: u32 = 4;

fn kdf() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_KIB, TIME_COST, PARALLELISM, Some(HASH_LEN))
        .map_err(|err| anyhow::anyhow!("invalid argon2 parameters: {err}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Derive the stored hash for a password and salt.
///
/// # Errors
///
/// Returns an error if the key derivation fails.
pub fn derive_hash(password: &str, salt: &[u8]) -> Result<[u8; HASH_LEN]> {
    let mut hash = [0u8; HASH_LEN];
    kdf()?
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|err| anyhow::anyhow!("argon2 derivation failed: {err}"))?;
    Ok(hash)
}

/// Generate a fresh credential salt from the OS RNG.
///
/// # Errors
///
/// Returns an error if the OS RNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate credential salt")?;
    Ok(salt)
}

/// Check a password against a stored hash and salt.
///
/// The comparison is constant-time. A failed check returns `false`;
/// there is no internal retry, backoff, or rate limiting.
#[must_use]
pub fn verify(password: &str, salt: &[u8], stored_hash: &[u8]) -> bool {
    match derive_hash(password, salt) {
        Ok(derived) => derived.as_slice().ct_eq(stored_hash).into(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_matching_password() -> Result<()> {
        let salt = generate_salt()?;
        let hash = derive_hash("correct horse battery staple", &salt)?;
        assert!(verify("correct horse battery staple", &salt, &hash));
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_password() -> Result<()> {
        let salt = generate_salt()?;
        let hash = derive_hash("correct horse battery staple", &salt)?;
        assert!(!verify("correct horse battery stapler", &salt, &hash));
        assert!(!verify("", &salt, &hash));
        Ok(())
    }

    #[test]
    fn verify_rejects_truncated_hash() -> Result<()> {
        let salt = generate_salt()?;
        let hash = derive_hash("hunter2", &salt)?;
        assert!(!verify("hunter2", &salt, &hash[..HASH_LEN - 1]));
        Ok(())
    }

    #[test]
    fn derivation_is_deterministic_per_salt() -> Result<()> {
        let salt = generate_salt()?;
        assert_eq!(derive_hash("hunter2", &salt)?, derive_hash("hunter2", &salt)?);

        let other_salt = generate_salt()?;
        assert_ne!(salt, other_salt);
        assert_ne!(derive_hash("hunter2", &salt)?, derive_hash("hunter2", &other_salt)?);
        Ok(())
    }
}
