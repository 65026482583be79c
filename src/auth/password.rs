//! Argon2 password hashing.
//!
//! Digests are PHC strings with a fresh 16-byte salt per call, so hashing the
//! same plaintext twice never yields the same digest. Hashing is CPU bound; the
//! async variants move the work onto the blocking pool so a request hashing a
//! password does not stall the others sharing its worker thread.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString},
};
use rand::{RngCore, rngs::OsRng};

/// Hash a plaintext password into a PHC string.
///
/// # Errors
/// Returns an error if the salt cannot be generated or hashing fails.
pub fn hash(plaintext: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .context("failed to generate password salt")?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;

    let digest = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?
        .to_string();

    Ok(digest)
}

/// Check a plaintext against a stored digest.
///
/// A digest that does not parse is treated as a mismatch.
#[must_use]
pub fn verify(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash`] on the blocking pool.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task panics.
pub async fn hash_blocking(plaintext: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash(&plaintext))
        .await
        .context("password hashing task failed")?
}

/// [`verify`] on the blocking pool.
///
/// # Errors
/// Returns an error only if the blocking task panics.
pub async fn verify_blocking(plaintext: String, digest: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify(&plaintext, &digest))
        .await
        .context("password verification task failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_own_hash() -> Result<()> {
        let digest = hash("Secr3t!abc")?;
        assert!(verify("Secr3t!abc", &digest));
        assert!(!verify("Secr3t!abd", &digest));
        Ok(())
    }

    #[test]
    fn hash_is_salted() -> Result<()> {
        let first = hash("Secr3t!abc")?;
        let second = hash("Secr3t!abc")?;
        assert_ne!(first, second);
        assert!(verify("Secr3t!abc", &first));
        assert!(verify("Secr3t!abc", &second));
        Ok(())
    }

    #[test]
    fn malformed_digest_is_a_mismatch() {
        assert!(!verify("Secr3t!abc", ""));
        assert!(!verify("Secr3t!abc", "not-a-phc-string"));
        assert!(!verify("Secr3t!abc", "$argon2id$v=19$garbage"));
    }

    #[tokio::test]
    async fn blocking_variants_round_trip() -> Result<()> {
        let digest = hash_blocking("Secr3t!abc".to_string()).await?;
        assert!(verify_blocking("Secr3t!abc".to_string(), digest.clone()).await?);
        assert!(!verify_blocking("wrong".to_string(), digest).await?);
        Ok(())
    }
}
