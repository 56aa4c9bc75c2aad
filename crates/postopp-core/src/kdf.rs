//! Password-based key derivation
//!
//! PBKDF2-HMAC-SHA256 with a fixed iteration count stretches a [`Secret`]
//! and a 16-byte salt into a 256-bit key. The same primitive backs both
//! record encryption keys and PIN digests.

use crate::secret::Secret;
use crate::{Error, Result};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LENGTH: usize = 16;

/// Derived key length in bytes (256 bits)
pub const KEY_LENGTH: usize = 32;

/// Symmetric key derived from a secret, never persisted
pub struct DerivedKey(Zeroizing<[u8; KEY_LENGTH]>);

impl DerivedKey {
    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

/// Derive a 256-bit key from a secret and salt.
pub fn derive(secret: &Secret, salt: &[u8]) -> Result<DerivedKey> {
    let bits = derive_bits(secret.as_bytes(), salt)?;
    Ok(DerivedKey(bits))
}

/// Raw PBKDF2 output. Shared with PIN hashing, which only compares it.
pub(crate) fn derive_bits(input: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if salt.len() != SALT_LENGTH {
        return Err(Error::InvalidLength(format!(
            "Salt must be {} bytes, got {}",
            SALT_LENGTH,
            salt.len()
        )));
    }

    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(input, salt, PBKDF2_ITERATIONS, &mut out[..]);
    Ok(out)
}

/// Generate secure random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}
