//! Session secrets
//!
//! A [`Secret`] is either the device key (used while no PIN is set) or the
//! user's PIN digits. It only ever lives in memory and is wiped on drop.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Device key length in bytes before base64 encoding
pub const DEVICE_KEY_LENGTH: usize = 32;

/// Low-entropy input to key derivation
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a secret string
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the secret text
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Secret bytes as fed to PBKDF2
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Generate a fresh 256-bit device key, base64 encoded
pub fn generate_device_key() -> Secret {
    let mut key = Zeroizing::new([0u8; DEVICE_KEY_LENGTH]);
    OsRng.fill_bytes(&mut key[..]);
    Secret::new(STANDARD.encode(&key[..]))
}
