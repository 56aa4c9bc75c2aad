//! Error types for PostOpp Core
//!
//! Failures of the key derivation, sealing and PIN primitives.

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// PostOpp Core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// AEAD tag check failed: wrong secret or tampered blob
    #[error("Authentication failed: wrong secret or tampered data")]
    AuthenticationFailure,

    /// Input has the wrong byte length (salt, blob, key)
    #[error("Invalid length: {0}")]
    InvalidLength(String),

    /// Input is not valid base64 / UTF-8
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// PIN does not have the expected shape
    #[error("Invalid PIN: {0}")]
    InvalidPin(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),
}

impl Error {
    /// True when decryption failed the tag check.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::AuthenticationFailure)
    }

    /// True for malformed inputs, as opposed to a wrong secret.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::InvalidLength(_) | Error::InvalidEncoding(_))
    }
}
