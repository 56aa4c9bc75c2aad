//! Authenticated encryption of record payloads
//!
//! Every seal derives a fresh key from the secret and a random salt, then
//! encrypts with AES-256-GCM under a random nonce.
//!
//! Format: base64([salt(16)][nonce(12)][ciphertext + tag(16)])

use crate::kdf::{self, SALT_LENGTH};
use crate::secret::Secret;
use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// AES-GCM nonce length in bytes
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LENGTH: usize = 16;

/// Bytes preceding the ciphertext
pub const HEADER_LENGTH: usize = SALT_LENGTH + NONCE_LENGTH;

/// Sealed ciphertext at rest, in its base64 text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob(String);

impl SealedBlob {
    /// Wrap stored base64 text
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Base64 text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the base64 text
    pub fn into_string(self) -> String {
        self.0
    }

    fn decode(&self) -> Result<Vec<u8>> {
        let data = STANDARD
            .decode(self.0.as_bytes())
            .map_err(|e| Error::InvalidEncoding(format!("Sealed blob is not base64: {}", e)))?;

        if data.len() < HEADER_LENGTH + TAG_LENGTH {
            return Err(Error::InvalidLength(format!(
                "Sealed blob too short: {} bytes",
                data.len()
            )));
        }
        Ok(data)
    }
}

impl fmt::Display for SealedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn cipher_for(secret: &Secret, salt: &[u8]) -> Result<Aes256Gcm> {
    let key = kdf::derive(secret, salt)?;
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Encrypt `plaintext` under `secret`.
pub fn seal(plaintext: &[u8], secret: &Secret) -> Result<SealedBlob> {
    let salt = kdf::generate_salt();
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = cipher_for(secret, &salt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| Error::Encryption(e.to_string()))?;

    let mut data = Vec::with_capacity(HEADER_LENGTH + ciphertext.len());
    data.extend_from_slice(&salt);
    data.extend_from_slice(&nonce_bytes);
    data.extend_from_slice(&ciphertext);

    Ok(SealedBlob(STANDARD.encode(data)))
}

/// Decrypt a blob sealed by [`seal`].
///
/// A wrong secret or any modification of the blob fails with
/// [`Error::AuthenticationFailure`].
pub fn open(blob: &SealedBlob, secret: &Secret) -> Result<Vec<u8>> {
    let data = blob.decode()?;
    let (salt, rest) = data.split_at(SALT_LENGTH);
    let (nonce, ciphertext) = rest.split_at(NONCE_LENGTH);

    let cipher = cipher_for(secret, salt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::AuthenticationFailure)
}

/// Seal UTF-8 text
pub fn seal_str(plaintext: &str, secret: &Secret) -> Result<SealedBlob> {
    seal(plaintext.as_bytes(), secret)
}

/// Open a blob holding UTF-8 text
pub fn open_str(blob: &SealedBlob, secret: &Secret) -> Result<String> {
    let bytes = open(blob, secret)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidEncoding(format!("Plaintext is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_round_trip() {
        let secret = Secret::new("test-secret-key");
        let blob = seal_str("Hello, PostOpp!", &secret).unwrap();
        assert_eq!(open_str(&blob, &secret).unwrap(), "Hello, PostOpp!");
    }

    #[test]
    fn test_wrong_secret_is_authentication_failure() {
        let blob = seal_str("secret data", &Secret::new("correct-key")).unwrap();
        let err = open_str(&blob, &Secret::new("wrong-key")).unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_layout_lengths() {
        let secret = Secret::new("k");
        let blob = seal(b"abc", &secret).unwrap();
        let raw = STANDARD.decode(blob.as_str()).unwrap();
        assert_eq!(raw.len(), SALT_LENGTH + NONCE_LENGTH + 3 + TAG_LENGTH);
    }

    #[test]
    fn test_same_plaintext_produces_distinct_blobs() {
        let secret = Secret::new("k");
        let a = seal_str("same", &secret).unwrap();
        let b = seal_str("same", &secret).unwrap();
        assert_ne!(a, b);

        let raw_a = STANDARD.decode(a.as_str()).unwrap();
        let raw_b = STANDARD.decode(b.as_str()).unwrap();
        assert_ne!(raw_a[..SALT_LENGTH], raw_b[..SALT_LENGTH]);
        assert_ne!(raw_a[SALT_LENGTH..HEADER_LENGTH], raw_b[SALT_LENGTH..HEADER_LENGTH]);
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let secret = Secret::new("k");
        let blob = seal_str("pain level 7", &secret).unwrap();
        let mut raw = STANDARD.decode(blob.as_str()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = SealedBlob::from_encoded(STANDARD.encode(&raw));
        assert!(open(&tampered, &secret).unwrap_err().is_authentication_failure());

        let mut raw = STANDARD.decode(blob.as_str()).unwrap();
        raw[0] ^= 0x80; // salt byte
        let tampered = SealedBlob::from_encoded(STANDARD.encode(&raw));
        assert!(open(&tampered, &secret).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn test_malformed_blobs() {
        let secret = Secret::new("k");
        let not_base64 = SealedBlob::from_encoded("!!!not base64!!!");
        assert!(matches!(open(&not_base64, &secret), Err(Error::InvalidEncoding(_))));

        let short = SealedBlob::from_encoded(STANDARD.encode([0u8; HEADER_LENGTH + 4]));
        assert!(matches!(open(&short, &secret), Err(Error::InvalidLength(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let secret = Secret::new("k");
        let blob = seal(b"", &secret).unwrap();
        assert!(open(&blob, &secret).unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_open_inverts_seal(plaintext in ".{0,64}", secret in "[a-zA-Z0-9]{1,24}") {
            let secret = Secret::new(secret);
            let blob = seal_str(&plaintext, &secret).unwrap();
            prop_assert_eq!(open_str(&blob, &secret).unwrap(), plaintext);
        }

        #[test]
        fn prop_other_secret_never_opens(
            plaintext in ".{0,64}",
            s1 in "[0-9]{4}",
            s2 in "[0-9]{4}",
        ) {
            prop_assume!(s1 != s2);
            let blob = seal_str(&plaintext, &Secret::new(s1)).unwrap();
            let err = open_str(&blob, &Secret::new(s2)).unwrap_err();
            prop_assert!(err.is_authentication_failure());
        }
    }
}
