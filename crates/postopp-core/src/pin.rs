//! PIN credential hashing and verification
//!
//! The stored record is base64([salt(16)][digest(32)]). The digest comes
//! from the same PBKDF2 primitive as encryption keys but is only ever
//! compared, never used to encrypt anything.

use crate::kdf::{self, KEY_LENGTH, SALT_LENGTH};
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use subtle::ConstantTimeEq;

/// Number of digits in a PIN
pub const PIN_LENGTH: usize = 4;

/// Digest length in bytes
pub const PIN_DIGEST_LENGTH: usize = KEY_LENGTH;

/// Encoded PIN hash as kept in settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    encoded: String,
}

impl PinRecord {
    /// Check PIN format (exactly four ASCII digits)
    pub fn validate_pin(pin: &str) -> Result<()> {
        if pin.len() != PIN_LENGTH {
            return Err(Error::InvalidPin(format!(
                "PIN must be {} digits",
                PIN_LENGTH
            )));
        }
        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidPin(
                "PIN must contain only digits".to_string(),
            ));
        }
        Ok(())
    }

    /// Hash PIN under a fresh random salt
    pub fn hash(pin: &str) -> Result<Self> {
        Self::validate_pin(pin)?;

        let salt = kdf::generate_salt();
        let digest = kdf::derive_bits(pin.as_bytes(), &salt)?;

        let mut data = Vec::with_capacity(SALT_LENGTH + PIN_DIGEST_LENGTH);
        data.extend_from_slice(&salt);
        data.extend_from_slice(&digest[..]);

        Ok(Self {
            encoded: STANDARD.encode(data),
        })
    }

    /// Verify a candidate PIN.
    ///
    /// Errors only when the stored record itself is malformed.
    pub fn verify(&self, pin: &str) -> Result<bool> {
        let data = STANDARD
            .decode(self.encoded.as_bytes())
            .map_err(|e| Error::InvalidEncoding(format!("PIN record is not base64: {}", e)))?;

        if data.len() <= SALT_LENGTH {
            return Err(Error::InvalidLength(format!(
                "PIN record too short: {} bytes",
                data.len()
            )));
        }

        let (salt, expected) = data.split_at(SALT_LENGTH);
        let candidate = kdf::derive_bits(pin.as_bytes(), salt)?;

        if expected.len() != candidate.len() {
            return Ok(false);
        }
        Ok(bool::from(candidate[..].ct_eq(expected)))
    }

    /// Get encoded record for storage
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Load from stored text
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pin_hashing() {
        let record = PinRecord::hash("5678").unwrap();
        assert!(record.verify("5678").unwrap());
        assert!(!record.verify("0000").unwrap());
    }

    #[test]
    fn test_same_pin_different_records() {
        let a = PinRecord::hash("1234").unwrap();
        let b = PinRecord::hash("1234").unwrap();
        assert_ne!(a.as_str(), b.as_str());
        assert!(a.verify("1234").unwrap());
        assert!(b.verify("1234").unwrap());
    }

    #[test]
    fn test_record_layout() {
        let record = PinRecord::hash("1234").unwrap();
        let raw = STANDARD.decode(record.as_str()).unwrap();
        assert_eq!(raw.len(), SALT_LENGTH + PIN_DIGEST_LENGTH);
    }

    #[test]
    fn test_pin_validation() {
        assert!(PinRecord::hash("123").is_err());
        assert!(PinRecord::hash("12345").is_err());
        assert!(PinRecord::hash("12ab").is_err());
        assert!(matches!(PinRecord::hash(""), Err(Error::InvalidPin(_))));
        assert!(PinRecord::validate_pin("0000").is_ok());
    }

    #[test]
    fn test_malformed_record() {
        let record = PinRecord::from_encoded("not-base64!!");
        assert!(record.verify("1234").is_err());

        let short = PinRecord::from_encoded(STANDARD.encode([1u8; 8]));
        assert!(matches!(short.verify("1234"), Err(Error::InvalidLength(_))));
    }

    #[test]
    fn test_truncated_digest_never_matches() {
        let record = PinRecord::hash("1234").unwrap();
        let mut raw = STANDARD.decode(record.as_str()).unwrap();
        raw.truncate(SALT_LENGTH + 16);
        let truncated = PinRecord::from_encoded(STANDARD.encode(&raw));
        assert!(!truncated.verify("1234").unwrap());
    }

    #[test]
    fn test_round_trip_through_storage_text() {
        let record = PinRecord::hash("4321").unwrap();
        let reloaded = PinRecord::from_encoded(record.as_str().to_string());
        assert!(reloaded.verify("4321").unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn prop_verify_accepts_only_the_hashed_pin(pin in "[0-9]{4}", other in "[0-9]{4}") {
            let record = PinRecord::hash(&pin).unwrap();
            prop_assert!(record.verify(&pin).unwrap());
            prop_assert_eq!(record.verify(&other).unwrap(), pin == other);
        }
    }
}
