//! PostOpp journal core
//!
//! Cryptographic primitives for the local symptom journal: PBKDF2 key
//! derivation, AES-256-GCM sealing of record payloads, PIN hashing, and
//! the in-memory session secret type.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod pin;
pub mod secret;

pub use cipher::{open, open_str, seal, seal_str, SealedBlob, HEADER_LENGTH, NONCE_LENGTH, TAG_LENGTH};
pub use error::{Error, Result};
pub use kdf::{derive, generate_salt, DerivedKey, KEY_LENGTH, PBKDF2_ITERATIONS, SALT_LENGTH};
pub use pin::{PinRecord, PIN_DIGEST_LENGTH, PIN_LENGTH};
pub use secret::{generate_device_key, Secret, DEVICE_KEY_LENGTH};
