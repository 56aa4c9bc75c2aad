//! Error types

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Sealing, opening or PIN hashing failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] postopp_core::Error),

    /// A store operation ran before any session secret was installed
    #[error("Session key not set: unlock the journal first")]
    KeyNotSet,

    /// Backup file is missing its framing or is not JSON
    #[error("Malformed backup: {0}")]
    MalformedBackup(String),

    /// A stored record could not be decrypted or parsed
    #[error("Record {id} could not be decrypted")]
    CorruptRecord {
        /// Row id
        id: i64,
    },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Security error
    #[error("Security error: {0}")]
    Security(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::KeyNotSet => "The journal is locked. Enter your PIN to continue.".to_string(),
            Error::MalformedBackup(_) => {
                "This file is not a valid PostOpp backup.".to_string()
            }
            Error::CorruptRecord { .. } => crate::models::UNDECRYPTABLE_NOTES.to_string(),
            Error::Crypto(e) if e.is_authentication_failure() => {
                "Unable to decrypt data with the current key.".to_string()
            }
            Error::Validation(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
