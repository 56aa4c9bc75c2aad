//! Database models

use postopp_core::{PinRecord, Secret};
use serde::{Deserialize, Serialize};

/// Notes text shown for a record that could not be decrypted
pub const UNDECRYPTABLE_NOTES: &str = "[encrypted - unable to decrypt]";

/// Symptom id shown for a record that could not be decrypted
pub const UNKNOWN_SYMPTOM_ID: &str = "unknown";

/// Lowest pain level a user can record
pub const MIN_PAIN_LEVEL: u8 = 1;

/// Highest pain level a user can record
pub const MAX_PAIN_LEVEL: u8 = 10;

/// Default home-screen symptoms
pub const DEFAULT_ACTIVE_SYMPTOM_IDS: [&str; 4] = ["ptsd", "migraine", "hip-pain", "sinus"];

/// One journal entry in plaintext.
///
/// Everything except `id` is sealed at rest; `timestamp` is additionally
/// kept in the clear for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomLog {
    /// Store-assigned id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Catalog or custom symptom id
    pub symptom_id: String,
    /// Pain level 1-10
    pub pain_level: u8,
    /// Milliseconds since epoch
    pub timestamp: i64,
    /// Latitude, if location was captured
    pub latitude: Option<f64>,
    /// Longitude, if location was captured
    pub longitude: Option<f64>,
    /// Location accuracy in meters
    pub location_accuracy: Option<f64>,
    /// Pain level at follow-up
    pub follow_up_pain_level: Option<u8>,
    /// When the follow-up was recorded
    pub follow_up_timestamp: Option<i64>,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
}

impl SymptomLog {
    /// Create new entry (for insertion)
    pub fn new(symptom_id: impl Into<String>, pain_level: u8, timestamp: i64) -> Self {
        Self {
            id: None,
            symptom_id: symptom_id.into(),
            pain_level,
            timestamp,
            latitude: None,
            longitude: None,
            location_accuracy: None,
            follow_up_pain_level: None,
            follow_up_timestamp: None,
            notes: String::new(),
        }
    }

    /// Set captured location
    pub fn with_location(mut self, latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self.location_accuracy = accuracy;
        self
    }

    /// Set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Placeholder rendered in place of an undecryptable row
    pub fn placeholder(id: i64, timestamp: i64) -> Self {
        Self {
            id: Some(id),
            symptom_id: UNKNOWN_SYMPTOM_ID.to_string(),
            pain_level: 0,
            timestamp,
            latitude: None,
            longitude: None,
            location_accuracy: None,
            follow_up_pain_level: None,
            follow_up_timestamp: None,
            notes: UNDECRYPTABLE_NOTES.to_string(),
        }
    }
}

/// Outcome of reading one stored row
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLog {
    /// Row opened and parsed
    Decrypted(SymptomLog),
    /// Row failed to open or parse under the session secret
    Corrupt {
        /// Row id
        id: i64,
        /// Plaintext timestamp column
        timestamp: i64,
    },
}

impl DecodedLog {
    /// Row id
    pub fn id(&self) -> i64 {
        match self {
            DecodedLog::Decrypted(log) => log.id.unwrap_or_default(),
            DecodedLog::Corrupt { id, .. } => *id,
        }
    }

    /// Plaintext timestamp
    pub fn timestamp(&self) -> i64 {
        match self {
            DecodedLog::Decrypted(log) => log.timestamp,
            DecodedLog::Corrupt { timestamp, .. } => *timestamp,
        }
    }

    /// Whether the row failed to decrypt
    pub fn is_corrupt(&self) -> bool {
        matches!(self, DecodedLog::Corrupt { .. })
    }

    /// Borrow the decrypted log
    pub fn as_log(&self) -> Option<&SymptomLog> {
        match self {
            DecodedLog::Decrypted(log) => Some(log),
            DecodedLog::Corrupt { .. } => None,
        }
    }

    /// Decrypted log, or `None` for a corrupt row
    pub fn into_log(self) -> Option<SymptomLog> {
        match self {
            DecodedLog::Decrypted(log) => Some(log),
            DecodedLog::Corrupt { .. } => None,
        }
    }

    /// Decrypted log, or the "unable to decrypt" placeholder
    pub fn into_placeholder(self) -> SymptomLog {
        match self {
            DecodedLog::Decrypted(log) => log,
            DecodedLog::Corrupt { id, timestamp } => SymptomLog::placeholder(id, timestamp),
        }
    }
}

/// Application settings (single row)
#[derive(Debug, Clone)]
pub struct UserSettings {
    /// Symptoms shown on the home screen (1-4)
    pub active_symptom_ids: Vec<String>,
    /// Follow-up reminders enabled
    pub notifications_enabled: bool,
    /// Delay before a follow-up reminder
    pub follow_up_delay_minutes: u32,
    /// First launch, ms since epoch
    pub installed_at: Option<i64>,
    /// Last backup export, ms since epoch
    pub last_export_date: Option<i64>,
    /// Encoded PIN record
    pub pin_hash: Option<String>,
    /// Whether the PIN gate is active
    pub pin_enabled: bool,
    /// Device key, used as the session secret while no PIN is set
    pub encryption_key: Secret,
    /// Disclaimer accepted
    pub onboarding_completed: bool,
}

impl UserSettings {
    /// PIN record, when a PIN is enabled
    pub fn pin_record(&self) -> Option<PinRecord> {
        if !self.pin_enabled {
            return None;
        }
        self.pin_hash.clone().map(PinRecord::from_encoded)
    }
}

/// User-defined symptom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSymptom {
    /// Id, prefixed `custom-`
    pub id: String,
    /// Display name
    pub name: String,
    /// Short label
    pub short_name: String,
    /// Emoji icon
    pub icon: String,
    /// Hex color
    pub color: String,
}
