//! Encrypted SQLite storage for the PostOpp symptom journal
//!
//! Provides the on-device journal database with WAL mode, migrations and
//! per-record sealing of every symptom log.
//!
//! ## Security Features
//!
//! - **Record Sealing**: AES-256-GCM per log, key derived per record with PBKDF2-SHA256
//! - **Device Key**: Random key used as the session secret while no PIN is set
//! - **PIN Gate**: 4-digit PIN, 3 attempts then a 30 second lockout
//! - **Forgot PIN**: Wipes every log instead of recovering the PIN
//! - **Corrupt Rows**: Undecryptable logs are reported per record and never block a read

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access_gate;
pub mod backup;
pub mod clock;
pub mod database;
pub mod error;
pub mod journal;
pub mod log_store;
pub mod migrations;
pub mod models;
pub mod session;
pub mod settings;
pub mod symptoms;

pub use access_gate::{
    AccessGate, GateEffect, GateEvent, GateState, LOCKOUT_DURATION, MAX_FAILED_ATTEMPTS,
};
pub use backup::{
    export_backup, import_backup, parse_backup, Backup, ImportSummary, BACKUP_APP_ID,
    BACKUP_VERSION,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use error::{Error, Result};
pub use journal::{Journal, CLEAR_CONFIRMATION};
pub use log_store::{validate_pain_level, LogStore, ResealSummary};
pub use models::*;
pub use session::SessionKeyContext;
pub use settings::{
    SettingsStorage, DEFAULT_FOLLOW_UP_DELAY_MINUTES, FOLLOW_UP_DELAY_OPTIONS,
    MAX_ACTIVE_SYMPTOMS, MIN_ACTIVE_SYMPTOMS,
};
pub use symptoms::{
    catalog, find_symptom, symptom_by_id, CustomSymptomStorage, Symptom, SymptomCategory,
    CUSTOM_SYMPTOM_PREFIX,
};
