//! Journal facade
//!
//! Ties the database, settings row, session secret and PIN gate together.
//! Front ends feed gate events through [`Journal::handle`] and use
//! [`Journal::logs`] once the session is open.

use crate::access_gate::{AccessGate, GateEffect, GateEvent, GateState};
use crate::backup::{self, Backup, ImportSummary};
use crate::clock::Clock;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::log_store::{self, LogStore, ResealSummary};
use crate::models::{SymptomLog, UserSettings};
use crate::session::SessionKeyContext;
use crate::settings::SettingsStorage;
use postopp_core::{PinRecord, Secret};
use std::path::Path;
use std::sync::Arc;

/// Confirmation text required by [`Journal::clear_all_data`]
pub const CLEAR_CONFIRMATION: &str = "DELETE";

/// Open journal
pub struct Journal {
    db: Database,
    session: SessionKeyContext,
    gate: AccessGate,
    settings: UserSettings,
    clock: Arc<dyn Clock>,
}

impl Journal {
    /// Open (or create) the journal database at `path`
    pub fn open<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_database(Database::open(path)?, clock)
    }

    /// Open a throwaway in-memory journal
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_database(Database::open_in_memory()?, clock)
    }

    /// Initialize settings and the gate over an open database.
    ///
    /// Without a PIN the device key is installed immediately.
    pub fn from_database(db: Database, clock: Arc<dyn Clock>) -> Result<Self> {
        let settings = SettingsStorage::initialize(db.conn())?;
        let gate = AccessGate::new(settings.pin_record(), clock.clone());
        let session = SessionKeyContext::new();

        if gate.state() == GateState::NoPinConfigured {
            session.install(settings.encryption_key.clone());
        }
        tracing::debug!("Journal opened (pin_enabled={})", settings.pin_enabled);

        Ok(Self {
            db,
            session,
            gate,
            settings,
            clock,
        })
    }

    /// Encrypted log store
    pub fn logs(&self) -> LogStore<'_> {
        LogStore::new(&self.db)
    }

    /// Session secret handle
    pub fn session(&self) -> &SessionKeyContext {
        &self.session
    }

    /// Underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// PIN gate
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Current gate state
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Whether logs can be read and written
    pub fn is_unlocked(&self) -> bool {
        self.gate.is_open() && self.session.is_unlocked()
    }

    /// Cached settings
    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Re-read settings after a direct [`SettingsStorage`] update
    pub fn reload_settings(&mut self) -> Result<&UserSettings> {
        self.settings = SettingsStorage::load(self.db.conn())?;
        Ok(&self.settings)
    }

    /// Feed one event to the gate and apply its effects
    pub fn handle(&mut self, event: GateEvent) -> Result<Vec<GateEffect>> {
        let effects = self.gate.transition(event);
        for effect in &effects {
            match effect {
                GateEffect::Unlocked(secret) => self.session.install(secret.clone()),
                GateEffect::WipeAndUnlock => self.wipe_and_unlock()?,
                _ => {}
            }
        }
        Ok(effects)
    }

    /// Feed a whole PIN to the gate digit by digit.
    ///
    /// The PIN is checked before any digit reaches the gate, and digits left
    /// over from earlier keypad events are cleared first.
    pub fn enter_pin(&mut self, pin: &str) -> Result<Vec<GateEffect>> {
        PinRecord::validate_pin(pin).map_err(|e| Error::Validation(e.to_string()))?;

        while matches!(self.gate.state(), GateState::Unlocking { .. }) {
            self.handle(GateEvent::Delete)?;
        }

        let mut effects = Vec::new();
        for b in pin.bytes() {
            effects.extend(self.handle(GateEvent::Digit(b - b'0'))?);
        }
        Ok(effects)
    }

    /// Record a follow-up pain level for log `id`, stamped by the journal clock
    pub fn record_follow_up(&self, id: i64, pain_level: u8) -> Result<SymptomLog> {
        self.logs()
            .update_follow_up(&self.session, id, pain_level, self.clock.now_ms())
    }

    /// End the session. Without a PIN the journal stays open.
    pub fn lock(&mut self) {
        self.gate.lock();
        if self.gate.state() == GateState::Locked {
            self.session.lock();
        }
    }

    /// Set or change the PIN and reseal every log under it
    pub fn enable_pin(&mut self, pin: &str) -> Result<ResealSummary> {
        let record = PinRecord::hash(pin)?;
        let old = self.open_secret()?;
        let new = Secret::new(pin);

        let summary = self.db.in_transaction(|conn| {
            let summary = log_store::reseal_with(conn, &old, &new)?;
            SettingsStorage::set_pin_hash(conn, &record)?;
            Ok(summary)
        })?;

        self.session.install(new);
        self.gate.set_pin_record(Some(record));
        self.reload_settings()?;
        Ok(summary)
    }

    /// Remove the PIN and reseal every log under the device key
    pub fn disable_pin(&mut self) -> Result<ResealSummary> {
        if !self.settings.pin_enabled {
            return Err(Error::Validation("PIN is not enabled".to_string()));
        }
        let old = self.open_secret()?;
        let new = self.settings.encryption_key.clone();

        let summary = self.db.in_transaction(|conn| {
            let summary = log_store::reseal_with(conn, &old, &new)?;
            SettingsStorage::clear_pin(conn)?;
            Ok(summary)
        })?;

        self.session.install(new);
        self.gate.set_pin_record(None);
        self.reload_settings()?;
        Ok(summary)
    }

    /// Delete every log and reset home-screen defaults. PIN settings stay.
    ///
    /// `confirmation` must be exactly `DELETE`.
    pub fn clear_all_data(&mut self, confirmation: &str) -> Result<usize> {
        if confirmation != CLEAR_CONFIRMATION {
            return Err(Error::Validation(format!(
                "Type {} to confirm",
                CLEAR_CONFIRMATION
            )));
        }
        self.open_secret()?;

        let deleted = self.db.in_transaction(|conn| {
            let deleted = log_store::delete_all(conn)?;
            SettingsStorage::reset_after_clear(conn)?;
            Ok(deleted)
        })?;

        self.reload_settings()?;
        tracing::warn!("All journal data cleared ({} logs)", deleted);
        Ok(deleted)
    }

    /// Export a backup and remember the export time
    pub fn export_backup(&mut self) -> Result<Backup> {
        let backup = backup::export_backup(&self.logs(), &self.session)?;
        SettingsStorage::record_export(self.db.conn(), self.clock.now_ms())?;
        self.reload_settings()?;
        Ok(backup)
    }

    /// Import a backup document under the current session secret
    pub fn import_backup(&self, json: &str) -> Result<ImportSummary> {
        backup::import_backup(&self.logs(), &self.session, json)
    }

    fn open_secret(&self) -> Result<Secret> {
        if !self.gate.is_open() {
            return Err(Error::KeyNotSet);
        }
        self.session.secret()
    }

    fn wipe_and_unlock(&mut self) -> Result<()> {
        self.db.in_transaction(|conn| {
            log_store::delete_all(conn)?;
            SettingsStorage::clear_pin(conn)?;
            Ok(())
        })?;
        self.reload_settings()?;
        self.session.install(self.settings.encryption_key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn journal() -> Journal {
        Journal::open_in_memory(Arc::new(ManualClock::new(1_700_000_000_000))).unwrap()
    }

    #[test]
    fn test_fresh_journal_is_open_with_device_key() {
        let journal = journal();
        assert_eq!(journal.gate_state(), GateState::NoPinConfigured);
        assert!(journal.is_unlocked());
        assert_eq!(
            journal.session().secret().unwrap().expose(),
            journal.settings().encryption_key.expose()
        );
    }

    #[test]
    fn test_enable_pin_reseals_existing_logs() {
        let mut journal = journal();
        let id = journal
            .logs()
            .create(journal.session(), &SymptomLog::new("ptsd", 6, 1))
            .unwrap();

        let summary = journal.enable_pin("1234").unwrap();
        assert_eq!(summary.resealed, 1);
        assert!(journal.settings().pin_enabled);
        assert_eq!(journal.gate_state(), GateState::Unlocked);

        journal.lock();
        assert!(!journal.is_unlocked());
        assert!(matches!(
            journal.logs().get(journal.session(), id),
            Err(Error::KeyNotSet)
        ));

        journal.enter_pin("1234").unwrap();
        let log = journal.logs().get(journal.session(), id).unwrap().unwrap();
        assert_eq!(log.as_log().unwrap().pain_level, 6);
    }

    #[test]
    fn test_disable_pin_returns_to_device_key() {
        let mut journal = journal();
        journal.enable_pin("1234").unwrap();
        journal
            .logs()
            .create(journal.session(), &SymptomLog::new("sinus", 3, 2))
            .unwrap();

        journal.disable_pin().unwrap();
        assert_eq!(journal.gate_state(), GateState::NoPinConfigured);
        let decoded = journal.logs().get_all(journal.session()).unwrap();
        assert!(!decoded[0].is_corrupt());

        assert!(matches!(journal.disable_pin(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_pin_changes_need_an_open_session() {
        let mut journal = journal();
        journal.enable_pin("1234").unwrap();
        journal.lock();
        assert!(matches!(journal.enable_pin("5678"), Err(Error::KeyNotSet)));
        assert!(matches!(journal.disable_pin(), Err(Error::KeyNotSet)));
        assert!(matches!(
            journal.clear_all_data(CLEAR_CONFIRMATION),
            Err(Error::KeyNotSet)
        ));
    }

    #[test]
    fn test_clear_all_data_requires_confirmation() {
        let mut journal = journal();
        journal
            .logs()
            .create(journal.session(), &SymptomLog::new("ptsd", 6, 1))
            .unwrap();

        assert!(journal.clear_all_data("delete").is_err());
        assert_eq!(journal.logs().count().unwrap(), 1);
        assert_eq!(journal.clear_all_data("DELETE").unwrap(), 1);
        assert_eq!(journal.logs().count().unwrap(), 0);
    }

    #[test]
    fn test_export_records_time() {
        let mut journal = journal();
        journal
            .logs()
            .create(journal.session(), &SymptomLog::new("ptsd", 6, 1))
            .unwrap();
        let backup = journal.export_backup().unwrap();
        assert_eq!(backup.log_count, 1);
        assert_eq!(
            journal.settings().last_export_date,
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_follow_up_stamped_by_journal_clock() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let journal = Journal::open_in_memory(clock.clone()).unwrap();
        let id = journal
            .logs()
            .create(journal.session(), &SymptomLog::new("migraine", 8, 1_700_000_000_000))
            .unwrap();

        clock.advance(std::time::Duration::from_secs(3600));
        let log = journal.record_follow_up(id, 4).unwrap();
        assert_eq!(log.follow_up_pain_level, Some(4));
        assert_eq!(log.follow_up_timestamp, Some(1_700_003_600_000));
    }

    #[test]
    fn test_enter_pin_rejects_non_digits() {
        let mut journal = journal();
        journal.enable_pin("1234").unwrap();
        journal.lock();
        assert!(matches!(journal.enter_pin("12a4"), Err(Error::Validation(_))));
        assert_eq!(journal.gate_state(), GateState::Locked);
        assert_eq!(journal.gate().failed_attempts(), 0);

        let effects = journal.enter_pin("1234").unwrap();
        assert!(matches!(effects.as_slice(), [GateEffect::Unlocked(_)]));
    }

    #[test]
    fn test_enter_pin_rejects_wrong_length() {
        let mut journal = journal();
        journal.enable_pin("1234").unwrap();
        journal.lock();

        for pin in ["12345", "00001234", "123", ""] {
            assert!(matches!(journal.enter_pin(pin), Err(Error::Validation(_))));
            assert!(!journal.is_unlocked(), "{} unlocked", pin);
        }
        assert_eq!(journal.gate().failed_attempts(), 0);
        assert_eq!(journal.gate_state(), GateState::Locked);
    }

    #[test]
    fn test_enter_pin_clears_pending_keypad_digits() {
        let mut journal = journal();
        journal.enable_pin("1234").unwrap();
        journal.lock();

        journal.handle(GateEvent::Digit(9)).unwrap();
        journal.handle(GateEvent::Digit(9)).unwrap();
        assert_eq!(journal.gate_state(), GateState::Unlocking { entered: 2 });

        journal.enter_pin("1234").unwrap();
        assert!(journal.is_unlocked());
        assert_eq!(journal.gate().failed_attempts(), 0);
    }
}
