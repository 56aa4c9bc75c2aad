//! Single-row application settings
//!
//! Holds the device key, the PIN record and the user's home-screen
//! preferences. The row is created on first launch by [`SettingsStorage::initialize`].

use crate::error::{Error, Result};
use crate::models::{UserSettings, DEFAULT_ACTIVE_SYMPTOM_IDS};
use postopp_core::{generate_device_key, PinRecord, Secret};
use rusqlite::{params, Connection, OptionalExtension};

/// Most symptoms shown on the home screen
pub const MAX_ACTIVE_SYMPTOMS: usize = 4;

/// Fewest symptoms shown on the home screen
pub const MIN_ACTIVE_SYMPTOMS: usize = 1;

/// Allowed follow-up reminder delays
pub const FOLLOW_UP_DELAY_OPTIONS: [u32; 3] = [30, 60, 120];

/// Default follow-up reminder delay
pub const DEFAULT_FOLLOW_UP_DELAY_MINUTES: u32 = 60;

/// Settings storage
pub struct SettingsStorage;

impl SettingsStorage {
    /// Create the settings row on first launch, or backfill a missing device key.
    pub fn initialize(conn: &Connection) -> Result<UserSettings> {
        let existing: Option<Option<String>> = conn
            .query_row("SELECT encryption_key FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match existing {
            None => {
                let active = serde_json::to_string(&DEFAULT_ACTIVE_SYMPTOM_IDS)?;
                let device_key = generate_device_key();
                conn.execute(
                    r#"
                    INSERT INTO settings
                        (id, active_symptom_ids, notifications_enabled, follow_up_delay_minutes,
                         installed_at, last_export_date, pin_hash, pin_enabled,
                         encryption_key, onboarding_completed)
                    VALUES (1, ?1, 0, ?2, ?3, NULL, NULL, 0, ?4, 0)
                    "#,
                    params![
                        active,
                        DEFAULT_FOLLOW_UP_DELAY_MINUTES,
                        chrono::Utc::now().timestamp_millis(),
                        device_key.expose(),
                    ],
                )?;
                tracing::info!("Created settings with a new device key");
            }
            Some(key) if key.as_deref().map_or(true, str::is_empty) => {
                // Rows written before the device key existed never had a PIN either
                let device_key = generate_device_key();
                conn.execute(
                    r#"
                    UPDATE settings SET
                        encryption_key = ?1,
                        pin_hash = NULL,
                        pin_enabled = 0,
                        onboarding_completed = 0
                    WHERE id = 1
                    "#,
                    params![device_key.expose()],
                )?;
                tracing::info!("Backfilled missing device key in settings");
            }
            Some(_) => {}
        }

        Self::load(conn)
    }

    /// Load settings
    pub fn load(conn: &Connection) -> Result<UserSettings> {
        let row = conn
            .query_row(
                r#"
                SELECT active_symptom_ids, notifications_enabled, follow_up_delay_minutes,
                       installed_at, last_export_date, pin_hash, pin_enabled,
                       encryption_key, onboarding_completed
                FROM settings WHERE id = 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, bool>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, bool>(8)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound("Settings not initialized".to_string()))?;

        let (
            active_json,
            notifications_enabled,
            follow_up_delay,
            installed_at,
            last_export_date,
            pin_hash,
            pin_enabled,
            encryption_key,
            onboarding_completed,
        ) = row;

        let encryption_key = encryption_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Security("Device key missing from settings".to_string()))?;

        Ok(UserSettings {
            active_symptom_ids: serde_json::from_str(&active_json)?,
            notifications_enabled,
            follow_up_delay_minutes: u32::try_from(follow_up_delay)
                .unwrap_or(DEFAULT_FOLLOW_UP_DELAY_MINUTES),
            installed_at,
            last_export_date,
            pin_hash,
            pin_enabled,
            encryption_key: Secret::new(encryption_key),
            onboarding_completed,
        })
    }

    /// Add or remove a symptom from the home screen.
    ///
    /// Returns the new active list.
    pub fn toggle_active_symptom(conn: &Connection, symptom_id: &str) -> Result<Vec<String>> {
        let mut active = Self::load(conn)?.active_symptom_ids;

        if let Some(pos) = active.iter().position(|id| id == symptom_id) {
            if active.len() <= MIN_ACTIVE_SYMPTOMS {
                return Err(Error::Validation(format!(
                    "At least {} symptom must stay active",
                    MIN_ACTIVE_SYMPTOMS
                )));
            }
            active.remove(pos);
        } else {
            if active.len() >= MAX_ACTIVE_SYMPTOMS {
                return Err(Error::Validation(format!(
                    "At most {} symptoms can be active",
                    MAX_ACTIVE_SYMPTOMS
                )));
            }
            active.push(symptom_id.to_string());
        }

        Self::write_active(conn, &active)?;
        Ok(active)
    }

    /// Replace the active symptom list
    pub fn set_active_symptoms(conn: &Connection, ids: &[String]) -> Result<()> {
        if ids.len() < MIN_ACTIVE_SYMPTOMS || ids.len() > MAX_ACTIVE_SYMPTOMS {
            return Err(Error::Validation(format!(
                "Between {} and {} symptoms must be active",
                MIN_ACTIVE_SYMPTOMS, MAX_ACTIVE_SYMPTOMS
            )));
        }
        Self::write_active(conn, ids)
    }

    fn write_active(conn: &Connection, ids: &[String]) -> Result<()> {
        conn.execute(
            "UPDATE settings SET active_symptom_ids = ?1 WHERE id = 1",
            params![serde_json::to_string(ids)?],
        )?;
        Ok(())
    }

    /// Enable or disable follow-up reminders
    pub fn set_notifications(conn: &Connection, enabled: bool) -> Result<()> {
        conn.execute(
            "UPDATE settings SET notifications_enabled = ?1 WHERE id = 1",
            params![enabled],
        )?;
        Ok(())
    }

    /// Set the follow-up reminder delay (30, 60 or 120 minutes)
    pub fn set_follow_up_delay(conn: &Connection, minutes: u32) -> Result<()> {
        if !FOLLOW_UP_DELAY_OPTIONS.contains(&minutes) {
            return Err(Error::Validation(format!(
                "Follow-up delay must be one of {:?} minutes",
                FOLLOW_UP_DELAY_OPTIONS
            )));
        }
        conn.execute(
            "UPDATE settings SET follow_up_delay_minutes = ?1 WHERE id = 1",
            params![minutes],
        )?;
        Ok(())
    }

    /// Mark the disclaimer as accepted
    pub fn complete_onboarding(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE settings SET onboarding_completed = 1 WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    /// Remember when the last backup was exported
    pub fn record_export(conn: &Connection, at_ms: i64) -> Result<()> {
        conn.execute(
            "UPDATE settings SET last_export_date = ?1 WHERE id = 1",
            params![at_ms],
        )?;
        Ok(())
    }

    /// Store a PIN record and enable the gate
    pub fn set_pin_hash(conn: &Connection, record: &PinRecord) -> Result<()> {
        conn.execute(
            "UPDATE settings SET pin_hash = ?1, pin_enabled = 1 WHERE id = 1",
            params![record.as_str()],
        )?;
        tracing::info!("PIN enabled");
        Ok(())
    }

    /// Remove the PIN record and disable the gate
    pub fn clear_pin(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE settings SET pin_hash = NULL, pin_enabled = 0 WHERE id = 1",
            [],
        )?;
        tracing::info!("PIN disabled");
        Ok(())
    }

    /// Restore defaults after all logs are cleared. PIN settings are untouched.
    pub fn reset_after_clear(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE settings SET active_symptom_ids = ?1, last_export_date = NULL WHERE id = 1",
            params![serde_json::to_string(&DEFAULT_ACTIVE_SYMPTOM_IDS)?],
        )?;
        Ok(())
    }
}
