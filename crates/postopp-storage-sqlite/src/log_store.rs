//! Encrypted symptom log store
//!
//! Each row keeps `timestamp` in the clear for ordering and range queries.
//! Every other field is serialized to JSON and sealed with the session
//! secret into `encrypted_data`. A row that fails to open under the current
//! secret is returned as [`DecodedLog::Corrupt`] instead of failing the read.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::models::{DecodedLog, SymptomLog, MAX_PAIN_LEVEL, MIN_PAIN_LEVEL};
use crate::session::SessionKeyContext;
use postopp_core::{open_str, seal_str, SealedBlob, Secret};
use rusqlite::{params, Connection, OptionalExtension};

/// Outcome of re-encrypting every row under a new secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResealSummary {
    /// Rows now sealed under the new secret
    pub resealed: usize,
    /// Rows that did not open under the old secret and were left as they were
    pub skipped: usize,
}

/// Check pain level bounds
pub fn validate_pain_level(pain_level: u8) -> Result<()> {
    if !(MIN_PAIN_LEVEL..=MAX_PAIN_LEVEL).contains(&pain_level) {
        return Err(Error::Validation(format!(
            "Pain level must be between {} and {}",
            MIN_PAIN_LEVEL, MAX_PAIN_LEVEL
        )));
    }
    Ok(())
}

/// Encrypted log store
pub struct LogStore<'a> {
    db: &'a Database,
}

impl<'a> LogStore<'a> {
    /// Create store over an open database
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Seal and insert a new log. Any `id` on the input is ignored.
    pub fn create(&self, session: &SessionKeyContext, log: &SymptomLog) -> Result<i64> {
        validate_log(log)?;
        let secret = session.secret()?;
        let id = insert_sealed(self.db.conn(), log, &secret)?;
        tracing::debug!("Created log {}", id);
        Ok(id)
    }

    /// Fetch one log
    pub fn get(&self, session: &SessionKeyContext, id: i64) -> Result<Option<DecodedLog>> {
        let secret = session.secret()?;
        let row = self
            .db
            .conn()
            .query_row(
                "SELECT id, timestamp, encrypted_data FROM logs WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()?;

        Ok(row.map(|(id, timestamp, sealed)| decode_row(id, timestamp, &sealed, &secret)))
    }

    /// All logs, newest first
    pub fn get_all(&self, session: &SessionKeyContext) -> Result<Vec<DecodedLog>> {
        let secret = session.secret()?;
        self.query_decoded(
            "SELECT id, timestamp, encrypted_data FROM logs ORDER BY timestamp DESC, id DESC",
            params![],
            &secret,
        )
    }

    /// Logs with `start_ms <= timestamp < end_ms`, newest first
    pub fn get_by_range(
        &self,
        session: &SessionKeyContext,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<DecodedLog>> {
        let secret = session.secret()?;
        self.query_decoded(
            r#"
            SELECT id, timestamp, encrypted_data FROM logs
            WHERE timestamp >= ?1 AND timestamp < ?2
            ORDER BY timestamp DESC, id DESC
            "#,
            params![start_ms, end_ms],
            &secret,
        )
    }

    /// Decryptable logs for one symptom within optional inclusive bounds,
    /// newest first.
    ///
    /// The symptom id is sealed, so every row in the window is opened and
    /// filtered afterwards. Corrupt rows never match.
    pub fn get_by_symptom(
        &self,
        session: &SessionKeyContext,
        symptom_id: &str,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Vec<SymptomLog>> {
        let secret = session.secret()?;
        let decoded = self.query_decoded(
            r#"
            SELECT id, timestamp, encrypted_data FROM logs
            WHERE (?1 IS NULL OR timestamp >= ?1) AND (?2 IS NULL OR timestamp <= ?2)
            ORDER BY timestamp DESC, id DESC
            "#,
            params![start_ms, end_ms],
            &secret,
        )?;

        Ok(decoded
            .into_iter()
            .filter_map(DecodedLog::into_log)
            .filter(|log| log.symptom_id == symptom_id)
            .collect())
    }

    /// Record the follow-up pain level for a log, stamped with `now_ms`
    pub fn update_follow_up(
        &self,
        session: &SessionKeyContext,
        id: i64,
        pain_level: u8,
        now_ms: i64,
    ) -> Result<SymptomLog> {
        validate_pain_level(pain_level)?;
        let secret = session.secret()?;
        let conn = self.db.conn();

        let (_, timestamp, sealed) = conn
            .query_row(
                "SELECT id, timestamp, encrypted_data FROM logs WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Log {}", id)))?;

        let mut log = match decode_row(id, timestamp, &sealed, &secret) {
            DecodedLog::Decrypted(log) => log,
            DecodedLog::Corrupt { id, .. } => return Err(Error::CorruptRecord { id }),
        };
        log.follow_up_pain_level = Some(pain_level);
        log.follow_up_timestamp = Some(now_ms);

        let sealed = seal_log(&log, &secret)?;
        conn.execute(
            "UPDATE logs SET encrypted_data = ?1 WHERE id = ?2",
            params![sealed.as_str(), id],
        )?;

        tracing::info!("Recorded follow-up for log {}", id);
        Ok(log)
    }

    /// Delete every log. Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize> {
        delete_all(self.db.conn())
    }

    /// Number of stored rows, including undecryptable ones
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Plaintext copy of every decryptable log, newest first, without ids
    pub fn export_all(&self, session: &SessionKeyContext) -> Result<Vec<SymptomLog>> {
        let decoded = self.get_all(session)?;
        let total = decoded.len();

        let logs: Vec<SymptomLog> = decoded
            .into_iter()
            .filter_map(DecodedLog::into_log)
            .map(|mut log| {
                log.id = None;
                log
            })
            .collect();

        if logs.len() < total {
            tracing::warn!(
                "Export skipped {} undecryptable logs",
                total - logs.len()
            );
        }
        Ok(logs)
    }

    /// Seal and insert `logs` in one transaction, skipping entries that fail
    /// validation. Returns the number written.
    pub fn import_all(&self, session: &SessionKeyContext, logs: &[SymptomLog]) -> Result<usize> {
        let secret = session.secret()?;

        let imported = self.db.in_transaction(|conn| {
            let mut imported = 0;
            for (index, log) in logs.iter().enumerate() {
                if let Err(e) = validate_log(log) {
                    tracing::warn!("Skipping import entry {}: {}", index, e);
                    continue;
                }
                insert_sealed(conn, log, &secret)?;
                imported += 1;
            }
            Ok(imported)
        })?;

        tracing::info!("Imported {} logs", imported);
        Ok(imported)
    }

    /// Re-encrypt every row from `old` to `new` in one transaction
    pub fn reseal_all(&self, old: &Secret, new: &Secret) -> Result<ResealSummary> {
        self.db.in_transaction(|conn| reseal_with(conn, old, new))
    }

    fn query_decoded<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
        secret: &Secret,
    ) -> Result<Vec<DecodedLog>> {
        let rows = fetch_rows(self.db.conn(), sql, params)?;
        Ok(rows
            .into_iter()
            .map(|(id, timestamp, sealed)| decode_row(id, timestamp, &sealed, secret))
            .collect())
    }
}

type RawRow = (i64, i64, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn fetch_rows<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<RawRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, read_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn validate_log(log: &SymptomLog) -> Result<()> {
    if log.symptom_id.is_empty() {
        return Err(Error::Validation("Symptom id cannot be empty".to_string()));
    }
    validate_pain_level(log.pain_level)?;
    if let Some(follow_up) = log.follow_up_pain_level {
        validate_pain_level(follow_up)?;
    }
    Ok(())
}

fn seal_log(log: &SymptomLog, secret: &Secret) -> Result<SealedBlob> {
    let payload = SymptomLog {
        id: None,
        ..log.clone()
    };
    let json = serde_json::to_string(&payload)?;
    Ok(seal_str(&json, secret)?)
}

fn open_log(id: i64, timestamp: i64, sealed: &str, secret: &Secret) -> Result<SymptomLog> {
    let blob = SealedBlob::from_encoded(sealed);
    let json = open_str(&blob, secret)?;
    let mut log: SymptomLog = serde_json::from_str(&json)?;
    log.id = Some(id);
    // The indexed column is authoritative
    log.timestamp = timestamp;
    Ok(log)
}

fn decode_row(id: i64, timestamp: i64, sealed: &str, secret: &Secret) -> DecodedLog {
    match open_log(id, timestamp, sealed, secret) {
        Ok(log) => DecodedLog::Decrypted(log),
        Err(e) => {
            tracing::warn!("Log {} could not be decrypted: {}", id, e);
            DecodedLog::Corrupt { id, timestamp }
        }
    }
}

pub(crate) fn insert_sealed(conn: &Connection, log: &SymptomLog, secret: &Secret) -> Result<i64> {
    let sealed = seal_log(log, secret)?;
    conn.execute(
        "INSERT INTO logs (timestamp, encrypted_data) VALUES (?1, ?2)",
        params![log.timestamp, sealed.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn delete_all(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM logs", [])?;
    tracing::info!("Deleted {} logs", deleted);
    Ok(deleted)
}

/// Reseal every row on `conn`; caller owns the transaction.
pub(crate) fn reseal_with(conn: &Connection, old: &Secret, new: &Secret) -> Result<ResealSummary> {
    let rows = fetch_rows(
        conn,
        "SELECT id, timestamp, encrypted_data FROM logs ORDER BY id",
        params![],
    )?;

    let mut summary = ResealSummary::default();
    for (id, timestamp, sealed) in rows {
        let log = match open_log(id, timestamp, &sealed, old) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!("Log {} left unchanged during reseal: {}", id, e);
                summary.skipped += 1;
                continue;
            }
        };
        let resealed = seal_log(&log, new)?;
        conn.execute(
            "UPDATE logs SET encrypted_data = ?1 WHERE id = ?2",
            params![resealed.as_str(), id],
        )?;
        summary.resealed += 1;
    }

    tracing::info!(
        "Resealed {} logs ({} skipped)",
        summary.resealed,
        summary.skipped
    );
    Ok(summary)
}
