//! Plaintext JSON backup export and import
//!
//! ```json
//! { "app": "PostOpp", "version": 1, "exportedAt": "2024-01-01T00:00:00Z",
//!   "logCount": 1, "logs": [ { "symptomId": "ptsd", "painLevel": 5, ... } ] }
//! ```
//!
//! Import rejects the whole file when the framing is wrong and skips
//! individual entries that lack a required field.

use crate::error::{Error, Result};
use crate::log_store::LogStore;
use crate::models::{SymptomLog, MAX_PAIN_LEVEL, MIN_PAIN_LEVEL};
use crate::session::SessionKeyContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// App identifier written to and required in backups
pub const BACKUP_APP_ID: &str = "PostOpp";

/// Backup format version
pub const BACKUP_VERSION: u32 = 1;

/// Backup file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Always `PostOpp`
    pub app: String,
    /// Format version
    pub version: u32,
    /// Export time (RFC 3339)
    pub exported_at: String,
    /// Number of entries in `logs`
    pub log_count: usize,
    /// Plaintext logs without ids
    pub logs: Vec<SymptomLog>,
}

impl Backup {
    /// Frame `logs` for export
    pub fn new(logs: Vec<SymptomLog>) -> Self {
        Self {
            app: BACKUP_APP_ID.to_string(),
            version: BACKUP_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            log_count: logs.len(),
            logs,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Entries written to the store
    pub imported: usize,
    /// Entries dropped for missing or invalid required fields
    pub skipped: usize,
}

/// Export every decryptable log as a backup document
pub fn export_backup(store: &LogStore<'_>, session: &SessionKeyContext) -> Result<Backup> {
    let logs = store.export_all(session)?;
    tracing::info!("Exporting backup with {} logs", logs.len());
    Ok(Backup::new(logs))
}

/// Parse backup JSON into importable logs.
///
/// Fails with [`Error::MalformedBackup`] when the document is not JSON, is
/// not a PostOpp backup, or has no `logs` array.
pub fn parse_backup(json: &str) -> Result<(Vec<SymptomLog>, usize)> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| Error::MalformedBackup(format!("Not valid JSON: {}", e)))?;

    let root = root
        .as_object()
        .ok_or_else(|| Error::MalformedBackup("Top level is not an object".to_string()))?;

    match root.get("app").and_then(Value::as_str) {
        Some(BACKUP_APP_ID) => {}
        Some(other) => {
            return Err(Error::MalformedBackup(format!(
                "Backup belongs to app '{}'",
                other
            )))
        }
        None => return Err(Error::MalformedBackup("Missing app field".to_string())),
    }

    let entries = root
        .get("logs")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedBackup("Missing logs array".to_string()))?;

    let mut logs = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.iter().enumerate() {
        match entry.as_object().and_then(parse_entry) {
            Some(log) => logs.push(log),
            None => {
                tracing::warn!("Skipping malformed backup entry {}", index);
                skipped += 1;
            }
        }
    }

    Ok((logs, skipped))
}

/// Parse and import a backup document under the session secret.
///
/// Nothing is written unless the framing is valid.
pub fn import_backup(
    store: &LogStore<'_>,
    session: &SessionKeyContext,
    json: &str,
) -> Result<ImportSummary> {
    let (logs, skipped) = parse_backup(json)?;
    let imported = store.import_all(session, &logs)?;
    Ok(ImportSummary {
        imported,
        skipped: skipped + (logs.len() - imported),
    })
}

fn parse_entry(entry: &Map<String, Value>) -> Option<SymptomLog> {
    let symptom_id = entry.get("symptomId")?.as_str().filter(|id| !id.is_empty())?;
    let level = pain_level(entry.get("painLevel")?)?;
    let timestamp = entry.get("timestamp")?.as_i64()?;

    let mut log = SymptomLog::new(symptom_id, level, timestamp);
    log.latitude = entry.get("latitude").and_then(Value::as_f64);
    log.longitude = entry.get("longitude").and_then(Value::as_f64);
    log.location_accuracy = entry.get("locationAccuracy").and_then(Value::as_f64);
    log.follow_up_pain_level = entry.get("followUpPainLevel").and_then(pain_level);
    log.follow_up_timestamp = entry.get("followUpTimestamp").and_then(Value::as_i64);
    log.notes = entry
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(log)
}

fn pain_level(value: &Value) -> Option<u8> {
    let level = u8::try_from(value.as_u64()?).ok()?;
    (MIN_PAIN_LEVEL..=MAX_PAIN_LEVEL)
        .contains(&level)
        .then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_minimal_entry() {
        let (logs, skipped) = parse_backup(
            r#"{"app":"PostOpp","logs":[{"symptomId":"ptsd","painLevel":5,"timestamp":1700000000000}]}"#,
        )
        .unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(logs.len(), 1);

        let log = &logs[0];
        assert_eq!(log.symptom_id, "ptsd");
        assert_eq!(log.pain_level, 5);
        assert_eq!(log.timestamp, 1_700_000_000_000);
        assert!(log.latitude.is_none());
        assert!(log.follow_up_pain_level.is_none());
        assert_eq!(log.notes, "");
    }

    #[test]
    fn test_wrong_app_rejected() {
        let result = parse_backup(r#"{"app":"Other","logs":[]}"#);
        assert!(matches!(result, Err(Error::MalformedBackup(_))));
    }

    #[test]
    fn test_framing_errors() {
        for json in [
            "not json",
            "[]",
            r#"{"logs":[]}"#,
            r#"{"app":"PostOpp"}"#,
            r#"{"app":"PostOpp","logs":{}}"#,
        ] {
            assert!(
                matches!(parse_backup(json), Err(Error::MalformedBackup(_))),
                "{} accepted",
                json
            );
        }
    }

    #[test]
    fn test_bad_entries_skipped() {
        let (logs, skipped) = parse_backup(
            r#"{"app":"PostOpp","logs":[
                {"symptomId":"ptsd","timestamp":1},
                {"symptomId":"ptsd","painLevel":"5","timestamp":2},
                {"symptomId":"ptsd","painLevel":11,"timestamp":3},
                {"painLevel":4,"timestamp":4},
                {"symptomId":"","painLevel":4,"timestamp":4},
                7,
                {"symptomId":"sinus","painLevel":4,"timestamp":5,"notes":"ok","latitude":1.5}
            ]}"#,
        )
        .unwrap();
        assert_eq!(skipped, 6);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].notes, "ok");
        assert_eq!(logs[0].latitude, Some(1.5));
    }

    #[test]
    fn test_backup_framing_serialized() {
        let backup = Backup::new(vec![SymptomLog::new("migraine", 7, 10)]);
        let value: Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();
        assert_eq!(value["app"], "PostOpp");
        assert_eq!(value["version"], 1);
        assert_eq!(value["logCount"], 1);
        assert!(value["exportedAt"].as_str().unwrap().ends_with('Z'));
        assert!(value["logs"][0].get("id").is_none());
        assert_eq!(value["logs"][0]["symptomId"], "migraine");
    }

    #[test]
    fn test_export_parses_back() {
        let backup = Backup::new(vec![
            SymptomLog::new("migraine", 7, 10).with_notes("n"),
            SymptomLog::new("ptsd", 2, 20),
        ]);
        let (logs, skipped) = parse_backup(&backup.to_json().unwrap()).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(logs, backup.logs);
    }

    proptest! {
        #[test]
        fn prop_entry_kept_only_with_valid_pain_level(level in 0u64..300, ts in any::<i64>()) {
            let json = format!(
                r#"{{"app":"PostOpp","logs":[{{"symptomId":"ptsd","painLevel":{},"timestamp":{}}}]}}"#,
                level, ts
            );
            let (logs, skipped) = parse_backup(&json).unwrap();
            let valid = (1..=10).contains(&level);
            prop_assert_eq!(logs.len(), usize::from(valid));
            prop_assert_eq!(skipped, usize::from(!valid));
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in ".{0,200}") {
            let _ = parse_backup(&text);
        }
    }
}
