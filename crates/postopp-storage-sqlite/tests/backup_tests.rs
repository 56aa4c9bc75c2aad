//! Backup import and export through the journal

use postopp_storage_sqlite::{Error, ImportSummary, Journal, ManualClock, SymptomLog};
use std::sync::Arc;

fn journal() -> Journal {
    Journal::open_in_memory(Arc::new(ManualClock::new(1_700_000_000_000))).unwrap()
}

#[test]
fn test_import_single_record() {
    let journal = journal();
    let summary = journal
        .import_backup(
            r#"{"app":"PostOpp","version":1,"logs":[{"symptomId":"ptsd","painLevel":5,"timestamp":1700000000000}]}"#,
        )
        .unwrap();

    assert_eq!(summary, ImportSummary { imported: 1, skipped: 0 });

    let logs = journal.logs().export_all(journal.session()).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].symptom_id, "ptsd");
    assert_eq!(logs[0].pain_level, 5);
    assert_eq!(logs[0].timestamp, 1_700_000_000_000);
}

#[test]
fn test_foreign_backup_rejected_without_writes() {
    let journal = journal();
    let result = journal.import_backup(
        r#"{"app":"Other","logs":[{"symptomId":"ptsd","painLevel":5,"timestamp":1}]}"#,
    );

    assert!(matches!(result, Err(Error::MalformedBackup(_))));
    assert_eq!(journal.logs().count().unwrap(), 0);
}

#[test]
fn test_entry_missing_pain_level_skipped() {
    let journal = journal();
    let summary = journal
        .import_backup(
            r#"{"app":"PostOpp","logs":[
                {"symptomId":"ptsd","timestamp":1},
                {"symptomId":"migraine","painLevel":8,"timestamp":2}
            ]}"#,
        )
        .unwrap();

    assert_eq!(summary, ImportSummary { imported: 1, skipped: 1 });
    assert_eq!(journal.logs().count().unwrap(), 1);
}

#[test]
fn test_export_then_import_into_new_journal() {
    let mut source = journal();
    let session = source.session();
    source
        .logs()
        .create(
            session,
            &SymptomLog::new("hip-pain", 6, 10).with_location(51.5, -0.12, Some(8.0)),
        )
        .unwrap();
    source
        .logs()
        .create(session, &SymptomLog::new("sinus", 3, 20).with_notes("pollen"))
        .unwrap();

    let json = source.export_backup().unwrap().to_json().unwrap();

    // Different device key on the receiving side
    let target = journal();
    let summary = target.import_backup(&json).unwrap();
    assert_eq!(summary.imported, 2);

    let mut original = source.logs().export_all(source.session()).unwrap();
    let mut imported = target.logs().export_all(target.session()).unwrap();
    original.sort_by_key(|l| l.timestamp);
    imported.sort_by_key(|l| l.timestamp);
    assert_eq!(original, imported);
}
