use super::*;
use crate::test_support::{clinical_log, student, FakeStore};

fn seeded_store() -> std::sync::Arc<FakeStore> {
    let mut jane = student("S001", "Jane", "Doe");
    jane.skills_completed = vec!["cpr".to_string()];
    let store = FakeStore::with_students([jane, student("S002", "John", "Roe")]);
    store.insert_log(clinical_log("L1", "S001"));
    store.insert_log(clinical_log("L2", "S001"));
    store
}

#[tokio::test]
async fn backups_group_logs_by_student_and_count_them() {
    let store = seeded_store();
    let backup = create_backup(store.as_ref(), "instructor").await.expect("backup");

    assert_eq!(backup.version, BACKUP_VERSION);
    assert_eq!(backup.metadata.student_count, 2);
    assert_eq!(backup.metadata.log_count, 2);
    assert_eq!(backup.metadata.exported_by, "instructor");
    assert_eq!(backup.clinical_logs[&StudentId::new("S001")].len(), 2);
    assert!(backup.clinical_logs[&StudentId::new("S002")].is_empty());
    assert!(validate_backup(&backup).is_empty());
}

#[tokio::test]
async fn exported_backups_parse_back_with_camel_case_fields() {
    let store = seeded_store();
    let backup = create_backup(store.as_ref(), "instructor").await.expect("backup");
    let bytes = export_backup(&backup).expect("export");

    let raw: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(raw["metadata"]["studentCount"], 2);
    assert!(raw["clinicalLogs"]["S001"].is_array());

    assert_eq!(parse_backup(&bytes).expect("parse"), backup);
}

#[test]
fn malformed_envelopes_report_every_problem() {
    let err = parse_backup(br#"{"students": {}, "clinicalLogs": []}"#).expect_err("malformed");
    let BackupError::Invalid(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert_eq!(
        errors,
        [
            "Missing version number",
            "Invalid students data",
            "Invalid clinical logs data",
            "Missing metadata",
        ]
    );
    assert!(matches!(parse_backup(b"not json"), Err(BackupError::Json(_))));
}

#[test]
fn inconsistent_contents_are_rejected() {
    let jane = student("S001", "Jane", "Doe");
    let misfiled = clinical_log("L1", "S002");
    let backup = DatabaseBackup {
        version: "2.0".to_string(),
        timestamp: Utc::now(),
        students: vec![jane.clone(), jane],
        clinical_logs: BTreeMap::from([
            (StudentId::new("S001"), vec![misfiled]),
            (StudentId::new("S404"), vec![clinical_log("L1", "S404")]),
        ]),
        metadata: BackupMetadata {
            student_count: 2,
            log_count: 2,
            exported_by: "instructor".to_string(),
        },
    };

    let errors = validate_backup(&backup);
    assert_eq!(
        errors,
        [
            "Unsupported backup version 2.0",
            "Duplicate student S001",
            "Clinical log L1 belongs to S002 but is filed under S001",
            "Clinical logs for unknown student S404",
            "Duplicate clinical log L1",
        ]
    );
    let bytes = export_backup(&backup).expect("export");
    let err = parse_backup(&bytes).expect_err("inconsistent");
    assert!(err.to_string().starts_with("invalid backup: Unsupported backup version 2.0, "));
}

#[tokio::test]
async fn restore_overwrites_matches_and_inserts_the_rest() {
    let source = seeded_store();
    let backup = create_backup(source.as_ref(), "instructor").await.expect("backup");

    let mut stale = student("S001", "Janet", "Doe");
    stale.skills_completed.clear();
    let target = FakeStore::with_students([stale, student("S003", "Mia", "Poe")]);

    let report = import_backup(target.as_ref(), &backup).await.expect("restore");
    assert!(report.is_clean());
    assert_eq!(report.students_restored, 2);
    assert_eq!(report.logs_restored, 2);

    let jane = target.student("S001").expect("restored");
    assert_eq!(jane.first_name, "Jane");
    assert_eq!(jane.skills_completed, ["cpr"]);
    assert!(target.student("S002").is_some());
    // Merge, not replace.
    assert!(target.student("S003").is_some());
    assert_eq!(target.log_count(), 2);

    // Restoring twice overwrites instead of duplicating.
    import_backup(target.as_ref(), &backup).await.expect("restore again");
    assert_eq!(target.log_count(), 2);
}

#[tokio::test]
async fn restore_collects_record_failures() {
    let source = seeded_store();
    let backup = create_backup(source.as_ref(), "instructor").await.expect("backup");
    let target = FakeStore::with_students([]);
    target.fail_on("create_clinical_log", "disk full");

    let report = import_backup(target.as_ref(), &backup).await.expect("restore");
    assert_eq!(report.students_restored, 2);
    assert_eq!(report.logs_restored, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].starts_with("clinical log L1: "));
}

#[test]
fn file_names_carry_the_date() {
    let date = NaiveDate::from_ymd_opt(2025, 9, 14).expect("date");
    assert_eq!(backup_file_name(date), "nursed-backup-2025-09-14.json");
}
