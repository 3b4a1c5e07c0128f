use shared::domain::{ClinicalLog, ClinicalLogId, LogStatus, Student, StudentId, StudentStatus};
use storage::{RecordStore, Storage};

#[tokio::test]
async fn student_lifecycle_through_trait_object() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        temp_root
            .path()
            .join("records.db")
            .to_string_lossy()
            .replace('\\', "/")
    );
    let storage = Storage::new(&database_url).await.expect("db");
    let store: &dyn RecordStore = &storage;

    let mut student = Student::new(StudentId::new("S100"), "Maria", "Lopez", "Spring 2026");
    store.create_student(&student).await.expect("create");

    student.status = StudentStatus::Graduated;
    student.clinical_hours_completed = 400.0;
    store.update_student(&student).await.expect("update");

    store
        .create_clinical_log(&ClinicalLog {
            id: ClinicalLogId::new("L100"),
            student_id: student.id.clone(),
            date: "2026-02-10".into(),
            site_name: "Luray Clinic".into(),
            patient_diagnosis: "Type 2 diabetes".into(),
            mapped_competencies: Vec::new(),
            status: LogStatus::Approved,
            instructor_feedback: None,
            hours: 6.5,
            is_simulation: false,
            is_makeup: true,
        })
        .await
        .expect("log");

    drop(storage);

    // Reopen to confirm the records outlive the pool.
    let reopened = Storage::new(&database_url).await.expect("reopen");
    let loaded = reopened
        .get_student(&student.id)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(loaded.status, StudentStatus::Graduated);
    let logs = reopened
        .list_clinical_logs(Some(&student.id))
        .await
        .expect("logs");
    assert_eq!(logs.len(), 1);
    assert!(logs[0].is_makeup);
}
