//! Full-database backups as a versioned JSON envelope.
//!
//! A backup holds every student, their clinical logs grouped by student id,
//! and count metadata. Restoring merges into the current store: records with
//! a matching id are overwritten, everything else is inserted, and nothing
//! is deleted.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::domain::{ClinicalLog, Student, StudentId};
use storage::RecordStore;
use thiserror::Error;
use tracing::{info, warn};

use crate::action::{restore_clinical_log, restore_student};

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid backup: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub student_count: usize,
    pub log_count: usize,
    pub exported_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBackup {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub students: Vec<Student>,
    pub clinical_logs: BTreeMap<StudentId, Vec<ClinicalLog>>,
    pub metadata: BackupMetadata,
}

impl DatabaseBackup {
    pub fn log_count(&self) -> usize {
        self.clinical_logs.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub students_restored: usize,
    pub logs_restored: usize,
    /// One message per record that could not be written.
    pub failures: Vec<String>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Snapshots every student and their clinical logs.
pub async fn create_backup(store: &dyn RecordStore, exported_by: &str) -> Result<DatabaseBackup> {
    let students = store.list_students().await?;
    let mut clinical_logs = BTreeMap::new();
    for student in &students {
        let logs = store.list_clinical_logs(Some(&student.id)).await?;
        clinical_logs.insert(student.id.clone(), logs);
    }

    let mut backup = DatabaseBackup {
        version: BACKUP_VERSION.to_string(),
        timestamp: Utc::now(),
        metadata: BackupMetadata {
            student_count: students.len(),
            log_count: 0,
            exported_by: exported_by.to_string(),
        },
        students,
        clinical_logs,
    };
    backup.metadata.log_count = backup.log_count();
    info!(
        students = backup.metadata.student_count,
        logs = backup.metadata.log_count,
        "backup created"
    );
    Ok(backup)
}

/// Pretty-printed JSON, ready to write to disk.
pub fn export_backup(backup: &DatabaseBackup) -> Result<Vec<u8>, BackupError> {
    Ok(serde_json::to_vec_pretty(backup)?)
}

/// Default download name, e.g. `nursed-backup-2025-09-14.json`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("nursed-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Parses and validates a backup file. Structural problems are collected
/// and reported together before any typed decoding happens.
pub fn parse_backup(bytes: &[u8]) -> Result<DatabaseBackup, BackupError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    let errors = structure_errors(&raw);
    if !errors.is_empty() {
        return Err(BackupError::Invalid(errors));
    }
    let backup: DatabaseBackup = serde_json::from_value(raw)?;
    let errors = validate_backup(&backup);
    if !errors.is_empty() {
        return Err(BackupError::Invalid(errors));
    }
    Ok(backup)
}

fn structure_errors(raw: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if !raw.get("version").is_some_and(Value::is_string) {
        errors.push("Missing version number".to_string());
    }
    if !raw.get("students").is_some_and(Value::is_array) {
        errors.push("Invalid students data".to_string());
    }
    if !raw.get("clinicalLogs").is_some_and(Value::is_object) {
        errors.push("Invalid clinical logs data".to_string());
    }
    if !raw.get("metadata").is_some_and(Value::is_object) {
        errors.push("Missing metadata".to_string());
    }
    errors
}

/// Consistency checks on a decoded backup. An empty list means it is safe
/// to restore.
pub fn validate_backup(backup: &DatabaseBackup) -> Vec<String> {
    let mut errors = Vec::new();

    let major = backup.version.split('.').next().unwrap_or_default();
    if backup.version.trim().is_empty() {
        errors.push("Missing version number".to_string());
    } else if major != "1" {
        errors.push(format!("Unsupported backup version {}", backup.version));
    }

    let mut student_ids = HashSet::new();
    for student in &backup.students {
        if !student_ids.insert(&student.id) {
            errors.push(format!("Duplicate student {}", student.id));
        }
    }

    let mut log_ids = HashSet::new();
    for (owner, logs) in &backup.clinical_logs {
        if !student_ids.contains(owner) {
            errors.push(format!("Clinical logs for unknown student {owner}"));
        }
        for log in logs {
            if !log_ids.insert(&log.id) {
                errors.push(format!("Duplicate clinical log {}", log.id));
            }
            if &log.student_id != owner {
                errors.push(format!(
                    "Clinical log {} belongs to {} but is filed under {owner}",
                    log.id, log.student_id
                ));
            }
        }
    }

    if backup.metadata.student_count != backup.students.len()
        || backup.metadata.log_count != backup.log_count()
    {
        warn!(
            expected_students = backup.metadata.student_count,
            expected_logs = backup.metadata.log_count,
            students = backup.students.len(),
            logs = backup.log_count(),
            "backup metadata counts do not match its contents"
        );
    }
    errors
}

/// Merges a validated backup into the store. Individual record failures
/// are collected in the report and do not stop the restore.
pub async fn import_backup(store: &dyn RecordStore, backup: &DatabaseBackup) -> Result<RestoreReport> {
    let errors = validate_backup(backup);
    if !errors.is_empty() {
        return Err(BackupError::Invalid(errors).into());
    }

    let mut report = RestoreReport::default();
    for student in &backup.students {
        match restore_student(store, student).await {
            Ok(()) => report.students_restored += 1,
            Err(err) => {
                warn!(student_id = %student.id, "failed to restore student: {err:#}");
                report
                    .failures
                    .push(format!("student {}: {err:#}", student.id));
            }
        }
    }
    for log in backup.clinical_logs.values().flatten() {
        match restore_clinical_log(store, log).await {
            Ok(()) => report.logs_restored += 1,
            Err(err) => {
                warn!(log_id = %log.id, "failed to restore clinical log: {err:#}");
                report
                    .failures
                    .push(format!("clinical log {}: {err:#}", log.id));
            }
        }
    }

    info!(
        students = report.students_restored,
        logs = report.logs_restored,
        failed = report.failures.len(),
        "backup restored"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "tests/backup_tests.rs"]
mod tests;
