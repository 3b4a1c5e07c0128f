//! Record lists rendered to downloadable byte blobs.

use std::collections::HashMap;

use serde::Serialize;
use shared::domain::{ClinicalLog, Student, StudentId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no {0} to export")]
    Empty(&'static str),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to finish export buffer: {0}")]
    Io(#[from] std::io::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Skills tracked on the competency ledger, as `(id, display name)`.
pub const CORE_SKILLS: [(&str, &str); 15] = [
    ("vitals", "Vital Signs Assessment"),
    ("handwashing", "Hand Hygiene & PPE"),
    ("bedmaking", "Bed Making (Occupied/Unoccupied)"),
    ("catheter", "Urinary Catheterization"),
    ("injection-im", "IM Injection"),
    ("injection-subq", "SubQ Injection"),
    ("iv-insertion", "Peripheral IV Insertion"),
    ("wound-care", "Sterile Dressing Change"),
    ("ng-tube", "NG Tube Insertion & Care"),
    ("trach-care", "Tracheostomy Care"),
    ("cpr", "CPR & Emergency Response"),
    ("med-calc", "Medication Dosage Calculation"),
    ("glucose", "Blood Glucose Monitoring"),
    ("ekg", "ECG/EKG Application"),
    ("ostomy", "Ostomy Care"),
];

fn quoted_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

fn opt_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn students_csv(students: &[Student]) -> Result<Vec<u8>, ExportError> {
    if students.is_empty() {
        return Err(ExportError::Empty("students"));
    }
    let mut writer = quoted_writer();
    writer.write_record([
        "ID",
        "First Name",
        "Last Name",
        "Email",
        "Phone",
        "DOB",
        "Status",
        "Cohort",
        "GPA",
        "NCLEX Predictor Score",
        "Win Probability",
        "Clinical Hours Completed",
        "Clinical Hours Required",
        "Skills Completed",
    ])?;
    for s in students {
        writer.write_record([
            s.id.to_string(),
            s.first_name.clone(),
            s.last_name.clone(),
            s.email.clone().unwrap_or_default(),
            s.phone.clone().unwrap_or_default(),
            s.dob.clone().unwrap_or_default(),
            s.status.to_string(),
            s.cohort.clone(),
            opt_number(s.gpa),
            opt_number(s.nclex_predictor_score),
            opt_number(s.win_probability),
            s.clinical_hours_completed.to_string(),
            s.clinical_hours_required.to_string(),
            s.skills_completed.len().to_string(),
        ])?;
    }
    finish(writer)
}

pub fn clinical_logs_csv(
    logs: &[ClinicalLog],
    students: &[Student],
) -> Result<Vec<u8>, ExportError> {
    if logs.is_empty() {
        return Err(ExportError::Empty("clinical logs"));
    }
    let names: HashMap<&StudentId, String> =
        students.iter().map(|s| (&s.id, s.full_name())).collect();

    let mut writer = quoted_writer();
    writer.write_record([
        "Log ID",
        "Student ID",
        "Student Name",
        "Date",
        "Site Name",
        "Patient Diagnosis",
        "Status",
        "Instructor Feedback",
        "Mapped Competencies",
    ])?;
    for log in logs {
        writer.write_record([
            log.id.to_string(),
            log.student_id.to_string(),
            names.get(&log.student_id).cloned().unwrap_or_default(),
            log.date.clone(),
            log.site_name.clone(),
            log.patient_diagnosis.clone(),
            log.status.as_str().to_string(),
            log.instructor_feedback.clone().unwrap_or_default(),
            log.mapped_competencies.join("; "),
        ])?;
    }
    finish(writer)
}

pub fn skills_matrix_csv(students: &[Student]) -> Result<Vec<u8>, ExportError> {
    if students.is_empty() {
        return Err(ExportError::Empty("students"));
    }
    let mut writer = quoted_writer();
    let mut header = vec!["Student ID", "Student Name", "Cohort"];
    header.extend(CORE_SKILLS.iter().map(|(_, name)| *name));
    header.push("Total Completed");
    writer.write_record(&header)?;

    for s in students {
        let mut row = vec![s.id.to_string(), s.full_name(), s.cohort.clone()];
        row.extend(CORE_SKILLS.iter().map(|(id, _)| {
            if s.skills_completed.iter().any(|done| done == id) {
                "Completed".to_string()
            } else {
                "Not Started".to_string()
            }
        }));
        row.push(s.skills_completed.len().to_string());
        writer.write_record(&row)?;
    }
    finish(writer)
}

pub fn records_json<T: Serialize>(records: &[T]) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(records)?)
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
