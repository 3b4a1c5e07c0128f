//! Student roster import from CSV.
//!
//! Rows that fail validation are skipped and reported alongside the rows
//! that parsed; the caller decides whether to proceed with partial data.

use std::{collections::HashMap, io::Read};

use anyhow::{Context, Result};
use shared::domain::{Student, StudentId, StudentStatus};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ImportError {
    /// 1-based line number in the source file.
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub students: Vec<Student>,
    pub errors: Vec<ImportError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Id,
    FirstName,
    LastName,
    Email,
    Phone,
    Dob,
    Cohort,
    Status,
    Gpa,
    Notes,
}

fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn column_for(header: &str) -> Option<Column> {
    match normalize_header(header).as_str() {
        "id" | "studentid" => Some(Column::Id),
        "firstname" | "first" => Some(Column::FirstName),
        "lastname" | "last" => Some(Column::LastName),
        "email" | "emailaddress" => Some(Column::Email),
        "phone" | "phonenumber" => Some(Column::Phone),
        "dob" | "dateofbirth" | "birthdate" => Some(Column::Dob),
        "cohort" => Some(Column::Cohort),
        "status" => Some(Column::Status),
        "gpa" => Some(Column::Gpa),
        "notes" => Some(Column::Notes),
        _ => None,
    }
}

pub fn parse_students_csv<R: Read>(reader: R, default_cohort: &str) -> Result<ImportOutcome> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("failed to read CSV header row")?
        .clone();
    let columns: HashMap<Column, usize> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| column_for(header).map(|column| (column, index)))
        .collect();

    let mut outcome = ImportOutcome::default();
    for (index, record) in csv_reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let line = err
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                outcome.errors.push(ImportError {
                    line,
                    message: format!("unreadable row: {err}"),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);
        if record.iter().all(str::is_empty) {
            continue;
        }

        let field = |column: Column| -> Option<String> {
            columns
                .get(&column)
                .and_then(|&i| record.get(i))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        match student_from_fields(&field, default_cohort) {
            Ok(student) => outcome.students.push(student),
            Err(message) => outcome.errors.push(ImportError { line, message }),
        }
    }

    debug!(
        imported = outcome.students.len(),
        rejected = outcome.errors.len(),
        "parsed student CSV"
    );
    Ok(outcome)
}

fn student_from_fields(
    field: &dyn Fn(Column) -> Option<String>,
    default_cohort: &str,
) -> std::result::Result<Student, String> {
    let first_name = field(Column::FirstName).ok_or("missing first name")?;
    let last_name = field(Column::LastName).ok_or("missing last name")?;

    let email = field(Column::Email);
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(format!("invalid email '{email}'"));
        }
    }

    let gpa = match field(Column::Gpa) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(gpa) if (0.0..=4.0).contains(&gpa) => Some(gpa),
            _ => return Err(format!("invalid GPA '{raw}'")),
        },
        None => None,
    };

    let id = field(Column::Id)
        .map(StudentId::new)
        .unwrap_or_else(StudentId::generate);
    let cohort = field(Column::Cohort).unwrap_or_else(|| default_cohort.to_string());

    let mut student = Student::new(id, first_name, last_name, cohort);
    student.status = field(Column::Status)
        .as_deref()
        .and_then(StudentStatus::parse_loose)
        .unwrap_or(StudentStatus::Active);
    student.email = email;
    student.phone = field(Column::Phone);
    student.dob = field(Column::Dob);
    student.gpa = gpa;
    student.notes = field(Column::Notes);
    Ok(student)
}

/// Template offered to instructors before their first import.
pub fn csv_template() -> &'static str {
    "firstName,lastName,email,phone,dob,cohort,status,gpa\n\
     Jane,Doe,jane.doe@example.edu,540-555-0100,2001-04-12,Fall 2025,Active,3.5\n"
}

#[cfg(test)]
#[path = "tests/import_tests.rs"]
mod tests;
