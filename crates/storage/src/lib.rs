use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{
        ClinicalLog, ClinicalLogId, Grade, GradeId, LogStatus, RemediationStatus, Student,
        StudentId, StudentStatus,
    },
    error::StoreError,
};

/// Persistent record store consumed by the history and auto-save layers.
///
/// Every call may fail; callers never assume success. Lookups return `None`
/// for absent rows, updates of absent rows fail with a not-found
/// [`StoreError`], deletes report whether a row was removed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_student(&self, student: &Student) -> Result<()>;
    async fn get_student(&self, id: &StudentId) -> Result<Option<Student>>;
    async fn update_student(&self, student: &Student) -> Result<()>;
    async fn update_student_skills(&self, id: &StudentId, skills: &[String]) -> Result<()>;
    /// Removes the student together with its clinical logs and grades.
    async fn delete_student(&self, id: &StudentId) -> Result<bool>;
    async fn list_students(&self) -> Result<Vec<Student>>;

    async fn create_clinical_log(&self, log: &ClinicalLog) -> Result<()>;
    async fn get_clinical_log(&self, id: &ClinicalLogId) -> Result<Option<ClinicalLog>>;
    async fn update_clinical_log(&self, log: &ClinicalLog) -> Result<()>;
    async fn delete_clinical_log(&self, id: &ClinicalLogId) -> Result<bool>;
    async fn list_clinical_logs(&self, student_id: Option<&StudentId>)
        -> Result<Vec<ClinicalLog>>;

    async fn create_grade(&self, grade: &Grade) -> Result<()>;
    async fn list_grades(&self, student_id: &StudentId) -> Result<Vec<Grade>>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open record store at '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(database_url, "record store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, cohort, status, clinical_hours_completed, \
     clinical_hours_required, skills_completed, nclex_predictor_score, win_probability, \
     remediation_status, remediation_topic, email, phone, dob, gpa, notes";

const CLINICAL_LOG_COLUMNS: &str = "id, student_id, date, site_name, patient_diagnosis, \
     mapped_competencies, status, instructor_feedback, hours, is_simulation, is_makeup";

fn encode_string_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("failed to encode string list")
}

fn decode_string_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("malformed string list column: {raw}"))
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let status: String = row.try_get("status")?;
    let remediation_status: Option<String> = row.try_get("remediation_status")?;
    let skills: String = row.try_get("skills_completed")?;
    Ok(Student {
        id: StudentId(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        cohort: row.try_get("cohort")?,
        status: StudentStatus::from_str(&status).map_err(anyhow::Error::msg)?,
        clinical_hours_completed: row.try_get("clinical_hours_completed")?,
        clinical_hours_required: row.try_get("clinical_hours_required")?,
        skills_completed: decode_string_list(&skills)?,
        nclex_predictor_score: row.try_get("nclex_predictor_score")?,
        win_probability: row.try_get("win_probability")?,
        remediation_status: remediation_status
            .as_deref()
            .map(RemediationStatus::from_str)
            .transpose()
            .map_err(anyhow::Error::msg)?,
        remediation_topic: row.try_get("remediation_topic")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        dob: row.try_get("dob")?,
        gpa: row.try_get("gpa")?,
        notes: row.try_get("notes")?,
    })
}

fn clinical_log_from_row(row: &SqliteRow) -> Result<ClinicalLog> {
    let status: String = row.try_get("status")?;
    let competencies: String = row.try_get("mapped_competencies")?;
    Ok(ClinicalLog {
        id: ClinicalLogId(row.try_get("id")?),
        student_id: StudentId(row.try_get("student_id")?),
        date: row.try_get("date")?,
        site_name: row.try_get("site_name")?,
        patient_diagnosis: row.try_get("patient_diagnosis")?,
        mapped_competencies: decode_string_list(&competencies)?,
        status: LogStatus::from_str(&status).map_err(anyhow::Error::msg)?,
        instructor_feedback: row.try_get("instructor_feedback")?,
        hours: row.try_get("hours")?,
        is_simulation: row.try_get("is_simulation")?,
        is_makeup: row.try_get("is_makeup")?,
    })
}

#[async_trait]
impl RecordStore for Storage {
    async fn create_student(&self, student: &Student) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO students ({STUDENT_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(student.id.as_str())
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.cohort)
        .bind(student.status.as_str())
        .bind(student.clinical_hours_completed)
        .bind(student.clinical_hours_required)
        .bind(encode_string_list(&student.skills_completed)?)
        .bind(student.nclex_predictor_score)
        .bind(student.win_probability)
        .bind(student.remediation_status.map(|s| s.as_str()))
        .bind(&student.remediation_topic)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.dob)
        .bind(student.gpa)
        .bind(&student.notes)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create student {}", student.id))?;
        Ok(())
    }

    async fn get_student(&self, id: &StudentId) -> Result<Option<Student>> {
        let row = sqlx::query(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        let result = sqlx::query(
            "UPDATE students SET
                first_name = ?, last_name = ?, cohort = ?, status = ?,
                clinical_hours_completed = ?, clinical_hours_required = ?, skills_completed = ?,
                nclex_predictor_score = ?, win_probability = ?, remediation_status = ?,
                remediation_topic = ?, email = ?, phone = ?, dob = ?, gpa = ?, notes = ?
             WHERE id = ?",
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.cohort)
        .bind(student.status.as_str())
        .bind(student.clinical_hours_completed)
        .bind(student.clinical_hours_required)
        .bind(encode_string_list(&student.skills_completed)?)
        .bind(student.nclex_predictor_score)
        .bind(student.win_probability)
        .bind(student.remediation_status.map(|s| s.as_str()))
        .bind(&student.remediation_topic)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.dob)
        .bind(student.gpa)
        .bind(&student.notes)
        .bind(student.id.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("student {}", student.id)).into());
        }
        Ok(())
    }

    async fn update_student_skills(&self, id: &StudentId, skills: &[String]) -> Result<()> {
        let result = sqlx::query("UPDATE students SET skills_completed = ? WHERE id = ?")
            .bind(encode_string_list(skills)?)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("student {id}")).into());
        }
        Ok(())
    }

    async fn delete_student(&self, id: &StudentId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM grades WHERE student_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM clinical_logs WHERE student_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit()
            .await
            .with_context(|| format!("failed to commit delete of student {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY last_name, first_name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn create_clinical_log(&self, log: &ClinicalLog) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO clinical_logs ({CLINICAL_LOG_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(log.id.as_str())
        .bind(log.student_id.as_str())
        .bind(&log.date)
        .bind(&log.site_name)
        .bind(&log.patient_diagnosis)
        .bind(encode_string_list(&log.mapped_competencies)?)
        .bind(log.status.as_str())
        .bind(&log.instructor_feedback)
        .bind(log.hours)
        .bind(log.is_simulation)
        .bind(log.is_makeup)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create clinical log {}", log.id))?;
        Ok(())
    }

    async fn get_clinical_log(&self, id: &ClinicalLogId) -> Result<Option<ClinicalLog>> {
        let row = sqlx::query(&format!(
            "SELECT {CLINICAL_LOG_COLUMNS} FROM clinical_logs WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(clinical_log_from_row).transpose()
    }

    async fn update_clinical_log(&self, log: &ClinicalLog) -> Result<()> {
        let result = sqlx::query(
            "UPDATE clinical_logs SET
                student_id = ?, date = ?, site_name = ?, patient_diagnosis = ?,
                mapped_competencies = ?, status = ?, instructor_feedback = ?,
                hours = ?, is_simulation = ?, is_makeup = ?
             WHERE id = ?",
        )
        .bind(log.student_id.as_str())
        .bind(&log.date)
        .bind(&log.site_name)
        .bind(&log.patient_diagnosis)
        .bind(encode_string_list(&log.mapped_competencies)?)
        .bind(log.status.as_str())
        .bind(&log.instructor_feedback)
        .bind(log.hours)
        .bind(log.is_simulation)
        .bind(log.is_makeup)
        .bind(log.id.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("clinical log {}", log.id)).into());
        }
        Ok(())
    }

    async fn delete_clinical_log(&self, id: &ClinicalLogId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clinical_logs WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_clinical_logs(
        &self,
        student_id: Option<&StudentId>,
    ) -> Result<Vec<ClinicalLog>> {
        let rows = match student_id {
            Some(student_id) => {
                sqlx::query(&format!(
                    "SELECT {CLINICAL_LOG_COLUMNS} FROM clinical_logs
                     WHERE student_id = ? ORDER BY date, id"
                ))
                .bind(student_id.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CLINICAL_LOG_COLUMNS} FROM clinical_logs ORDER BY date, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(clinical_log_from_row).collect()
    }

    async fn create_grade(&self, grade: &Grade) -> Result<()> {
        sqlx::query(
            "INSERT INTO grades (id, student_id, course_id, course_name, grade, semester)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(grade.id.as_str())
        .bind(grade.student_id.as_str())
        .bind(&grade.course_id)
        .bind(&grade.course_name)
        .bind(grade.grade)
        .bind(&grade.semester)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create grade {}", grade.id))?;
        Ok(())
    }

    async fn list_grades(&self, student_id: &StudentId) -> Result<Vec<Grade>> {
        let rows = sqlx::query(
            "SELECT id, student_id, course_id, course_name, grade, semester
             FROM grades WHERE student_id = ? ORDER BY semester, course_id",
        )
        .bind(student_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Grade {
                    id: GradeId(row.try_get("id")?),
                    student_id: StudentId(row.try_get("student_id")?),
                    course_id: row.try_get("course_id")?,
                    course_name: row.try_get("course_name")?,
                    grade: row.try_get("grade")?,
                    semester: row.try_get("semester")?,
                })
            })
            .collect()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
