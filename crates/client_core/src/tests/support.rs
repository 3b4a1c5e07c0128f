use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex as StdMutex},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use shared::{
    domain::{ClinicalLog, ClinicalLogId, Grade, GradeId, LogStatus, Student, StudentId},
    error::StoreError,
};
use storage::RecordStore;
use tokio::sync::Mutex;

use crate::autosave::EntityWriter;

pub(crate) fn student(id: &str, first: &str, last: &str) -> Student {
    Student::new(StudentId::new(id), first, last, "Fall 2025")
}

pub(crate) fn clinical_log(id: &str, student_id: &str) -> ClinicalLog {
    ClinicalLog {
        id: ClinicalLogId::new(id),
        student_id: StudentId::new(student_id),
        date: "2025-09-14".to_string(),
        site_name: "Page Memorial".to_string(),
        patient_diagnosis: "CHF exacerbation".to_string(),
        mapped_competencies: vec!["vitals".to_string()],
        status: LogStatus::Pending,
        instructor_feedback: None,
        hours: 8.0,
        is_simulation: false,
        is_makeup: false,
    }
}

pub(crate) fn grade(id: &str, student_id: &str) -> Grade {
    Grade {
        id: GradeId::new(id),
        student_id: StudentId::new(student_id),
        course_id: "PN101".to_string(),
        course_name: "Foundations of Nursing".to_string(),
        grade: 88.0,
        semester: "Fall 2025".to_string(),
    }
}

/// In-memory record store with failure injection and a call log.
#[derive(Default)]
pub(crate) struct FakeStore {
    students: StdMutex<BTreeMap<StudentId, Student>>,
    logs: StdMutex<BTreeMap<ClinicalLogId, ClinicalLog>>,
    grades: StdMutex<Vec<Grade>>,
    fail_with: StdMutex<Option<String>>,
    fail_on: StdMutex<Option<(String, String)>>,
    calls: StdMutex<Vec<String>>,
}

impl FakeStore {
    pub(crate) fn with_students(students: impl IntoIterator<Item = Student>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.students.lock().unwrap();
            for s in students {
                map.insert(s.id.clone(), s);
            }
        }
        Arc::new(store)
    }

    pub(crate) fn insert_log(&self, log: ClinicalLog) {
        self.logs.lock().unwrap().insert(log.id.clone(), log);
    }

    pub(crate) fn insert_grade(&self, grade: Grade) {
        self.grades.lock().unwrap().push(grade);
    }

    pub(crate) fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    /// Fails only calls to `op`; every other operation keeps working.
    pub(crate) fn fail_on(&self, op: &str, message: &str) {
        *self.fail_on.lock().unwrap() = Some((op.to_string(), message.to_string()));
    }

    pub(crate) fn recover(&self) {
        *self.fail_with.lock().unwrap() = None;
        *self.fail_on.lock().unwrap() = None;
    }

    pub(crate) fn student(&self, id: &str) -> Option<Student> {
        self.students.lock().unwrap().get(&StudentId::new(id)).cloned()
    }

    pub(crate) fn log_count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    pub(crate) fn grade_count(&self) -> usize {
        self.grades.lock().unwrap().len()
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    fn enter(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if let Some((failing, message)) = self.fail_on.lock().unwrap().as_ref() {
            if failing == op {
                return Err(anyhow!("{op}: {message}"));
            }
        }
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(anyhow!("{op}: {message}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn create_student(&self, student: &Student) -> Result<()> {
        self.enter("create_student")?;
        let mut students = self.students.lock().unwrap();
        if students.contains_key(&student.id) {
            bail!("student {} already exists", student.id);
        }
        students.insert(student.id.clone(), student.clone());
        Ok(())
    }

    async fn get_student(&self, id: &StudentId) -> Result<Option<Student>> {
        self.enter("get_student")?;
        Ok(self.students.lock().unwrap().get(id).cloned())
    }

    async fn update_student(&self, student: &Student) -> Result<()> {
        self.enter("update_student")?;
        let mut students = self.students.lock().unwrap();
        match students.get_mut(&student.id) {
            Some(existing) => {
                *existing = student.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(format!("student {}", student.id)).into()),
        }
    }

    async fn update_student_skills(&self, id: &StudentId, skills: &[String]) -> Result<()> {
        self.enter("update_student_skills")?;
        let mut students = self.students.lock().unwrap();
        match students.get_mut(id) {
            Some(existing) => {
                existing.skills_completed = skills.to_vec();
                Ok(())
            }
            None => Err(StoreError::not_found(format!("student {id}")).into()),
        }
    }

    async fn delete_student(&self, id: &StudentId) -> Result<bool> {
        self.enter("delete_student")?;
        let removed = self.students.lock().unwrap().remove(id).is_some();
        if removed {
            self.logs.lock().unwrap().retain(|_, log| &log.student_id != id);
            self.grades.lock().unwrap().retain(|g| &g.student_id != id);
        }
        Ok(removed)
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        self.enter("list_students")?;
        Ok(self.students.lock().unwrap().values().cloned().collect())
    }

    async fn create_clinical_log(&self, log: &ClinicalLog) -> Result<()> {
        self.enter("create_clinical_log")?;
        self.logs.lock().unwrap().insert(log.id.clone(), log.clone());
        Ok(())
    }

    async fn get_clinical_log(&self, id: &ClinicalLogId) -> Result<Option<ClinicalLog>> {
        self.enter("get_clinical_log")?;
        Ok(self.logs.lock().unwrap().get(id).cloned())
    }

    async fn update_clinical_log(&self, log: &ClinicalLog) -> Result<()> {
        self.enter("update_clinical_log")?;
        let mut logs = self.logs.lock().unwrap();
        match logs.get_mut(&log.id) {
            Some(existing) => {
                *existing = log.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(format!("clinical log {}", log.id)).into()),
        }
    }

    async fn delete_clinical_log(&self, id: &ClinicalLogId) -> Result<bool> {
        self.enter("delete_clinical_log")?;
        Ok(self.logs.lock().unwrap().remove(id).is_some())
    }

    async fn list_clinical_logs(&self, student_id: Option<&StudentId>) -> Result<Vec<ClinicalLog>> {
        self.enter("list_clinical_logs")?;
        Ok(self
            .logs
            .lock()
            .unwrap()
            .values()
            .filter(|log| student_id.map_or(true, |id| &log.student_id == id))
            .cloned()
            .collect())
    }

    async fn create_grade(&self, grade: &Grade) -> Result<()> {
        self.enter("create_grade")?;
        self.grades.lock().unwrap().push(grade.clone());
        Ok(())
    }

    async fn list_grades(&self, student_id: &StudentId) -> Result<Vec<Grade>> {
        self.enter("list_grades")?;
        Ok(self
            .grades
            .lock()
            .unwrap()
            .iter()
            .filter(|g| &g.student_id == student_id)
            .cloned()
            .collect())
    }
}

/// Auto-save writer that records every write and can hold writes in flight.
#[derive(Default)]
pub(crate) struct RecordingWriter {
    writes: StdMutex<Vec<(String, String)>>,
    failing_keys: StdMutex<HashSet<String>>,
    pub(crate) gate: Mutex<()>,
}

impl RecordingWriter {
    pub(crate) fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn heal_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl EntityWriter<String, String> for RecordingWriter {
    async fn write(&self, key: &String, value: &String) -> Result<()> {
        let _held = self.gate.lock().await;
        self.writes
            .lock()
            .unwrap()
            .push((key.clone(), value.clone()));
        if self.failing_keys.lock().unwrap().contains(key) {
            bail!("write rejected for {key}");
        }
        Ok(())
    }
}
