//! Reversible record operations tracked by the action history.
//!
//! An action stores the record snapshots it needs instead of a callback, so
//! it stays inspectable and serializable after the surrounding view state has
//! moved on.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{ClinicalLog, Grade, Student, StudentId};
use storage::RecordStore;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DeleteStudent,
    UpdateStudent,
    BulkUpdate,
    DeleteLog,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::DeleteStudent => "delete-record",
            ActionKind::UpdateStudent => "update-record",
            ActionKind::BulkUpdate => "bulk-update",
            ActionKind::DeleteLog => "delete-log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ActionEffect {
    StudentDeleted {
        student: Student,
        clinical_logs: Vec<ClinicalLog>,
        grades: Vec<Grade>,
        /// Skill toggles that were still waiting for auto-save when the
        /// student was deleted. Written back on undo.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_skills: Option<Vec<String>>,
    },
    StudentUpdated {
        before: Student,
        after: Student,
    },
    StudentsUpdated {
        before: Vec<Student>,
        after: Vec<Student>,
    },
    ClinicalLogDeleted {
        log: ClinicalLog,
    },
}

impl ActionEffect {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionEffect::StudentDeleted { .. } => ActionKind::DeleteStudent,
            ActionEffect::StudentUpdated { .. } => ActionKind::UpdateStudent,
            ActionEffect::StudentsUpdated { .. } => ActionKind::BulkUpdate,
            ActionEffect::ClinicalLogDeleted { .. } => ActionKind::DeleteLog,
        }
    }

    /// Students whose stored row this effect rewrites on undo or redo.
    /// Clinical log deletes leave the student row alone.
    pub fn student_ids(&self) -> Vec<&StudentId> {
        match self {
            ActionEffect::StudentDeleted { student, .. } => vec![&student.id],
            ActionEffect::StudentUpdated { after, .. } => vec![&after.id],
            ActionEffect::StudentsUpdated { after, .. } => after.iter().map(|s| &s.id).collect(),
            ActionEffect::ClinicalLogDeleted { .. } => Vec::new(),
        }
    }

    /// Puts the store back to the captured prior state.
    ///
    /// Safe to run again after a partial failure: rows that were already
    /// restored are overwritten instead of re-inserted.
    pub async fn revert(&self, store: &dyn RecordStore) -> Result<()> {
        match self {
            ActionEffect::StudentDeleted {
                student,
                clinical_logs,
                grades,
                pending_skills,
            } => {
                restore_student(store, student).await?;
                if let Some(skills) = pending_skills {
                    store.update_student_skills(&student.id, skills).await?;
                }
                for log in clinical_logs {
                    restore_clinical_log(store, log).await?;
                }
                let existing = store.list_grades(&student.id).await?;
                for grade in grades {
                    if existing.iter().any(|g| g.id == grade.id) {
                        continue;
                    }
                    store.create_grade(grade).await?;
                }
                Ok(())
            }
            ActionEffect::StudentUpdated { before, .. } => store.update_student(before).await,
            ActionEffect::StudentsUpdated { before, .. } => {
                for student in before {
                    store.update_student(student).await?;
                }
                Ok(())
            }
            ActionEffect::ClinicalLogDeleted { log } => restore_clinical_log(store, log).await,
        }
    }

    /// Applies the captured new state again.
    ///
    /// Updates fail with not-found when the record disappeared in the
    /// meantime; deletes of already-absent records succeed.
    pub async fn reapply(&self, store: &dyn RecordStore) -> Result<()> {
        match self {
            ActionEffect::StudentDeleted { student, .. } => {
                if !store.delete_student(&student.id).await? {
                    debug!(student_id = %student.id, "redo delete: student already absent");
                }
                Ok(())
            }
            ActionEffect::StudentUpdated { after, .. } => store.update_student(after).await,
            ActionEffect::StudentsUpdated { after, .. } => {
                for student in after {
                    store.update_student(student).await?;
                }
                Ok(())
            }
            ActionEffect::ClinicalLogDeleted { log } => {
                if !store.delete_clinical_log(&log.id).await? {
                    debug!(log_id = %log.id, "redo delete: clinical log already absent");
                }
                Ok(())
            }
        }
    }
}

/// Writes `student` over an existing row with the same id, or inserts it.
pub(crate) async fn restore_student(store: &dyn RecordStore, student: &Student) -> Result<()> {
    if store.get_student(&student.id).await?.is_some() {
        store.update_student(student).await
    } else {
        store.create_student(student).await
    }
}

pub(crate) async fn restore_clinical_log(store: &dyn RecordStore, log: &ClinicalLog) -> Result<()> {
    if store.get_clinical_log(&log.id).await?.is_some() {
        store.update_clinical_log(log).await
    } else {
        store.create_clinical_log(log).await
    }
}

/// A recorded user operation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoableAction {
    id: Uuid,
    kind: ActionKind,
    description: String,
    created_at: DateTime<Utc>,
    effect: ActionEffect,
    redoable: bool,
}

impl UndoableAction {
    pub fn new(description: impl Into<String>, effect: ActionEffect) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: effect.kind(),
            description: description.into(),
            created_at: Utc::now(),
            effect,
            redoable: true,
        }
    }

    /// Marks the action as undo-only; it is dropped after a successful undo.
    pub fn without_redo(mut self) -> Self {
        self.redoable = false;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn effect(&self) -> &ActionEffect {
        &self.effect
    }

    pub fn is_redoable(&self) -> bool {
        self.redoable
    }
}
