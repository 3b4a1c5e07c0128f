//! Top-level wiring for one instructor's application session.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use shared::{
    domain::{ClinicalLogId, Student, StudentId, StudentStatus},
    error::StoreError,
};
use storage::{RecordStore, Storage};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    action::{ActionEffect, UndoableAction},
    autosave::{AutoSaveCoordinator, FlushReport, SkillsLedgerWriter},
    backup::{import_backup, DatabaseBackup, RestoreReport},
    config::{prepare_database_url, Settings},
    history::{ActionHistory, HistoryError},
    local_state::LocalStore,
    profile::ProfileStore,
    recently_viewed::RecentlyViewed,
    shortcuts::{default_shortcuts, AppCommand, KeyEvent, ShortcutDispatcher},
};

pub const UNDO_FAILED_MESSAGE: &str = "Could not undo the last action. Please try again.";
pub const REDO_FAILED_MESSAGE: &str = "Could not redo the last action. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// No shortcut matched; the platform default should run.
    Ignored,
    Handled(AppCommand),
    Failed {
        command: AppCommand,
        message: &'static str,
    },
}

pub struct InstructorSession {
    store: Arc<dyn RecordStore>,
    history: Arc<ActionHistory>,
    skills: AutoSaveCoordinator<StudentId, Vec<String>>,
    ledger: Mutex<HashMap<StudentId, BTreeSet<String>>>,
    shortcuts: ShortcutDispatcher<AppCommand>,
    profile: ProfileStore,
    recent: RecentlyViewed,
}

impl InstructorSession {
    pub fn new(
        store: Arc<dyn RecordStore>,
        local: LocalStore,
        history_limit: usize,
        autosave_debounce: Duration,
    ) -> Self {
        let writer = Arc::new(SkillsLedgerWriter::new(Arc::clone(&store)));
        Self {
            history: Arc::new(ActionHistory::with_limit(Arc::clone(&store), history_limit)),
            skills: AutoSaveCoordinator::new(writer, autosave_debounce),
            ledger: Mutex::new(HashMap::new()),
            shortcuts: default_shortcuts(),
            profile: ProfileStore::new(local.clone()),
            recent: RecentlyViewed::new(local),
            store,
        }
    }

    /// Connects to the configured database and builds a session on it.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let database_url = prepare_database_url(&settings.database_url)?;
        let storage = Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open record store at '{database_url}'"))?;
        info!(database_url = %database_url, data_dir = %settings.data_dir.display(), "session opened");
        Ok(Self::new(
            Arc::new(storage),
            LocalStore::new(&settings.data_dir),
            settings.history_limit,
            settings.autosave_debounce,
        ))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn history(&self) -> &Arc<ActionHistory> {
        &self.history
    }

    pub fn skills(&self) -> &AutoSaveCoordinator<StudentId, Vec<String>> {
        &self.skills
    }

    pub fn shortcuts(&self) -> &ShortcutDispatcher<AppCommand> {
        &self.shortcuts
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn recently_viewed(&self) -> &RecentlyViewed {
        &self.recent
    }

    /// Deletes a student with their clinical logs and grades. The removed
    /// rows, and any skill toggles still waiting for auto-save, are captured
    /// so the delete can be undone and redone.
    pub async fn delete_student(&self, id: &StudentId) -> Result<bool> {
        let Some(student) = self.store.get_student(id).await? else {
            return Ok(false);
        };
        let clinical_logs = self.store.list_clinical_logs(Some(id)).await?;
        let grades = self.store.list_grades(id).await?;

        let pending_skills = self.skills.discard(id).await;
        let deleted = match self.store.delete_student(id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                self.requeue_skills(id, pending_skills).await;
                return Err(err);
            }
        };
        if !deleted {
            self.requeue_skills(id, pending_skills).await;
            return Ok(false);
        }
        self.ledger.lock().await.remove(id);

        let description = format!("Delete {}", student.full_name());
        info!(
            student_id = %id,
            logs = clinical_logs.len(),
            grades = grades.len(),
            "student deleted"
        );
        self.history
            .record(UndoableAction::new(
                description,
                ActionEffect::StudentDeleted {
                    student,
                    clinical_logs,
                    grades,
                    pending_skills,
                },
            ))
            .await;
        Ok(true)
    }

    async fn requeue_skills(&self, id: &StudentId, pending: Option<Vec<String>>) {
        if let Some(skills) = pending {
            self.skills.mark_dirty(id.clone(), skills).await;
        }
    }

    pub async fn update_student(&self, updated: Student) -> Result<()> {
        let before = self
            .store
            .get_student(&updated.id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("student {}", updated.id)))?;
        self.store.update_student(&updated).await?;

        // The update carries its own skills; an older queued toggle must not
        // overwrite them.
        if self.skills.discard(&updated.id).await.is_some() {
            debug!(student_id = %updated.id, "update superseded pending skill toggles");
        }
        self.ledger.lock().await.insert(
            updated.id.clone(),
            updated.skills_completed.iter().cloned().collect(),
        );
        let description = format!("Update {}", updated.full_name());
        self.history
            .record(UndoableAction::new(
                description,
                ActionEffect::StudentUpdated {
                    before,
                    after: updated,
                },
            ))
            .await;
        Ok(())
    }

    /// Sets `status` on every listed student that exists. Returns how many
    /// were changed. When a write fails part way, the students already
    /// changed are still recorded as one undoable action before the error
    /// is returned.
    pub async fn bulk_update_status(
        &self,
        ids: &[StudentId],
        status: StudentStatus,
    ) -> Result<usize> {
        let mut before = Vec::new();
        let mut after = Vec::new();
        let mut failure = None;

        for id in ids {
            let current = match self.store.get_student(id).await {
                Ok(Some(student)) => student,
                Ok(None) => {
                    warn!(student_id = %id, "bulk update skipped missing student");
                    continue;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };
            let mut changed = current.clone();
            changed.status = status;
            if let Err(err) = self.store.update_student(&changed).await {
                failure = Some(err);
                break;
            }
            before.push(current);
            after.push(changed);
        }

        let count = after.len();
        if count > 0 {
            let description = format!("Changed {count} student(s) status to {status}");
            self.history
                .record(UndoableAction::new(
                    description,
                    ActionEffect::StudentsUpdated { before, after },
                ))
                .await;
        }

        match failure {
            Some(err) => Err(err.context(format!("bulk status update stopped after {count} student(s)"))),
            None => Ok(count),
        }
    }

    pub async fn delete_clinical_log(&self, id: &ClinicalLogId) -> Result<bool> {
        let Some(log) = self.store.get_clinical_log(id).await? else {
            return Ok(false);
        };
        if !self.store.delete_clinical_log(id).await? {
            return Ok(false);
        }
        let description = format!("Delete clinical log from {} at {}", log.date, log.site_name);
        self.history
            .record(UndoableAction::new(
                description,
                ActionEffect::ClinicalLogDeleted { log },
            ))
            .await;
        Ok(true)
    }

    /// Merges a backup into the store. Restored students are reloaded from
    /// the store on their next skill toggle, and toggles queued for them are
    /// dropped. Restores are not undoable.
    pub async fn restore_backup(&self, backup: &DatabaseBackup) -> Result<RestoreReport> {
        let report = import_backup(self.store.as_ref(), backup).await?;
        let mut ledger = self.ledger.lock().await;
        for student in &backup.students {
            ledger.remove(&student.id);
            if self.skills.discard(&student.id).await.is_some() {
                debug!(student_id = %student.id, "restore superseded pending skill toggles");
            }
        }
        Ok(report)
    }

    /// Seeds the in-memory skills ledger from the store.
    pub async fn load_skills_ledger(&self) -> Result<usize> {
        let students = self.store.list_students().await?;
        let mut ledger = self.ledger.lock().await;
        ledger.clear();
        for student in &students {
            ledger.insert(
                student.id.clone(),
                student.skills_completed.iter().cloned().collect(),
            );
        }
        Ok(ledger.len())
    }

    /// Current in-memory skills for a student, including unsaved toggles.
    pub async fn skills_for(&self, id: &StudentId) -> Option<Vec<String>> {
        self.ledger
            .lock()
            .await
            .get(id)
            .map(|skills| skills.iter().cloned().collect())
    }

    /// Flips one competency for a student and schedules an auto-save.
    /// Returns whether the skill is now completed.
    pub async fn toggle_skill(&self, student_id: &StudentId, skill_id: &str) -> Result<bool> {
        let mut ledger = self.ledger.lock().await;
        if !ledger.contains_key(student_id) {
            let student = self
                .store
                .get_student(student_id)
                .await?
                .ok_or_else(|| StoreError::not_found(format!("student {student_id}")))?;
            ledger.insert(
                student_id.clone(),
                student.skills_completed.into_iter().collect(),
            );
        }
        let Some(skills) = ledger.get_mut(student_id) else {
            return Err(StoreError::not_found(format!("student {student_id}")).into());
        };

        let completed = if skills.remove(skill_id) {
            false
        } else {
            skills.insert(skill_id.to_string());
            true
        };
        let value: Vec<String> = skills.iter().cloned().collect();
        drop(ledger);

        self.skills.mark_dirty(student_id.clone(), value).await;
        Ok(completed)
    }

    pub async fn save_skills_now(&self) -> FlushReport<StudentId> {
        self.skills.save_now().await
    }

    /// Loads a student for display and pushes them onto the recently
    /// viewed list.
    pub async fn view_student(&self, id: &StudentId) -> Result<Option<Student>> {
        let student = self.store.get_student(id).await?;
        if let Some(student) = &student {
            if let Err(err) = self.recent.add(student) {
                warn!(student_id = %id, "failed to update recently viewed: {err:#}");
            }
        }
        Ok(student)
    }

    /// Reverts the most recent action. Skills for the students it touched
    /// are reloaded from the store on their next toggle.
    pub async fn undo(&self) -> Result<bool, HistoryError> {
        let applied = self.history.undo_action().await?;
        if let Some(action) = &applied {
            self.forget_skills(action.effect()).await;
        }
        Ok(applied.is_some())
    }

    pub async fn redo(&self) -> Result<bool, HistoryError> {
        let applied = self.history.redo_action().await?;
        if let Some(action) = &applied {
            self.forget_skills(action.effect()).await;
        }
        Ok(applied.is_some())
    }

    /// Drops ledger entries and queued toggles for students whose stored
    /// row was just rewritten, so the store snapshot wins.
    async fn forget_skills(&self, effect: &ActionEffect) {
        let ids = effect.student_ids();
        if ids.is_empty() {
            return;
        }
        let mut ledger = self.ledger.lock().await;
        for id in ids {
            ledger.remove(id);
            if self.skills.discard(id).await.is_some() {
                debug!(student_id = %id, "history change superseded pending skill toggles");
            }
        }
    }

    /// Routes a key chord. Undo and redo run against the history here;
    /// other commands are handed back for the caller to perform.
    pub async fn handle_key(&self, event: &KeyEvent) -> KeyOutcome {
        let Some(shortcut) = self.shortcuts.dispatch(event) else {
            return KeyOutcome::Ignored;
        };
        let command = shortcut.action;

        let (result, message) = match command {
            AppCommand::Undo => (self.undo().await, UNDO_FAILED_MESSAGE),
            AppCommand::Redo => (self.redo().await, REDO_FAILED_MESSAGE),
            _ => return KeyOutcome::Handled(command),
        };
        match result {
            Ok(_) => KeyOutcome::Handled(command),
            Err(err) => {
                warn!("{command:?} shortcut failed: {err}");
                KeyOutcome::Failed { command, message }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
