//! Debounced auto-save: many rapid local edits become one write per entity.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use shared::domain::StudentId;
use storage::RecordStore;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Persists the latest value of one entity.
#[async_trait]
pub trait EntityWriter<K, V>: Send + Sync {
    async fn write(&self, key: &K, value: &V) -> Result<()>;
}

/// Writes skill-competency toggles for a student.
pub struct SkillsLedgerWriter {
    store: Arc<dyn RecordStore>,
}

impl SkillsLedgerWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntityWriter<StudentId, Vec<String>> for SkillsLedgerWriter {
    async fn write(&self, key: &StudentId, value: &Vec<String>) -> Result<()> {
        self.store.update_student_skills(key, value).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Unsaved,
    Saving,
    SavedAt(DateTime<Utc>),
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Idle => f.write_str("No changes"),
            SaveStatus::Unsaved => f.write_str("Unsaved changes"),
            SaveStatus::Saving => f.write_str("Saving..."),
            SaveStatus::SavedAt(at) => write!(
                f,
                "Saved at {}",
                at.with_timezone(&Local).format("%H:%M:%S")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure<K> {
    pub key: K,
    pub failed_attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport<K> {
    pub saved: Vec<K>,
    pub failed: Vec<FlushFailure<K>>,
}

impl<K> Default for FlushReport<K> {
    fn default() -> Self {
        Self {
            saved: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<K> FlushReport<K> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct PendingEntry<V> {
    value: V,
    revision: u64,
    failed_attempts: u32,
    last_error: Option<String>,
}

struct AutoSaveState<K, V> {
    pending: BTreeMap<K, PendingEntry<V>>,
    next_revision: u64,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    saving: bool,
    last_saved_at: Option<DateTime<Utc>>,
}

impl<K, V> AutoSaveState<K, V> {
    fn status(&self) -> SaveStatus {
        if self.saving {
            SaveStatus::Saving
        } else if !self.pending.is_empty() {
            SaveStatus::Unsaved
        } else if let Some(at) = self.last_saved_at {
            SaveStatus::SavedAt(at)
        } else {
            SaveStatus::Idle
        }
    }

    fn cancel_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct AutoSaveInner<K, V> {
    writer: Arc<dyn EntityWriter<K, V>>,
    debounce: Duration,
    state: Mutex<AutoSaveState<K, V>>,
    flush_gate: Mutex<()>,
    status_tx: watch::Sender<SaveStatus>,
}

/// Coalesces per-entity edits and commits them after a quiet period.
///
/// Entries are written one at a time in key order, and flushes never
/// overlap. An entry is cleared only if no newer edit arrived while its
/// write was in flight; failed entries stay pending with their attempt count
/// and last error until a later flush succeeds.
pub struct AutoSaveCoordinator<K, V> {
    inner: Arc<AutoSaveInner<K, V>>,
}

impl<K, V> Clone for AutoSaveCoordinator<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> AutoSaveCoordinator<K, V>
where
    K: Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(writer: Arc<dyn EntityWriter<K, V>>, debounce: Duration) -> Self {
        let (status_tx, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(AutoSaveInner {
                writer,
                debounce,
                state: Mutex::new(AutoSaveState {
                    pending: BTreeMap::new(),
                    next_revision: 0,
                    timer: None,
                    timer_generation: 0,
                    saving: false,
                    last_saved_at: None,
                }),
                flush_gate: Mutex::new(()),
                status_tx,
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Records the latest value for `key` and restarts the quiet-period
    /// timer. Must be called from within a tokio runtime.
    pub async fn mark_dirty(&self, key: K, value: V) {
        let mut state = self.inner.state.lock().await;
        state.next_revision += 1;
        let revision = state.next_revision;
        match state.pending.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.revision = revision;
            }
            None => {
                state.pending.insert(
                    key.clone(),
                    PendingEntry {
                        value,
                        revision,
                        failed_attempts: 0,
                        last_error: None,
                    },
                );
            }
        }
        debug!(?key, revision, "entity marked dirty");

        state.cancel_timer();
        let generation = state.timer_generation;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            {
                let mut state = inner.state.lock().await;
                if state.timer_generation != generation {
                    return;
                }
                // Detach so a later cancel cannot abort the writes below.
                state.timer = None;
            }
            let report = inner.flush().await;
            if !report.is_clean() {
                warn!(
                    failed = report.failed.len(),
                    saved = report.saved.len(),
                    "auto-save finished with failures"
                );
            }
        }));
        self.inner.publish(&state);
    }

    /// Flushes immediately, cancelling any scheduled auto-save.
    pub async fn save_now(&self) -> FlushReport<K> {
        {
            let mut state = self.inner.state.lock().await;
            state.cancel_timer();
        }
        self.inner.flush().await
    }

    /// Drops the pending edit for `key` without writing it, returning the
    /// value that would have been saved. Used when the entity itself goes
    /// away. A write already in flight for `key` still completes.
    pub async fn discard(&self, key: &K) -> Option<V> {
        let mut state = self.inner.state.lock().await;
        let entry = state.pending.remove(key)?;
        if state.pending.is_empty() {
            state.cancel_timer();
        }
        debug!(?key, revision = entry.revision, "pending edit discarded");
        self.inner.publish(&state);
        Some(entry.value)
    }

    /// Flushes whatever is pending without touching the timer.
    pub async fn flush(&self) -> FlushReport<K> {
        self.inner.flush().await
    }

    pub async fn has_unsaved_changes(&self) -> bool {
        !self.inner.state.lock().await.pending.is_empty()
    }

    pub async fn is_timer_armed(&self) -> bool {
        self.inner.state.lock().await.timer.is_some()
    }

    pub async fn status(&self) -> SaveStatus {
        self.inner.state.lock().await.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status_tx.subscribe()
    }

    pub async fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().await.last_saved_at
    }

    pub async fn pending_value(&self, key: &K) -> Option<V> {
        self.inner
            .state
            .lock()
            .await
            .pending
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Pending entries whose last write attempt failed.
    pub async fn pending_failures(&self) -> Vec<FlushFailure<K>> {
        self.inner
            .state
            .lock()
            .await
            .pending
            .iter()
            .filter(|(_, entry)| entry.failed_attempts > 0)
            .map(|(key, entry)| FlushFailure {
                key: key.clone(),
                failed_attempts: entry.failed_attempts,
                error: entry.last_error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

impl<K, V> AutoSaveInner<K, V>
where
    K: Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn publish(&self, state: &AutoSaveState<K, V>) {
        self.status_tx.send_replace(state.status());
    }

    async fn flush(&self) -> FlushReport<K> {
        let _gate = self.flush_gate.lock().await;

        let keys: Vec<K> = {
            let mut state = self.state.lock().await;
            if state.pending.is_empty() {
                return FlushReport::default();
            }
            state.saving = true;
            self.publish(&state);
            state.pending.keys().cloned().collect()
        };

        let mut report = FlushReport::default();
        for key in keys {
            let snapshot = {
                let state = self.state.lock().await;
                state
                    .pending
                    .get(&key)
                    .map(|entry| (entry.value.clone(), entry.revision))
            };
            let Some((value, revision)) = snapshot else {
                continue;
            };

            let result = self.writer.write(&key, &value).await;

            let mut state = self.state.lock().await;
            match result {
                Ok(()) => {
                    let unchanged = state
                        .pending
                        .get(&key)
                        .is_some_and(|entry| entry.revision == revision);
                    if unchanged {
                        state.pending.remove(&key);
                    } else {
                        debug!(?key, "newer edit arrived during write; keeping it pending");
                    }
                    report.saved.push(key);
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(?key, "auto-save write failed: {error}");
                    if let Some(entry) = state.pending.get_mut(&key) {
                        entry.failed_attempts += 1;
                        entry.last_error = Some(error.clone());
                        report.failed.push(FlushFailure {
                            key,
                            failed_attempts: entry.failed_attempts,
                            error,
                        });
                    }
                }
            }
        }

        let mut state = self.state.lock().await;
        state.saving = false;
        if state.pending.is_empty() && !report.saved.is_empty() {
            state.last_saved_at = Some(Utc::now());
        }
        info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            still_pending = state.pending.len(),
            "flush complete"
        );
        self.publish(&state);
        report
    }
}

#[cfg(test)]
#[path = "tests/autosave_tests.rs"]
mod tests;
