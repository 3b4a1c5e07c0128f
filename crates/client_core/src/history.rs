//! Bounded linear undo/redo history.

use std::{collections::VecDeque, sync::Arc};

use storage::RecordStore;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::action::UndoableAction;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("undo of '{description}' failed: {source}")]
    UndoFailed {
        description: String,
        source: anyhow::Error,
    },
    #[error("redo of '{description}' failed: {source}")]
    RedoFailed {
        description: String,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    Recorded,
    Undone,
    Redone,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistorySnapshot {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub last_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub change: HistoryChange,
    pub snapshot: HistorySnapshot,
}

#[derive(Default)]
struct HistoryStacks {
    undo: VecDeque<UndoableAction>,
    redo: Vec<UndoableAction>,
}

impl HistoryStacks {
    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            can_undo: !self.undo.is_empty(),
            can_redo: !self.redo.is_empty(),
            undo_depth: self.undo.len(),
            redo_depth: self.redo.len(),
            last_description: self.undo.back().map(|a| a.description().to_string()),
        }
    }

    /// Pushes onto the undo stack, evicting the oldest entries past `limit`.
    fn push_bounded(&mut self, action: UndoableAction, limit: usize) {
        self.undo.push_back(action);
        while self.undo.len() > limit {
            if let Some(evicted) = self.undo.pop_front() {
                debug!(action_id = %evicted.id(), "evicted oldest history entry");
            }
        }
    }
}

/// Undo/redo manager for one application session.
///
/// The stack lock is held across the store call of an undo or redo, so a
/// pop and its compensating push are never interleaved with another
/// operation.
pub struct ActionHistory {
    store: Arc<dyn RecordStore>,
    limit: usize,
    stacks: Mutex<HistoryStacks>,
    events: broadcast::Sender<HistoryEvent>,
}

impl ActionHistory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_limit(store, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn RecordStore>, limit: usize) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            limit: limit.max(1),
            stacks: Mutex::new(HistoryStacks::default()),
            events,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn record(&self, action: UndoableAction) {
        let mut stacks = self.stacks.lock().await;
        debug!(
            action_id = %action.id(),
            kind = action.kind().label(),
            description = action.description(),
            "recording action"
        );
        stacks.push_bounded(action, self.limit);
        stacks.redo.clear();
        self.notify(HistoryChange::Recorded, &stacks);
    }

    /// Reverts the most recent action. `Ok(false)` when there is nothing to
    /// undo. On failure the action goes back on top of the undo stack.
    pub async fn undo(&self) -> Result<bool, HistoryError> {
        self.undo_action().await.map(|applied| applied.is_some())
    }

    /// Like [`undo`](Self::undo), but hands back a copy of the reverted
    /// action so callers can refresh state derived from the records it
    /// touched.
    pub async fn undo_action(&self) -> Result<Option<UndoableAction>, HistoryError> {
        let mut stacks = self.stacks.lock().await;
        let Some(action) = stacks.undo.pop_back() else {
            return Ok(None);
        };

        match action.effect().revert(self.store.as_ref()).await {
            Ok(()) => {
                info!(description = action.description(), "undo applied");
                let applied = action.clone();
                if action.is_redoable() {
                    stacks.redo.push(action);
                }
                self.notify(HistoryChange::Undone, &stacks);
                Ok(Some(applied))
            }
            Err(source) => {
                error!(description = action.description(), "undo failed: {source:#}");
                let description = action.description().to_string();
                stacks.undo.push_back(action);
                Err(HistoryError::UndoFailed {
                    description,
                    source,
                })
            }
        }
    }

    /// Reapplies the most recently undone action. `Ok(false)` when the redo
    /// stack is empty or its top entry is not redoable.
    pub async fn redo(&self) -> Result<bool, HistoryError> {
        self.redo_action().await.map(|applied| applied.is_some())
    }

    /// Like [`redo`](Self::redo), returning a copy of the reapplied action.
    pub async fn redo_action(&self) -> Result<Option<UndoableAction>, HistoryError> {
        let mut stacks = self.stacks.lock().await;
        match stacks.redo.last() {
            Some(action) if action.is_redoable() => {}
            _ => return Ok(None),
        }
        let Some(action) = stacks.redo.pop() else {
            return Ok(None);
        };

        match action.effect().reapply(self.store.as_ref()).await {
            Ok(()) => {
                info!(description = action.description(), "redo applied");
                let applied = action.clone();
                stacks.push_bounded(action, self.limit);
                self.notify(HistoryChange::Redone, &stacks);
                Ok(Some(applied))
            }
            Err(source) => {
                error!(description = action.description(), "redo failed: {source:#}");
                let description = action.description().to_string();
                stacks.redo.push(action);
                Err(HistoryError::RedoFailed {
                    description,
                    source,
                })
            }
        }
    }

    pub async fn can_undo(&self) -> bool {
        !self.stacks.lock().await.undo.is_empty()
    }

    pub async fn can_redo(&self) -> bool {
        !self.stacks.lock().await.redo.is_empty()
    }

    /// Most recent undo entry, for labels like "Undo: Delete Jane Doe".
    pub async fn peek_last(&self) -> Option<UndoableAction> {
        self.stacks.lock().await.undo.back().cloned()
    }

    /// Copy of the undo stack, oldest first.
    pub async fn undo_stack(&self) -> Vec<UndoableAction> {
        self.stacks.lock().await.undo.iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> HistorySnapshot {
        self.stacks.lock().await.snapshot()
    }

    pub async fn clear(&self) {
        let mut stacks = self.stacks.lock().await;
        stacks.undo.clear();
        stacks.redo.clear();
        self.notify(HistoryChange::Cleared, &stacks);
    }

    /// Observers receive one event per successful mutation, sent after the
    /// stacks changed. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    fn notify(&self, change: HistoryChange, stacks: &HistoryStacks) {
        // No receivers is fine.
        let _ = self.events.send(HistoryEvent {
            change,
            snapshot: stacks.snapshot(),
        });
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
