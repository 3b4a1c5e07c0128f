pub mod action;
pub mod autosave;
pub mod backup;
pub mod config;
pub mod export;
pub mod history;
pub mod import;
pub mod local_state;
pub mod predictor;
pub mod profile;
pub mod recently_viewed;
pub mod session;
pub mod shortcuts;

pub use action::{ActionEffect, ActionKind, UndoableAction};
pub use autosave::{AutoSaveCoordinator, EntityWriter, FlushReport, SaveStatus};
pub use config::{load_settings, Settings};
pub use history::{ActionHistory, HistoryChange, HistoryError, HistoryEvent, HistorySnapshot};
pub use session::{InstructorSession, KeyOutcome};
pub use shortcuts::{AppCommand, FocusTarget, KeyEvent, Modifiers, ShortcutDispatcher};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
