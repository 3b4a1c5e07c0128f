use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::domain::{Student, StudentId};

use crate::local_state::LocalStore;

pub const RECENTLY_VIEWED_KEY: &str = "nursed_recently_viewed";
pub const MAX_RECENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentStudent {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Most-recent-first list of opened student records, capped at five.
#[derive(Debug, Clone)]
pub struct RecentlyViewed {
    local: LocalStore,
}

impl RecentlyViewed {
    pub fn new(local: LocalStore) -> Self {
        Self { local }
    }

    pub fn add(&self, student: &Student) -> Result<Vec<RecentStudent>> {
        let mut entries: Vec<RecentStudent> = self
            .list()
            .into_iter()
            .filter(|entry| entry.id != student.id)
            .collect();
        entries.insert(
            0,
            RecentStudent {
                id: student.id.clone(),
                first_name: student.first_name.clone(),
                last_name: student.last_name.clone(),
                timestamp: Utc::now().timestamp_millis(),
            },
        );
        entries.truncate(MAX_RECENT);
        self.local.write_json(RECENTLY_VIEWED_KEY, &entries)?;
        Ok(entries)
    }

    pub fn list(&self) -> Vec<RecentStudent> {
        let mut entries: Vec<RecentStudent> = self
            .local
            .read_json(RECENTLY_VIEWED_KEY)
            .unwrap_or_default();
        entries.truncate(MAX_RECENT);
        entries
    }

    pub fn clear(&self) -> Result<()> {
        self.local.remove(RECENTLY_VIEWED_KEY)
    }
}
