//! Single-instructor profile persisted in the local cache.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::local_state::LocalStore;

pub const PROFILE_KEY: &str = "nursed_instructor_profile";
pub const DEFAULT_COHORT: &str = "Fall 2025";
const DEFAULT_INSTITUTION: &str = "Page County Tech Center";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub default_cohort: String,
    pub theme: Theme,
    pub enable_notifications: bool,
    /// Minutes.
    pub auto_save_interval: u32,
    #[serde(rename = "showVBONCompliance")]
    pub show_vbon_compliance: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_cohort: DEFAULT_COHORT.to_string(),
            theme: Theme::Light,
            enable_notifications: true,
            auto_save_interval: 5,
            show_vbon_compliance: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// e.g. "RN, MSN"
    pub credentials: String,
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Default for InstructorProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: format!("INST-{}", now.timestamp_millis()),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            credentials: "RN".to_string(),
            institution: DEFAULT_INSTITUTION.to_string(),
            phone_number: None,
            created_at: now,
            last_login: now,
            preferences: Preferences::default(),
        }
    }
}

impl InstructorProfile {
    pub fn is_set_up(&self) -> bool {
        !self.first_name.is_empty() && !self.last_name.is_empty() && !self.email.is_empty()
    }

    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() && self.last_name.is_empty() {
            return "Instructor".to_string();
        }
        let full_name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if self.credentials.is_empty() {
            full_name
        } else {
            format!("{full_name}, {}", self.credentials)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    local: LocalStore,
}

impl ProfileStore {
    pub fn new(local: LocalStore) -> Self {
        Self { local }
    }

    /// Stored profile with a refreshed `last_login`, or a fresh default.
    pub fn load(&self) -> InstructorProfile {
        let Some(mut profile) = self.local.read_json::<InstructorProfile>(PROFILE_KEY) else {
            return InstructorProfile::default();
        };
        profile.last_login = Utc::now();
        if let Err(err) = self.local.write_json(PROFILE_KEY, &profile) {
            warn!("failed to refresh profile last login: {err:#}");
        }
        profile
    }

    pub fn save(&self, profile: &InstructorProfile) -> Result<()> {
        self.local.write_json(PROFILE_KEY, profile)
    }

    pub fn update(&self, apply: impl FnOnce(&mut InstructorProfile)) -> Result<InstructorProfile> {
        let mut profile = self.load();
        apply(&mut profile);
        self.save(&profile)?;
        Ok(profile)
    }

    pub fn update_preferences(
        &self,
        apply: impl FnOnce(&mut Preferences),
    ) -> Result<InstructorProfile> {
        self.update(|profile| apply(&mut profile.preferences))
    }

    pub fn is_set_up(&self) -> bool {
        self.load().is_set_up()
    }

    pub fn display_name(&self) -> String {
        self.load().display_name()
    }

    pub fn clear(&self) -> Result<()> {
        self.local.remove(PROFILE_KEY)
    }
}

#[cfg(test)]
#[path = "tests/local_state_tests.rs"]
mod tests;
