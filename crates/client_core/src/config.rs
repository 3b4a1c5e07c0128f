use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::{autosave::DEFAULT_DEBOUNCE, history::DEFAULT_HISTORY_LIMIT};

pub const SETTINGS_FILE: &str = "nursed.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    /// Directory for the local profile and recently-viewed cache.
    pub data_dir: PathBuf,
    pub autosave_debounce: Duration,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database_url: format!(
                "sqlite://{}",
                data_dir.join("nursed.db").to_string_lossy().replace('\\', "/")
            ),
            data_dir,
            autosave_debounce: DEFAULT_DEBOUNCE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nursed")
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    data_dir: Option<PathBuf>,
    autosave_debounce_ms: Option<u64>,
    history_limit: Option<usize>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

/// Defaults, then the TOML file at `path` if readable, then environment
/// variables. Unparsable values are logged and skipped.
pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.data_dir {
                    settings.data_dir = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.autosave_debounce_ms {
                    settings.autosave_debounce = Duration::from_millis(v);
                }
                if let Some(v) = file_cfg.history_limit {
                    settings.history_limit = v;
                }
            }
            Err(err) => warn!(path = %path.display(), "ignoring malformed settings file: {err}"),
        }
    }

    if let Ok(v) = std::env::var("NURSED_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }

    if let Ok(v) = std::env::var("NURSED_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("NURSED_AUTOSAVE_DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(ms) => settings.autosave_debounce = Duration::from_millis(ms),
            Err(_) => warn!(value = %v, "ignoring invalid NURSED_AUTOSAVE_DEBOUNCE_MS"),
        }
    }

    if let Ok(v) = std::env::var("NURSED_HISTORY_LIMIT") {
        match v.parse::<usize>() {
            Ok(limit) if limit > 0 => settings.history_limit = limit,
            _ => warn!(value = %v, "ignoring invalid NURSED_HISTORY_LIMIT"),
        }
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    if database_url.starts_with("sqlite::memory:") {
        return Ok(());
    }
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
