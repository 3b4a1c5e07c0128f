use super::*;

#[test]
fn defaults_match_the_coordinator_constants() {
    let settings = Settings::default();
    assert_eq!(settings.autosave_debounce, Duration::from_millis(2000));
    assert_eq!(settings.history_limit, 50);
    assert!(settings.data_dir.ends_with("nursed"));
    assert!(settings.database_url.starts_with("sqlite://"));
    assert!(settings.database_url.ends_with("nursed.db"));
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(
        &path,
        "autosave_debounce_ms = 500\nhistory_limit = 10\ndata_dir = \"/tmp/nursed-test\"\n",
    )
    .expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(settings.autosave_debounce, Duration::from_millis(500));
    assert_eq!(settings.history_limit, 10);
    assert_eq!(settings.data_dir, PathBuf::from("/tmp/nursed-test"));
}

#[test]
fn malformed_file_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(&path, "history_limit = \"many\"").expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(settings.history_limit, DEFAULT_HISTORY_LIMIT);
}

#[test]
fn normalizes_database_urls() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("sqlite://data/app.db"),
        "sqlite://data/app.db"
    );
    assert_eq!(normalize_database_url("sqlite:data/app.db"), "sqlite://data/app.db");
    assert_eq!(
        normalize_database_url("data\\nursed.db"),
        "sqlite://data/nursed.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn prepare_creates_the_parent_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("nursed.db");
    let url = prepare_database_url(&db_path.to_string_lossy()).expect("prepare");

    assert!(url.starts_with("sqlite://"));
    assert!(dir.path().join("nested").is_dir());
}
