use super::*;
use crate::{
    recently_viewed::{RecentlyViewed, MAX_RECENT, RECENTLY_VIEWED_KEY},
    test_support::student,
};
use tempfile::TempDir;

fn local() -> (TempDir, LocalStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let local = LocalStore::new(dir.path().join("state"));
    (dir, local)
}

#[test]
fn missing_profile_loads_defaults_without_persisting() {
    let (_dir, local) = local();
    let profiles = ProfileStore::new(local.clone());

    let profile = profiles.load();
    assert!(profile.id.starts_with("INST-"));
    assert_eq!(profile.credentials, "RN");
    assert_eq!(profile.preferences.default_cohort, DEFAULT_COHORT);
    assert!(!profile.is_set_up());
    assert_eq!(profile.display_name(), "Instructor");
    assert!(!local.dir().join(format!("{PROFILE_KEY}.json")).exists());
}

#[test]
fn saved_profile_round_trips_and_refreshes_last_login() {
    let (_dir, local) = local();
    let profiles = ProfileStore::new(local);

    let saved = profiles
        .update(|p| {
            p.first_name = "Dana".to_string();
            p.last_name = "Shifflett".to_string();
            p.email = "dshifflett@pctc.edu".to_string();
            p.credentials = "RN, MSN".to_string();
        })
        .expect("update");
    assert!(saved.is_set_up());

    let loaded = profiles.load();
    assert_eq!(loaded.id, saved.id);
    assert!(loaded.last_login >= saved.last_login);
    assert_eq!(profiles.display_name(), "Dana Shifflett, RN, MSN");
    assert!(profiles.is_set_up());
}

#[test]
fn preferences_update_in_place() {
    let (_dir, local) = local();
    let profiles = ProfileStore::new(local);
    profiles
        .update_preferences(|prefs| {
            prefs.theme = Theme::Dark;
            prefs.auto_save_interval = 10;
        })
        .expect("update preferences");

    let prefs = profiles.load().preferences;
    assert_eq!(prefs.theme, Theme::Dark);
    assert_eq!(prefs.auto_save_interval, 10);
    assert!(prefs.show_vbon_compliance);
}

#[test]
fn corrupt_profile_falls_back_to_defaults() {
    let (_dir, local) = local();
    std::fs::create_dir_all(local.dir()).expect("mkdir");
    std::fs::write(local.dir().join(format!("{PROFILE_KEY}.json")), "{not json").expect("write");

    let profile = ProfileStore::new(local).load();
    assert_eq!(profile.display_name(), "Instructor");
}

#[test]
fn clearing_a_missing_profile_is_fine() {
    let (_dir, local) = local();
    let profiles = ProfileStore::new(local);
    profiles.clear().expect("clear missing");
    profiles.save(&InstructorProfile::default()).expect("save");
    profiles.clear().expect("clear saved");
    assert!(!profiles.is_set_up());
}

#[test]
fn profile_json_uses_the_stored_field_names() {
    let json = serde_json::to_value(InstructorProfile::default()).expect("serialize");
    assert!(json.get("firstName").is_some());
    assert!(json["preferences"].get("showVBONCompliance").is_some());
    assert_eq!(json["preferences"]["theme"], "light");
}

#[test]
fn recently_viewed_dedupes_and_caps_at_five() {
    let (_dir, local) = local();
    let recent = RecentlyViewed::new(local);

    for i in 0..7 {
        recent
            .add(&student(&format!("S00{i}"), "First", &format!("Last{i}")))
            .expect("add");
    }
    let entries = recent.add(&student("S003", "First", "Last3")).expect("re-add");

    assert_eq!(entries.len(), MAX_RECENT);
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["S003", "S006", "S005", "S004", "S002"]);
    assert_eq!(recent.list(), entries);
}

#[test]
fn corrupt_recently_viewed_reads_as_empty() {
    let (_dir, local) = local();
    local
        .write_json(RECENTLY_VIEWED_KEY, &serde_json::json!({"unexpected": true}))
        .expect("write");
    let recent = RecentlyViewed::new(local);
    assert!(recent.list().is_empty());

    recent.add(&student("S001", "Jane", "Doe")).expect("add");
    assert_eq!(recent.list().len(), 1);
    recent.clear().expect("clear");
    assert!(recent.list().is_empty());
}
