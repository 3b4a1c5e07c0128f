use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Undo,
    Other,
}

fn undo_dispatcher(global: bool) -> ShortcutDispatcher<Probe> {
    let mut dispatcher = ShortcutDispatcher::new();
    let shortcut = Shortcut::new("z", Modifiers::META, Probe::Undo, "Undo");
    dispatcher.register(if global { shortcut.global() } else { shortcut });
    dispatcher
}

#[test]
fn global_shortcut_fires_inside_a_text_field() {
    let dispatcher = undo_dispatcher(true);
    let event = KeyEvent::new("Z", Modifiers::META).in_target(FocusTarget::TextInput);
    assert_eq!(dispatcher.dispatch(&event).map(|s| s.action), Some(Probe::Undo));
}

#[test]
fn non_global_shortcut_is_suppressed_while_typing() {
    let dispatcher = undo_dispatcher(false);
    for target in [FocusTarget::TextInput, FocusTarget::TextArea, FocusTarget::Select] {
        let event = KeyEvent::new("Z", Modifiers::META).in_target(target);
        assert!(dispatcher.dispatch(&event).is_none(), "{target:?}");
    }
    let event = KeyEvent::new("z", Modifiers::META);
    assert_eq!(dispatcher.dispatch(&event).map(|s| s.action), Some(Probe::Undo));
}

#[test]
fn modifiers_must_match_exactly() {
    let dispatcher = undo_dispatcher(true);
    assert!(dispatcher
        .dispatch(&KeyEvent::new("z", Modifiers::META.with_shift()))
        .is_none());
    assert!(dispatcher.dispatch(&KeyEvent::new("z", Modifiers::CTRL)).is_none());
    assert!(dispatcher.dispatch(&KeyEvent::new("z", Modifiers::NONE)).is_none());
}

#[test]
fn first_registration_wins() {
    let mut dispatcher = ShortcutDispatcher::new();
    dispatcher.register(Shortcut::new("k", Modifiers::META, Probe::Other, "first"));
    dispatcher.register(Shortcut::new("K", Modifiers::META, Probe::Undo, "second"));
    let hit = dispatcher
        .dispatch(&KeyEvent::new("k", Modifiers::META))
        .expect("match");
    assert_eq!(hit.description, "first");
    assert_eq!(dispatcher.shortcuts().len(), 2);
}

#[test]
fn default_set_routes_undo_and_redo_for_both_platforms() {
    let dispatcher = default_shortcuts();
    let cases = [
        ("meta+z", AppCommand::Undo),
        ("ctrl+z", AppCommand::Undo),
        ("meta+shift+z", AppCommand::Redo),
        ("ctrl+shift+Z", AppCommand::Redo),
        ("meta+d", AppCommand::Navigate(Route::Dashboard)),
        ("meta+shift+s", AppCommand::Navigate(Route::Students)),
        ("meta+,", AppCommand::Navigate(Route::Settings)),
        ("meta+k", AppCommand::OpenSearch),
    ];
    for (chord, expected) in cases {
        let event = KeyEvent::parse_chord(chord)
            .expect("chord")
            .in_target(FocusTarget::TextArea);
        assert_eq!(
            dispatcher.dispatch(&event).map(|s| s.action),
            Some(expected),
            "{chord}"
        );
    }
}

#[test]
fn help_overlay_shortcut_is_not_global() {
    let dispatcher = default_shortcuts();
    let help = KeyEvent::parse_chord("shift+?").expect("chord");
    assert_eq!(
        dispatcher.dispatch(&help).map(|s| s.action),
        Some(AppCommand::ShowShortcuts)
    );
    assert!(dispatcher
        .dispatch(&help.in_target(FocusTarget::TextInput))
        .is_none());
}

#[test]
fn chord_parsing_rejects_empty_parts() {
    assert!(KeyEvent::parse_chord("meta+").is_none());
    assert!(KeyEvent::parse_chord("meta+shift").is_none());
    let event = KeyEvent::parse_chord("cmd+Shift+A").expect("chord");
    assert_eq!(event.key, "A");
    assert_eq!(event.modifiers, Modifiers::META.with_shift());
    assert_eq!(event.target, FocusTarget::Other);
}

#[test]
fn reference_rows_cover_undo_and_redo() {
    let rows = shortcut_reference();
    assert!(rows.iter().any(|(_, label)| *label == "Undo"));
    assert!(rows.iter().any(|(_, label)| *label == "Redo"));
}
