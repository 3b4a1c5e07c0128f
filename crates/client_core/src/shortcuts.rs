//! Key-chord routing with text-entry suppression.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        meta: false,
        ctrl: false,
        shift: false,
    };
    pub const META: Self = Self {
        meta: true,
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Self = Self {
        meta: false,
        ctrl: true,
        shift: false,
    };

    pub const fn with_shift(self) -> Self {
        Self {
            shift: true,
            ..self
        }
    }
}

/// Element holding keyboard focus when the event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    TextInput,
    TextArea,
    Select,
    #[default]
    Other,
}

impl FocusTarget {
    pub fn is_text_entry(&self) -> bool {
        matches!(
            self,
            FocusTarget::TextInput | FocusTarget::TextArea | FocusTarget::Select
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: Modifiers,
    pub target: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            target: FocusTarget::Other,
        }
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }

    /// Parses chords like `meta+shift+z`, `ctrl+,` or `?`.
    pub fn parse_chord(chord: &str) -> Option<Self> {
        let mut modifiers = Modifiers::NONE;
        let mut key = None;
        for part in chord.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "meta" | "cmd" | "super" => modifiers.meta = true,
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "" => return None,
                _ => key = Some(part.to_string()),
            }
        }
        key.map(|key| Self::new(key, modifiers))
    }
}

#[derive(Debug, Clone)]
pub struct Shortcut<A> {
    pub key: String,
    pub modifiers: Modifiers,
    pub action: A,
    pub description: String,
    /// Fires even while a text-entry element has focus.
    pub global: bool,
}

impl<A> Shortcut<A> {
    pub fn new(
        key: impl Into<String>,
        modifiers: Modifiers,
        action: A,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            modifiers,
            action,
            description: description.into(),
            global: false,
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Key compared case-insensitively; every modifier must match exactly.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.modifiers == event.modifiers && self.key.to_lowercase() == event.key.to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct ShortcutDispatcher<A> {
    shortcuts: Vec<Shortcut<A>>,
}

impl<A> Default for ShortcutDispatcher<A> {
    fn default() -> Self {
        Self {
            shortcuts: Vec::new(),
        }
    }
}

impl<A> ShortcutDispatcher<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, shortcut: Shortcut<A>) {
        self.shortcuts.push(shortcut);
    }

    pub fn shortcuts(&self) -> &[Shortcut<A>] {
        &self.shortcuts
    }

    /// First eligible registration matching the event, in registration
    /// order. A match means the platform default must be suppressed.
    pub fn dispatch(&self, event: &KeyEvent) -> Option<&Shortcut<A>> {
        let typing = event.target.is_text_entry();
        self.shortcuts
            .iter()
            .filter(|shortcut| !typing || shortcut.global)
            .find(|shortcut| shortcut.matches(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Dashboard,
    Students,
    Clinicals,
    Analytics,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Undo,
    Redo,
    Navigate(Route),
    OpenSearch,
    ShowShortcuts,
}

pub fn default_shortcuts() -> ShortcutDispatcher<AppCommand> {
    let mut dispatcher = ShortcutDispatcher::new();
    for primary in [Modifiers::META, Modifiers::CTRL] {
        dispatcher.register(Shortcut::new("z", primary, AppCommand::Undo, "Undo").global());
        dispatcher.register(
            Shortcut::new("z", primary.with_shift(), AppCommand::Redo, "Redo").global(),
        );
    }

    let navigation = [
        ("d", Modifiers::META, Route::Dashboard, "Go to Dashboard"),
        ("s", Modifiers::META.with_shift(), Route::Students, "Go to Students"),
        ("c", Modifiers::META.with_shift(), Route::Clinicals, "Go to Clinical Hours"),
        ("a", Modifiers::META.with_shift(), Route::Analytics, "Go to Analytics"),
        (",", Modifiers::META, Route::Settings, "Go to Settings"),
    ];
    for (key, modifiers, route, description) in navigation {
        dispatcher.register(
            Shortcut::new(key, modifiers, AppCommand::Navigate(route), description).global(),
        );
    }

    dispatcher.register(
        Shortcut::new("k", Modifiers::META, AppCommand::OpenSearch, "Global Search").global(),
    );
    dispatcher.register(Shortcut::new(
        "?",
        Modifiers::NONE.with_shift(),
        AppCommand::ShowShortcuts,
        "Show Shortcuts",
    ));
    dispatcher
}

/// Rows for the shortcut help overlay.
pub fn shortcut_reference() -> Vec<(Vec<&'static str>, &'static str)> {
    vec![
        (vec!["⌘", "D"], "Dashboard"),
        (vec!["⌘", "Shift", "S"], "Students"),
        (vec!["⌘", "Shift", "C"], "Clinical Hours"),
        (vec!["⌘", "Shift", "A"], "Analytics"),
        (vec!["⌘", ","], "Settings"),
        (vec!["⌘", "K"], "Global Search"),
        (vec!["⌘", "Z"], "Undo"),
        (vec!["⌘", "Shift", "Z"], "Redo"),
        (vec!["?"], "Show Shortcuts"),
    ]
}

#[cfg(test)]
#[path = "tests/shortcuts_tests.rs"]
mod tests;
