//! Key bindings: built-in defaults plus a per-action YAML override file
//!
//! The file maps scope → action → list of chords:
//!
//! ```yaml
//! global:
//!   quit: ["q", "ctrl+c"]
//! work_items:
//!   delete: ["x", "delete"]
//! ```
//!
//! Actions missing from the file keep their defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KeybindError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid keybind file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid chord {chord:?}: {reason}")]
    InvalidChord { chord: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Queries,
    WorkItems,
    Templates,
}

impl Scope {
    pub const ALL: [Scope; 4] = [
        Scope::Global,
        Scope::Queries,
        Scope::WorkItems,
        Scope::Templates,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Queries => "queries",
            Scope::WorkItems => "work_items",
            Scope::Templates => "templates",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        Scope::ALL.into_iter().find(|scope| scope.key() == raw)
    }
}

const NAVIGATION: &[(&str, &[&str])] = &[
    ("up", &["k", "up"]),
    ("down", &["j", "down"]),
    ("top", &["g", "home"]),
    ("bottom", &["G", "end"]),
    ("page_up", &["ctrl+u", "pgup"]),
    ("page_down", &["ctrl+d", "pgdown"]),
];

const GLOBAL: &[(&str, &[&str])] = &[
    ("quit", &["q", "ctrl+c"]),
    ("next_tab", &["tab"]),
    ("prev_tab", &["shift+tab"]),
    ("help", &["?"]),
];

const QUERIES: &[(&str, &[&str])] = &[
    ("select", &["enter"]),
    ("filter", &["/"]),
    ("refresh", &["r"]),
];

const WORK_ITEMS: &[(&str, &[&str])] = &[
    ("toggle_detail", &["enter"]),
    ("filter", &["/"]),
    ("refresh", &["r"]),
    ("download", &["d"]),
    ("edit", &["e"]),
    ("delete", &["x"]),
    ("change_state", &["s"]),
    ("assign", &["a"]),
    ("add_tags", &["t"]),
    ("yank", &["y"]),
];

const TEMPLATES: &[(&str, &[&str])] = &[
    ("select", &["enter"]),
    ("refresh", &["R"]),
    ("create_work_item", &["u"]),
    ("copy", &["c"]),
    ("rename", &["r"]),
    ("new_template", &["n"]),
    ("new_folder", &["N"]),
    ("delete", &["x"]),
    ("edit", &["e"]),
];

/// A key plus modifiers. Character chords are case-sensitive and ignore SHIFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyChord {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let (code, modifiers) = normalize(code, modifiers);
        Self { code, modifiers }
    }

    pub fn parse(raw: &str) -> Result<Self, KeybindError> {
        let invalid = |reason: &str| KeybindError::InvalidChord {
            chord: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty chord"));
        }
        // "+" alone (or as the final key) is a literal plus.
        let (prefix, key_part) = match trimmed.strip_suffix("++") {
            Some(prefix) => (Some(prefix), "+"),
            None if trimmed == "+" => (None, "+"),
            None => match trimmed.rsplit_once('+') {
                Some((prefix, key)) => (Some(prefix), key),
                None => (None, trimmed),
            },
        };

        let mut modifiers = KeyModifiers::NONE;
        for modifier in prefix.into_iter().flat_map(|p| p.split('+')) {
            match modifier.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                "" => return Err(invalid("missing modifier")),
                _ => return Err(invalid("unknown modifier")),
            }
        }

        let key_part = key_part.trim();
        if key_part.is_empty() {
            return Err(invalid("missing key after modifier"));
        }
        let code = match key_part.to_ascii_lowercase().as_str() {
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "backtab" => KeyCode::BackTab,
            "backspace" => KeyCode::Backspace,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pgup" | "pageup" => KeyCode::PageUp,
            "pgdown" | "pagedown" => KeyCode::PageDown,
            "delete" | "del" => KeyCode::Delete,
            "space" => KeyCode::Char(' '),
            lower => match function_key(lower) {
                Some(n) => KeyCode::F(n),
                None => {
                    let mut chars = key_part.chars();
                    match (chars.next(), chars.next()) {
                        (Some(ch), None) => KeyCode::Char(ch),
                        _ => return Err(invalid("expected a single character or a named key")),
                    }
                }
            },
        };

        Ok(Self::new(code, modifiers))
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        let (code, modifiers) = normalize(key.code, key.modifiers);
        self.code == code && self.modifiers == modifiers
    }

    /// Plain printable character without ctrl/alt; typed into text fields.
    pub fn is_plain_char(&self) -> bool {
        matches!(self.code, KeyCode::Char(_)) && self.modifiers.is_empty()
    }
}

fn function_key(raw: &str) -> Option<u8> {
    let n: u8 = raw.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

fn normalize(code: KeyCode, modifiers: KeyModifiers) -> (KeyCode, KeyModifiers) {
    let modifiers = modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
    match code {
        KeyCode::Char(ch) if modifiers.contains(KeyModifiers::SHIFT) => {
            (KeyCode::Char(ch.to_ascii_uppercase()), modifiers.difference(KeyModifiers::SHIFT))
        }
        KeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => {
            (KeyCode::BackTab, modifiers.difference(KeyModifiers::SHIFT))
        }
        KeyCode::BackTab => (KeyCode::BackTab, modifiers.difference(KeyModifiers::SHIFT)),
        other => (other, modifiers),
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("alt+")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            f.write_str("shift+")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(ch) => write!(f, "{ch}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Esc => f.write_str("esc"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::BackTab => f.write_str("shift+tab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pgup"),
            KeyCode::PageDown => f.write_str("pgdown"),
            KeyCode::Delete => f.write_str("delete"),
            other => write!(f, "{other:?}"),
        }
    }
}

type RawBindings = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `(scope, action) → chords`, immutable once the dashboard starts
#[derive(Debug, Clone, PartialEq)]
pub struct KeybindTable {
    bindings: BTreeMap<Scope, BTreeMap<String, Vec<KeyChord>>>,
}

impl Default for KeybindTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl KeybindTable {
    pub fn defaults() -> Self {
        let mut bindings: BTreeMap<Scope, BTreeMap<String, Vec<KeyChord>>> = BTreeMap::new();
        let tables: [(Scope, &[(&str, &[&str])]); 4] = [
            (Scope::Global, GLOBAL),
            (Scope::Queries, QUERIES),
            (Scope::WorkItems, WORK_ITEMS),
            (Scope::Templates, TEMPLATES),
        ];
        for (scope, table) in tables {
            let actions = bindings.entry(scope).or_default();
            let navigation = if scope == Scope::Global { &[][..] } else { NAVIGATION };
            for (action, chords) in navigation.iter().chain(table.iter()) {
                let parsed = chords.iter().filter_map(|c| KeyChord::parse(c).ok()).collect();
                actions.insert(action.to_string(), parsed);
            }
        }
        Self { bindings }
    }

    /// Replace the chords of every action named in `raw`. Returns warnings for
    /// entries that were skipped.
    pub fn apply_overrides(&mut self, raw: &str) -> Result<Vec<String>, KeybindError> {
        let mut warnings = Vec::new();
        if raw.trim().is_empty() {
            return Ok(warnings);
        }
        let parsed: Option<RawBindings> = serde_yaml::from_str(raw)?;
        for (scope_key, actions) in parsed.unwrap_or_default() {
            let Some(scope) = Scope::from_key(&scope_key) else {
                warnings.push(format!("unknown keybind scope '{scope_key}'"));
                continue;
            };
            let Some(known) = self.bindings.get_mut(&scope) else {
                continue;
            };
            for (action, chords) in actions {
                let Some(slot) = known.get_mut(&action) else {
                    warnings.push(format!("unknown action '{scope_key}.{action}'"));
                    continue;
                };
                match chords
                    .iter()
                    .map(|c| KeyChord::parse(c))
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(parsed) => *slot = parsed,
                    Err(err) => warnings.push(format!("{scope_key}.{action}: {err}")),
                }
            }
        }
        for warning in &warnings {
            warn!(%warning, "keybind override skipped");
        }
        Ok(warnings)
    }

    pub fn load_overrides(&mut self, path: &Path) -> Result<Vec<String>, KeybindError> {
        let raw = fs::read_to_string(path).map_err(|source| KeybindError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_overrides(&raw)
    }

    /// Defaults plus overrides from `path`. A missing file is created with the
    /// defaults; any failure falls back to defaults and is reported as a warning.
    pub fn load_or_create(path: &Path) -> (Self, Vec<String>) {
        let mut table = Self::defaults();
        if !path.exists() {
            if let Err(err) = table.write_defaults(path) {
                warn!(path = %path.display(), error = %err, "failed to write default keybinds");
                return (table, vec![format!("could not create keybind file: {err}")]);
            }
            info!(path = %path.display(), "wrote default keybinds");
            return (table, Vec::new());
        }
        match table.load_overrides(path) {
            Ok(warnings) => (table, warnings),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "keybind file ignored");
                (Self::defaults(), vec![format!("keybinds: {err}; using defaults")])
            }
        }
    }

    fn write_defaults(&self, path: &Path) -> Result<(), KeybindError> {
        let io = |source| KeybindError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(path, self.to_yaml()?).map_err(io)
    }

    pub fn to_yaml(&self) -> Result<String, KeybindError> {
        let raw: RawBindings = self
            .bindings
            .iter()
            .map(|(scope, actions)| {
                let actions = actions
                    .iter()
                    .map(|(action, chords)| {
                        (action.clone(), chords.iter().map(ToString::to_string).collect())
                    })
                    .collect();
                (scope.key().to_string(), actions)
            })
            .collect();
        Ok(serde_yaml::to_string(&raw)?)
    }

    pub fn chords(&self, scope: Scope, action: &str) -> &[KeyChord] {
        self.bindings
            .get(&scope)
            .and_then(|actions| actions.get(action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Chords joined for display, e.g. `q/ctrl+c`.
    pub fn describe(&self, scope: Scope, action: &str) -> String {
        self.chords(scope, action)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn matches(&self, key: &KeyEvent, scope: Scope, action: &str) -> bool {
        self.chords(scope, action).iter().any(|chord| chord.matches(key))
    }

    /// First action in `scope` bound to `key`.
    pub fn action_for(&self, key: &KeyEvent, scope: Scope) -> Option<&str> {
        self.bindings.get(&scope)?.iter().find_map(|(action, chords)| {
            chords
                .iter()
                .any(|chord| chord.matches(key))
                .then_some(action.as_str())
        })
    }
}
