//! Keybind file handling and its effect on the dashboard

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use itemdeck::app::{Dashboard, Target};
use itemdeck::config::keybinds::{KeybindTable, Scope};
use itemdeck::core::Message;
use itemdeck::logging::LogHandle;

fn press(code: KeyCode) -> Message {
    Message::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("keybinds.yaml");

    let (table, warnings) = KeybindTable::load_or_create(&path);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(table, KeybindTable::defaults());
    assert!(path.exists());

    let (reloaded, warnings) = KeybindTable::load_or_create(&path);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(reloaded, table);
}

#[test]
fn test_partial_override_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybinds.yaml");
    std::fs::write(
        &path,
        "global:\n  quit: [\"x\"]\nwork_items:\n  yank: [\"ctrl+y\"]\n  teleport: [\"z\"]\n",
    )
    .unwrap();

    let (table, warnings) = KeybindTable::load_or_create(&path);
    assert_eq!(warnings, vec!["unknown action 'work_items.teleport'"]);
    assert_eq!(table.describe(Scope::Global, "quit"), "x");
    assert_eq!(table.describe(Scope::Global, "help"), "?");
    assert_eq!(table.describe(Scope::WorkItems, "yank"), "ctrl+y");
    assert_eq!(table.describe(Scope::WorkItems, "delete"), "x");
}

#[test]
fn test_malformed_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keybinds.yaml");
    std::fs::write(&path, "global: [not, a, map\n").unwrap();

    let (table, warnings) = KeybindTable::load_or_create(&path);
    assert_eq!(table, KeybindTable::defaults());
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].ends_with("using defaults"), "{}", warnings[0]);
}

#[test]
fn test_dashboard_follows_overridden_quit() {
    let mut table = KeybindTable::defaults();
    table.apply_overrides("global:\n  quit: [\"ctrl+q\"]\n").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = Dashboard::new(
        Arc::new(table),
        Target::default(),
        dir.path(),
        LogHandle::disabled(),
    );

    dashboard.update(press(KeyCode::Char('q')));
    assert!(!dashboard.should_quit());

    let hints = dashboard.footer_hints();
    assert!(hints.contains(&("ctrl+q".to_string(), "quit".to_string())), "{hints:?}");

    dashboard.update(Message::Key(KeyEvent::new(
        KeyCode::Char('q'),
        KeyModifiers::CONTROL,
    )));
    assert!(dashboard.should_quit());
}
