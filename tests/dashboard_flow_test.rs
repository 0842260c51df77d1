//! Dashboard flows driven through `update`, with tasks run inline against the
//! in-memory service

mod common;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;

use common::{services, work_item, MockApi};
use itemdeck::app::{Dashboard, Target};
use itemdeck::config::keybinds::KeybindTable;
use itemdeck::core::{ActionKind, Command, EditorRequest, Message, Services, TabKind};
use itemdeck::domain::work_item::{FIELD_ASSIGNED_TO, FIELD_STATE};
use itemdeck::domain::QueryNode;
use itemdeck::logging::LogHandle;
use itemdeck::modules::{TemplatesTab, WorkItemsTab};

fn dashboard(templates: &Path) -> Dashboard {
    Dashboard::new(
        Arc::new(KeybindTable::defaults()),
        Target {
            organization: "contoso".into(),
            project: "shop".into(),
        },
        templates,
        LogHandle::disabled(),
    )
}

fn key(code: KeyCode) -> Message {
    Message::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn labels(commands: &[Command]) -> Vec<String> {
    let mut labels: Vec<String> = commands.iter().map(|c| c.label().to_string()).collect();
    labels.sort();
    labels
}

/// Run commands to completion, feeding every result back into the dashboard.
/// Notification timers are skipped; editor requests are returned unrun.
async fn pump(
    dashboard: &mut Dashboard,
    services: &Services,
    commands: Vec<Command>,
) -> Vec<EditorRequest> {
    let mut queue: VecDeque<Command> = commands.into();
    let mut editors = Vec::new();
    while let Some(command) = queue.pop_front() {
        match command {
            Command::Task { ref label, .. } if label == "notification timer" => {}
            Command::Editor(request) => editors.push(request),
            other => {
                for message in other.execute(services).await {
                    queue.extend(dashboard.update(message));
                }
            }
        }
    }
    editors
}

async fn send(dashboard: &mut Dashboard, services: &Services, message: Message) -> Vec<EditorRequest> {
    let commands = dashboard.update(message);
    pump(dashboard, services, commands).await
}

/// Dashboard past its first layout with one query already run.
async fn loaded(api: &MockApi, templates: &Path) -> (Dashboard, Services) {
    let services = services(api, templates);
    let mut dashboard = dashboard(templates);
    send(&mut dashboard, &services, Message::Resize { width: 120, height: 40 }).await;
    send(
        &mut dashboard,
        &services,
        Message::RunQuery {
            id: "q-active".into(),
            name: "Active work".into(),
        },
    )
    .await;
    (dashboard, services)
}

fn notification(dashboard: &Dashboard) -> String {
    dashboard
        .overlays()
        .notification
        .text()
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_first_real_layout_starts_loading_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = dashboard(dir.path());

    assert!(dashboard.update(Message::Resize { width: 0, height: 0 }).is_empty());

    let commands = dashboard.update(Message::Resize { width: 120, height: 40 });
    assert_eq!(labels(&commands), vec!["load queries", "load templates"]);
    assert!(commands.iter().all(Command::is_task));

    assert!(dashboard.update(Message::Resize { width: 130, height: 40 }).is_empty());
    assert_eq!(dashboard.size(), (130, 40));
}

#[test]
fn test_startup_warnings_become_notification() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = dashboard(dir.path()).with_warnings(vec![
        "organization not configured".into(),
        "keybinds: bad chord".into(),
    ]);
    let commands = dashboard.init();
    assert_eq!(labels(&commands), vec!["notification timer"]);
    assert_eq!(
        notification(&dashboard),
        "organization not configured; keybinds: bad chord"
    );
    assert!(dashboard.init().is_empty());
}

#[tokio::test]
async fn test_selecting_query_loads_work_items() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.set_queries(vec![QueryNode::query("q-active", "Active work", "Shared/Active work")]);
    api.insert(work_item(1, "Login fails", "Active", "Bug"));
    api.insert(work_item(2, "Add SSO", "New", "User Story"));
    let services = services(&api, dir.path());
    let mut dashboard = dashboard(dir.path());

    send(&mut dashboard, &services, Message::Resize { width: 120, height: 40 }).await;
    assert_eq!(dashboard.active_kind(), TabKind::Queries);

    send(&mut dashboard, &services, key(KeyCode::Enter)).await;
    assert_eq!(dashboard.active_kind(), TabKind::WorkItems);
    assert_eq!(api.calls_to("execute_query"), vec!["execute_query q-active"]);

    let tab = dashboard.tab::<WorkItemsTab>().unwrap();
    assert_eq!(tab.query_name(), Some("Active work"));
    assert_eq!(tab.visible_items().count(), 2);
    assert!(!dashboard.is_loading());
}

#[tokio::test]
async fn test_delete_confirms_then_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(1, "Checkout epic", "New", "Epic"));
    api.insert(work_item(2, "Cart page", "New", "User Story"));
    api.link(1, 2);
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, key(KeyCode::Char('x'))).await;
    assert!(dashboard.overlays().confirm.is_visible());
    assert_eq!(
        dashboard.overlays().confirm.prompt(),
        "Delete #1 'Checkout epic' and its 1 child? (y/n)"
    );
    assert!(dashboard.pending_action().is_some());
    assert!(api.calls_to("delete_work_item").is_empty());

    send(&mut dashboard, &services, key(KeyCode::Char('y'))).await;
    assert_eq!(
        api.calls_to("delete_work_item"),
        vec!["delete_work_item 2", "delete_work_item 1"]
    );
    assert!(dashboard.pending_action().is_none());
    assert_eq!(notification(&dashboard), "Deleted #1 (2 work items)");
    assert_eq!(api.calls_to("execute_query").len(), 2);
    assert_eq!(dashboard.tab::<WorkItemsTab>().unwrap().visible_items().count(), 0);
}

#[tokio::test]
async fn test_declined_delete_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(1, "Checkout epic", "New", "Epic"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, key(KeyCode::Char('x'))).await;
    send(&mut dashboard, &services, key(KeyCode::Char('n'))).await;
    assert!(!dashboard.overlays().is_modal_open());
    assert!(dashboard.pending_action().is_none());
    assert!(api.calls_to("delete_work_item").is_empty());
}

#[tokio::test]
async fn test_change_state_offers_allowed_states() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(4, "Flaky test", "New", "Bug"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, key(KeyCode::Char('s'))).await;
    let prompt = &dashboard.overlays().prompt;
    assert!(prompt.is_visible());
    assert_eq!(prompt.title(), "State of #4 (Bug)");
    assert_eq!(prompt.value(), "New");

    send(&mut dashboard, &services, key(KeyCode::Down)).await;
    assert_eq!(dashboard.overlays().prompt.value(), "Active");
    send(&mut dashboard, &services, key(KeyCode::Enter)).await;

    assert_eq!(api.item(4).unwrap().field_str(FIELD_STATE), Some("Active"));
    assert_eq!(notification(&dashboard), "Updated #4 Flaky test");
    assert!(dashboard.pending_action().is_none());
}

#[tokio::test]
async fn test_assign_then_unassign() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(4, "Flaky test", "New", "Bug"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, key(KeyCode::Char('a'))).await;
    for ch in "dana@contoso.com".chars() {
        send(&mut dashboard, &services, key(KeyCode::Char(ch))).await;
    }
    send(&mut dashboard, &services, key(KeyCode::Enter)).await;
    assert_eq!(
        api.item(4).unwrap().field_str(FIELD_ASSIGNED_TO),
        Some("dana@contoso.com")
    );

    send(&mut dashboard, &services, key(KeyCode::Char('a'))).await;
    assert_eq!(dashboard.overlays().prompt.value(), "dana@contoso.com");
    dashboard.update(Message::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
    send(&mut dashboard, &services, key(KeyCode::Enter)).await;
    assert!(api.item(4).unwrap().field_str(FIELD_ASSIGNED_TO).is_none());
}

#[tokio::test]
async fn test_edit_work_item_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(8, "Flaky login test", "New", "Bug"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    let editors = send(&mut dashboard, &services, key(KeyCode::Char('e'))).await;
    assert_eq!(editors.len(), 1);
    let EditorRequest { path, purpose } = editors.into_iter().next().unwrap();
    assert!(path.exists());

    // a second shortcut while the editor is open is refused
    send(&mut dashboard, &services, key(KeyCode::Char('x'))).await;
    assert!(notification(&dashboard).starts_with("Busy:"));

    send(
        &mut dashboard,
        &services,
        Message::EditorClosed {
            path: path.clone(),
            purpose,
            result: Ok(()),
        },
    )
    .await;
    assert_eq!(notification(&dashboard), "No changes to #8");
    assert!(!path.exists());
    assert!(api.calls_to("update_work_item").is_empty());
    assert!(dashboard.pending_action().is_none());
}

#[tokio::test]
async fn test_create_from_template_switches_to_work_items() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bug.yaml"),
        "name: Crash on save\ntype: Bug\nfields:\n  System.Title: Crash on save\n",
    )
    .unwrap();
    let api = MockApi::new();
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, Message::SwitchTab(TabKind::Templates)).await;
    let tab = dashboard.tab::<TemplatesTab>().unwrap();
    assert_eq!(tab.selected_node().map(|n| n.name.as_str()), Some("bug.yaml"));

    send(&mut dashboard, &services, key(KeyCode::Char('u'))).await;
    assert_eq!(dashboard.active_kind(), TabKind::WorkItems);
    assert_eq!(api.calls_to("create_work_item"), vec!["create_work_item Bug"]);
    assert_eq!(notification(&dashboard), "Created #1001 Crash on save");
    assert_eq!(dashboard.tab::<WorkItemsTab>().unwrap().visible_items().count(), 1);
}

#[tokio::test]
async fn test_edit_template_requests_editor() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("task.yaml"), "name: Chore\ntype: Task\nfields: {}\n").unwrap();
    let api = MockApi::new();
    let services = services(&api, dir.path());
    let mut dashboard = dashboard(dir.path());
    send(&mut dashboard, &services, Message::Resize { width: 120, height: 40 }).await;
    send(&mut dashboard, &services, Message::SwitchTab(TabKind::Templates)).await;

    let editors = send(&mut dashboard, &services, key(KeyCode::Char('e'))).await;
    assert_eq!(editors.len(), 1);
    assert_eq!(editors[0].path, dir.path().join("task.yaml"));
}

#[tokio::test]
async fn test_new_folder_prompt_creates_folder() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    let services = services(&api, dir.path());
    let mut dashboard = dashboard(dir.path());
    send(&mut dashboard, &services, Message::Resize { width: 120, height: 40 }).await;
    send(&mut dashboard, &services, Message::SwitchTab(TabKind::Templates)).await;

    send(
        &mut dashboard,
        &services,
        Message::Key(KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT)),
    )
    .await;
    assert!(dashboard.overlays().prompt.is_visible());
    for ch in "bugs".chars() {
        send(&mut dashboard, &services, key(KeyCode::Char(ch))).await;
    }
    send(&mut dashboard, &services, key(KeyCode::Enter)).await;

    assert!(dir.path().join("bugs").is_dir());
    let tab = dashboard.tab::<TemplatesTab>().unwrap();
    assert!(tab.rows().iter().any(|row| row.label == "bugs"));
}

#[tokio::test]
async fn test_filtering_lets_quit_key_through() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(1, "Quick fix", "New", "Bug"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    send(&mut dashboard, &services, key(KeyCode::Char('/'))).await;
    send(&mut dashboard, &services, key(KeyCode::Char('q'))).await;
    assert!(!dashboard.should_quit());
    assert!(dashboard.active_tab().is_filtering());

    dashboard.update(Message::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    assert!(dashboard.should_quit());
}

#[test]
fn test_load_failure_only_stops_its_own_tab() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = dashboard(dir.path());
    dashboard.update(Message::Resize { width: 120, height: 40 });
    dashboard.update(Message::TaskFailed {
        label: "load queries".into(),
        error: "worker channel closed".into(),
    });
    assert_eq!(
        notification(&dashboard),
        "load queries failed: worker channel closed"
    );
    assert_eq!(dashboard.active_kind(), TabKind::Queries);
    assert!(!dashboard.active_tab().is_loading());
    // the template load is still in flight
    assert!(dashboard.is_loading());
}

#[tokio::test]
async fn test_unrelated_failure_keeps_action_slot() {
    let dir = tempfile::tempdir().unwrap();
    let api = MockApi::new();
    api.insert(work_item(5, "Ship it", "New", "Task"));
    let (mut dashboard, services) = loaded(&api, dir.path()).await;

    // the download task is issued but left running
    let commands = dashboard.update(key(KeyCode::Char('d')));
    assert_eq!(labels(&commands), vec!["download template"]);
    assert_eq!(
        dashboard.pending_action().map(|p| p.kind),
        Some(ActionKind::DownloadTemplate)
    );

    dashboard.update(Message::TaskFailed {
        label: "load work item detail".into(),
        error: "timed out".into(),
    });
    assert_eq!(
        dashboard.pending_action().map(|p| p.kind),
        Some(ActionKind::DownloadTemplate)
    );

    let commands = dashboard.update(key(KeyCode::Char('x')));
    assert_eq!(labels(&commands), vec!["notification timer"]);
    assert!(notification(&dashboard).starts_with("Busy:"));

    dashboard.update(Message::TaskFailed {
        label: "download template".into(),
        error: "disk full".into(),
    });
    assert!(dashboard.pending_action().is_none());
    send(&mut dashboard, &services, key(KeyCode::Char('x'))).await;
    assert!(dashboard.overlays().confirm.is_visible());
}

#[test]
fn test_render_survives_small_terminals() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = dashboard(dir.path());
    for (width, height) in [(1, 1), (12, 3), (40, 8), (120, 40)] {
        dashboard.update(Message::Resize { width, height });
        for _ in 0..5 {
            let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
            terminal.draw(|f| dashboard.render(f)).unwrap();
            dashboard.update(key(KeyCode::Tab));
        }
    }

    dashboard.update(key(KeyCode::Char('?')));
    dashboard.update(Message::error("something broke"));
    let mut terminal = Terminal::new(TestBackend::new(20, 5)).unwrap();
    terminal.draw(|f| dashboard.render(f)).unwrap();
}

#[test]
fn test_render_shows_target_and_tabs() {
    let dir = tempfile::tempdir().unwrap();
    let mut dashboard = dashboard(dir.path());
    dashboard.update(Message::Resize { width: 100, height: 20 });
    let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
    terminal.draw(|f| dashboard.render(f)).unwrap();

    let buffer = terminal.backend().buffer();
    let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
    assert!(text.contains("contoso"), "{text}");
    assert!(text.contains("Queries"));
    assert!(text.contains("Templates"));
}
