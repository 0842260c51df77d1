use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use tracing::{error, info, warn};

use itemdeck::app::{Dashboard, Target};
use itemdeck::config::{self, keybinds::KeybindTable};
use itemdeck::core::{Command, EditorRequest, Message, Services};
use itemdeck::infrastructure::api::{AzureDevOpsClient, ClientConfig, UnavailableApi, WorkItemApi};
use itemdeck::infrastructure::{Editor, RuntimeBridge};
use itemdeck::logging::{self, LogHandle};
use itemdeck::store::TemplateStore;

#[derive(Debug, Parser)]
#[command(
    name = "itemdeck",
    version,
    about = "itemdeck: a terminal dashboard for Azure DevOps work items"
)]
struct Args {
    /// Config file (default: $ITEMDECK_CONFIG or ~/.config/itemdeck/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding YAML work item templates
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Keybind override file (YAML)
    #[arg(long)]
    keybinds: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `itemdeck=trace`
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;
    let mut warnings = Vec::new();

    let log = match config::data_dir() {
        Some(dir) => logging::init(&dir, args.log_level.as_deref(), config.log_level.as_deref())
            .unwrap_or_else(|err| {
                warnings.push(format!("logging disabled: {err}"));
                LogHandle::disabled()
            }),
        None => LogHandle::disabled(),
    };
    let _log_guard = tracing::dispatcher::set_default(log.dispatch());
    info!(version = env!("CARGO_PKG_VERSION"), "starting itemdeck");

    let keybinds_path = args.keybinds.clone().unwrap_or_else(|| config.keybinds_path());
    let (keybinds, keybind_warnings) = KeybindTable::load_or_create(&keybinds_path);
    warnings.extend(keybind_warnings);

    let api: Arc<dyn WorkItemApi> = match AzureDevOpsClient::new(ClientConfig {
        organization: config.organization.clone(),
        project: config.project.clone(),
        token: config.token(),
        timeout: config.request_timeout(),
    }) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            warn!(error = %err, "work item service unavailable");
            warnings.push(err.to_string());
            Arc::new(UnavailableApi::new(err.to_string()))
        }
    };

    let templates_root = args
        .templates_dir
        .clone()
        .unwrap_or_else(|| config.templates_dir());
    let services = Services {
        api,
        templates: TemplateStore::new(&templates_root),
    };
    let runtime = RuntimeBridge::new(services, log.clone())?;
    let editor = Editor::resolve(config.editor.as_deref());

    let target = Target {
        organization: config.organization.clone(),
        project: config.project.clone(),
    };
    let dashboard = Dashboard::new(Arc::new(keybinds), target, templates_root, log)
        .with_warnings(warnings);

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, dashboard, &runtime, &editor);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = ?err, "dashboard exited with error");
        eprintln!("{err:?}");
    }

    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut dashboard: Dashboard,
    runtime: &RuntimeBridge,
    editor: &Editor,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut queue: VecDeque<Command> = dashboard.init().into();

    let size = terminal.size()?;
    queue.extend(dashboard.update(Message::Resize {
        width: size.width,
        height: size.height,
    }));

    loop {
        for message in runtime.poll_messages() {
            queue.extend(dashboard.update(message));
        }
        drain(terminal, &mut dashboard, &mut queue, runtime, editor)?;

        terminal.draw(|f| dashboard.render(f))?;
        if dashboard.should_quit() {
            return Ok(());
        }

        if event::poll(tick_rate)? {
            let message = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => Some(Message::Key(key)),
                Event::Resize(width, height) => Some(Message::Resize { width, height }),
                _ => None,
            };
            if let Some(message) = message {
                queue.extend(dashboard.update(message));
            }
        }
    }
}

/// Run queued commands until only in-flight tasks remain.
fn drain<B: Backend>(
    terminal: &mut Terminal<B>,
    dashboard: &mut Dashboard,
    queue: &mut VecDeque<Command>,
    runtime: &RuntimeBridge,
    editor: &Editor,
) -> Result<()> {
    while let Some(command) = queue.pop_front() {
        match command {
            Command::Emit(message) => queue.extend(dashboard.update(message)),
            Command::Task { label, run } => {
                if let Err(err) = runtime.submit(label.clone(), run) {
                    queue.extend(dashboard.update(Message::TaskFailed {
                        label,
                        error: err.to_string(),
                    }));
                }
            }
            Command::Editor(EditorRequest { path, purpose }) => {
                let result = suspend_for_editor(terminal, editor, &path);
                queue.extend(dashboard.update(Message::EditorClosed {
                    path,
                    purpose,
                    result: result.map_err(|err| format!("{err:#}")),
                }));
            }
            Command::Batch(commands) => {
                for command in commands.into_iter().rev() {
                    queue.push_front(command);
                }
            }
        }
    }
    Ok(())
}

/// Leave the alternate screen, run the editor to completion, then restore.
fn suspend_for_editor<B: Backend>(
    terminal: &mut Terminal<B>,
    editor: &Editor,
    path: &std::path::Path,
) -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    let result = editor.run(path);

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    terminal.clear()?;
    result
}
