//! File logging handle
//!
//! The terminal belongs to the UI, so log output goes to `<data_dir>/itemdeck.log`.
//! No global subscriber is installed: the coordinator and the runtime worker each
//! enter the [`LogHandle`] dispatch explicitly.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ITEMDECK_LOG";
pub const LOG_FILE: &str = "itemdeck.log";
const DEFAULT_LEVEL: &str = "info";

#[derive(Clone)]
pub struct LogHandle {
    dispatch: Dispatch,
    path: Option<PathBuf>,
}

impl LogHandle {
    /// Handle that drops every event.
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
            path: None,
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with this handle as the thread's default subscriber.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle").field("path", &self.path).finish()
    }
}

/// Filter directive with precedence: CLI flag, `ITEMDECK_LOG`, config, `info`.
pub fn filter_directive(cli: Option<&str>, env: Option<String>, config: Option<&str>) -> String {
    cli.map(str::to_string)
        .or(env)
        .or_else(|| config.map(str::to_string))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

pub fn init(dir: &Path, cli_level: Option<&str>, config_level: Option<&str>) -> Result<LogHandle> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory '{}'", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))?;

    let directive = filter_directive(cli_level, std::env::var(LOG_ENV).ok(), config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .finish();

    Ok(LogHandle {
        dispatch: Dispatch::new(subscriber),
        path: Some(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(
            filter_directive(Some("debug"), Some("warn".into()), Some("error")),
            "debug"
        );
        assert_eq!(filter_directive(None, Some("warn".into()), Some("error")), "warn");
        assert_eq!(filter_directive(None, None, Some("error")), "error");
        assert_eq!(filter_directive(None, None, None), "info");
    }

    #[test]
    fn test_init_writes_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = init(dir.path(), Some("debug"), None).expect("init");
        handle.scope(|| tracing::info!(target: "itemdeck", "hello from test"));

        let path = handle.path().expect("path");
        let content = std::fs::read_to_string(path).expect("read log");
        assert!(content.contains("hello from test"));
    }
}
