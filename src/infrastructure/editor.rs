//! External editor process

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;

const FALLBACK_EDITOR: &str = "vi";

/// Editor command line, e.g. `code --wait`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    program: String,
    args: Vec<String>,
}

impl Editor {
    /// First non-empty of: configured command, `$EDITOR`, `$VISUAL`, `vi`.
    pub fn resolve(configured: Option<&str>) -> Self {
        let env = |name: &str| std::env::var(name).ok();
        Self::from_candidates([
            configured.map(str::to_string),
            env("EDITOR"),
            env("VISUAL"),
        ])
    }

    fn from_candidates(candidates: impl IntoIterator<Item = Option<String>>) -> Self {
        let command = candidates
            .into_iter()
            .flatten()
            .find(|c| !c.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| FALLBACK_EDITOR.to_string());
        Self {
            program,
            args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion on `path`; a non-zero exit is an error.
    pub fn run(&self, path: &Path) -> Result<()> {
        info!(editor = %self.program, path = %path.display(), "launching editor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .with_context(|| format!("failed to launch {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        let editor = Editor::from_candidates([
            Some("code --wait".to_string()),
            Some("nano".to_string()),
        ]);
        assert_eq!(editor.program(), "code");
        assert_eq!(editor.args, vec!["--wait"]);

        let editor = Editor::from_candidates([None, Some("  ".to_string()), Some("nano".into())]);
        assert_eq!(editor.program(), "nano");

        let editor = Editor::from_candidates([None, None]);
        assert_eq!(editor.program(), FALLBACK_EDITOR);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_is_checked() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(Editor::from_candidates([Some("true".to_string())])
            .run(file.path())
            .is_ok());
        assert!(Editor::from_candidates([Some("false".to_string())])
            .run(file.path())
            .is_err());
    }
}
