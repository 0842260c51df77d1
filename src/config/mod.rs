pub mod keybinds;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_ENV: &str = "ITEMDECK_CONFIG";
pub const TOKEN_ENVS: [&str; 2] = ["ITEMDECK_TOKEN", "AZURE_DEVOPS_EXT_PAT"];
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Organization base URL, e.g. https://dev.azure.com/contoso
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub project: String,

    /// Personal access token. The environment takes precedence.
    pub token: Option<String>,

    /// Editor command; falls back to $EDITOR, $VISUAL, then vi.
    pub editor: Option<String>,

    pub templates_dir: Option<PathBuf>,

    pub keybinds_path: Option<PathBuf>,

    pub log_level: Option<String>,

    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid config")
    }

    /// Missing file → defaults; unreadable or malformed file → error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn token(&self) -> Option<String> {
        resolve_token(
            TOKEN_ENVS.iter().filter_map(|name| std::env::var(name).ok()),
            self.token.as_deref(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .map(expand_home)
            .or_else(|| data_dir().map(|dir| dir.join("templates")))
            .unwrap_or_else(|| PathBuf::from("templates"))
    }

    pub fn keybinds_path(&self) -> PathBuf {
        self.keybinds_path
            .clone()
            .map(expand_home)
            .or_else(|| config_dir().map(|dir| dir.join("keybinds.yaml")))
            .unwrap_or_else(|| PathBuf::from("keybinds.yaml"))
    }
}

fn resolve_token(mut env: impl Iterator<Item = String>, configured: Option<&str>) -> Option<String> {
    env.find(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .filter(|value| !value.trim().is_empty())
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    match path.map(Path::to_path_buf).or_else(config_path) {
        Some(path) => Config::load_from(&path),
        None => Ok(Config::default()),
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        return Some(path);
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

pub fn config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("itemdeck"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("itemdeck"));
    }
    directories::ProjectDirs::from("io", "itemdeck", "itemdeck")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("itemdeck"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("itemdeck"));
    }
    directories::ProjectDirs::from("io", "itemdeck", "itemdeck")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
organization = "https://dev.azure.com/contoso"
project = "Fabrikam"
token = "secret"
editor = "nvim"
templates_dir = "/tmp/templates"
log_level = "debug"
request_timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.project, "Fabrikam");
        assert_eq!(config.editor.as_deref(), Some("nvim"));
        assert_eq!(config.templates_dir(), PathBuf::from("/tmp/templates"));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_default_and_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_from(&dir.path().join("none.toml")).unwrap();
        assert!(missing.organization.is_empty());
        assert_eq!(missing.request_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "organization = [").unwrap();
        assert!(Config::load_from(&bad).is_err());
    }

    #[test]
    fn test_token_precedence() {
        let env = vec![String::new(), "from-env".to_string()];
        assert_eq!(
            resolve_token(env.into_iter(), Some("from-config")).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            resolve_token(std::iter::empty(), Some("from-config")).as_deref(),
            Some("from-config")
        );
        assert_eq!(resolve_token(std::iter::empty(), Some("  ")), None);
    }
}
