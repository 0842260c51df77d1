use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::TreeItem;
use crate::domain::{slugify, Template};

pub const TEMPLATE_EXT: &str = "yaml";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid template: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0} not found")]
    NotFound(PathBuf),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

pub type TemplateResult<T> = Result<T, TemplateError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TemplateError + '_ {
    move |source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Node in the template directory tree
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub name: String,
    pub path: PathBuf,
    /// Path relative to the store root, `/`-separated
    pub key: String,
    pub is_folder: bool,
    pub children: Vec<TemplateNode>,
}

impl TreeItem for TemplateNode {
    fn key(&self) -> &str {
        &self.key
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn is_folder(&self) -> bool {
        self.is_folder
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// YAML templates under a root directory
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> TemplateResult<()> {
        fs::create_dir_all(&self.root).map_err(io_err(&self.root))
    }

    fn check_inside(&self, path: &Path) -> TemplateResult<()> {
        if path.starts_with(&self.root) && path != self.root {
            Ok(())
        } else {
            Err(TemplateError::NotFound(path.to_path_buf()))
        }
    }

    /// Folders and `.yaml`/`.yml` files, folders first then by name, hidden
    /// entries skipped.
    pub fn list_tree(&self) -> TemplateResult<Vec<TemplateNode>> {
        self.ensure_root()?;

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by(|a, b| {
                b.file_type()
                    .is_dir()
                    .cmp(&a.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'));

        // Pre-order walk: a stack of open folders, closed when depth drops.
        let mut roots: Vec<TemplateNode> = Vec::new();
        let mut stack: Vec<(usize, TemplateNode)> = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                TemplateError::Io {
                    path,
                    source: err.into(),
                }
            })?;
            let is_folder = entry.file_type().is_dir();
            if !is_folder && !is_template_file(entry.path()) {
                continue;
            }
            let depth = entry.depth();
            while stack.last().is_some_and(|(d, _)| *d >= depth) {
                close_node(&mut stack, &mut roots);
            }
            stack.push((depth, self.node_for(entry.path(), is_folder)));
        }
        while !stack.is_empty() {
            close_node(&mut stack, &mut roots);
        }
        Ok(roots)
    }

    fn node_for(&self, path: &Path, is_folder: bool) -> TemplateNode {
        let key = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        TemplateNode {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            key,
            is_folder,
            children: Vec::new(),
        }
    }

    pub fn read_raw(&self, path: &Path) -> TemplateResult<String> {
        if !path.exists() {
            return Err(TemplateError::NotFound(path.to_path_buf()));
        }
        fs::read_to_string(path).map_err(io_err(path))
    }

    pub fn load(&self, path: &Path) -> TemplateResult<Template> {
        let raw = self.read_raw(path)?;
        Template::from_yaml(&raw).map_err(|source| TemplateError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File contents, or a listing for folders.
    pub fn preview(&self, path: &Path) -> TemplateResult<String> {
        if !path.is_dir() {
            return self.read_raw(path);
        }
        let mut names: Vec<String> = fs::read_dir(path)
            .map_err(io_err(path))?
            .filter_map(Result::ok)
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    format!("{name}/")
                } else {
                    name
                }
            })
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        if names.is_empty() {
            Ok("(empty folder)".to_string())
        } else {
            Ok(names.join("\n"))
        }
    }

    pub fn write(&self, path: &Path, template: &Template) -> TemplateResult<()> {
        let yaml = template.to_yaml().map_err(|source| TemplateError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(path, yaml).map_err(io_err(path))
    }

    /// Save under the root with a name derived from the template, never overwriting.
    pub fn save_unique(&self, template: &Template) -> TemplateResult<PathBuf> {
        self.ensure_root()?;
        let path = unique_path(&self.root, &slugify(&template.name));
        self.write(&path, template)?;
        debug!(path = %path.display(), "template saved");
        Ok(path)
    }

    pub fn create_template(&self, dir: &Path, name: &str) -> TemplateResult<PathBuf> {
        let name = validate_name(name)?;
        let file_name = if is_template_file(Path::new(name)) {
            name.to_string()
        } else {
            format!("{name}.{TEMPLATE_EXT}")
        };
        let path = dir.join(file_name);
        if path.exists() {
            return Err(TemplateError::AlreadyExists(path));
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        self.write(&path, &Template::skeleton(&stem))?;
        Ok(path)
    }

    pub fn create_folder(&self, dir: &Path, name: &str) -> TemplateResult<PathBuf> {
        let path = dir.join(validate_name(name)?);
        if path.exists() {
            return Err(TemplateError::AlreadyExists(path));
        }
        fs::create_dir_all(&path).map_err(io_err(&path))?;
        Ok(path)
    }

    pub fn delete(&self, path: &Path) -> TemplateResult<()> {
        self.check_inside(path)?;
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(io_err(path))
        } else if path.exists() {
            fs::remove_file(path).map_err(io_err(path))
        } else {
            Err(TemplateError::NotFound(path.to_path_buf()))
        }
    }

    /// Rename within the same folder. Files keep their extension when none is given.
    pub fn rename(&self, path: &Path, new_name: &str) -> TemplateResult<PathBuf> {
        self.check_inside(path)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(path.to_path_buf()));
        }
        let target = sibling_path(path, validate_name(new_name)?);
        if target.exists() {
            return Err(TemplateError::AlreadyExists(target));
        }
        fs::rename(path, &target).map_err(io_err(path))?;
        Ok(target)
    }

    /// Copy a file or a whole folder next to the source.
    pub fn copy(&self, path: &Path, new_name: &str) -> TemplateResult<PathBuf> {
        self.check_inside(path)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(path.to_path_buf()));
        }
        let target = sibling_path(path, validate_name(new_name)?);
        if target.exists() {
            return Err(TemplateError::AlreadyExists(target));
        }
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|err| TemplateError::Io {
                    path: path.to_path_buf(),
                    source: err.into(),
                })?;
                let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
                let dest = target.join(relative);
                if entry.file_type().is_dir() {
                    fs::create_dir_all(&dest).map_err(io_err(&dest))?;
                } else {
                    fs::copy(entry.path(), &dest).map_err(io_err(&dest))?;
                }
            }
        } else {
            fs::copy(path, &target).map_err(io_err(&target))?;
        }
        Ok(target)
    }
}

fn close_node(stack: &mut Vec<(usize, TemplateNode)>, roots: &mut Vec<TemplateNode>) {
    if let Some((_, node)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

fn is_template_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn validate_name(name: &str) -> TemplateResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

fn sibling_path(path: &Path, name: &str) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    if path.is_file() && Path::new(name).extension().is_none() {
        if let Some(ext) = path.extension() {
            return parent.join(format!("{name}.{}", ext.to_string_lossy()));
        }
    }
    parent.join(name)
}

fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{TEMPLATE_EXT}"));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{stem}-{n}.{TEMPLATE_EXT}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
