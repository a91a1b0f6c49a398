use crate::{IndexerError, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Synchronous access to the current text of workspace files, keyed by
/// `/`-separated paths relative to the workspace root
pub trait FileSource: Send + Sync {
    fn read(&self, relative_path: &str) -> Result<String>;
}

/// Reads files from disk under a root directory
#[derive(Debug, Clone)]
pub struct FsFileSource {
    root: PathBuf,
}

impl FsFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSource for FsFileSource {
    fn read(&self, relative_path: &str) -> Result<String> {
        let relative = Path::new(relative_path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(IndexerError::InvalidPath(relative_path.to_string()));
        }
        Ok(std::fs::read_to_string(self.root.join(relative))?)
    }
}

/// In-memory file contents, e.g. unsaved editor buffers
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSource {
    files: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryFileSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, relative_path: impl Into<String>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(relative_path.into(), content.into());
        }
    }

    pub fn remove(&self, relative_path: &str) {
        if let Ok(mut files) = self.files.write() {
            files.remove(relative_path);
        }
    }
}

impl FileSource for MemoryFileSource {
    fn read(&self, relative_path: &str) -> Result<String> {
        let files = self
            .files
            .read()
            .map_err(|e| IndexerError::Other(format!("file map poisoned: {e}")))?;
        files.get(relative_path).cloned().ok_or_else(|| {
            IndexerError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{relative_path} not found"),
            ))
        })
    }
}

/// `/`-separated path of `path` relative to `root`
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
