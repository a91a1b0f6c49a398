use crate::source::relative_path;
use flowlens_graph::Language;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Finds the source files the engine can extract, honouring `.gitignore`
pub struct FileScanner {
    root: PathBuf,
    ignored_dirs: Vec<String>,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ignored_dirs: Vec::new(),
        }
    }

    /// Skip directories with these names anywhere in the tree
    #[must_use]
    pub fn with_ignored_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Relative `/`-separated paths of supported source files, sorted
    pub fn scan(&self) -> Vec<String> {
        let mut builder = WalkBuilder::new(&self.root);
        builder.git_ignore(true);
        builder.git_exclude(true);
        builder.follow_links(false);
        builder.hidden(true);

        let ignored = self.ignored_dirs.clone();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| ignored.iter().any(|d| d == name)))
        });

        let mut files: Vec<String> = builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::debug!("Skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter(|entry| Language::from_path(entry.path()).is_supported())
            .filter_map(|entry| relative_path(&self.root, entry.path()))
            .collect();

        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_supported_files_outside_ignored_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/agents")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        fs::write(root.join("src/agents/chat.py"), "def f(): pass\n").unwrap();
        fs::write(root.join("src/index.ts"), "export function g() {}\n").unwrap();
        fs::write(root.join("src/notes.md"), "# notes\n").unwrap();
        fs::write(root.join("node_modules/lib/x.js"), "function h() {}\n").unwrap();

        let files = FileScanner::new(root)
            .with_ignored_dirs(["node_modules"])
            .scan();

        assert_eq!(
            files,
            vec!["src/agents/chat.py".to_string(), "src/index.ts".to_string()]
        );
    }
}
