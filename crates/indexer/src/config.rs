use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional config file at the workspace root
pub const CONFIG_FILE_NAME: &str = "flowlens.toml";

/// Engine settings as written in `flowlens.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub modify_debounce_ms: u64,
    pub create_debounce_ms: u64,
    /// Quiet period after which an actively edited file is shown as changed
    pub editing_inactivity_ms: u64,
    /// Window in which pending nodes are gathered into one classifier request
    pub classification_window_ms: u64,
    /// Directory names never scanned or watched
    pub ignored_dirs: Vec<String>,
    /// Analysis cache location, relative to the workspace root
    pub cache_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            modify_debounce_ms: 1000,
            create_debounce_ms: 250,
            editing_inactivity_ms: 3000,
            classification_window_ms: 2000,
            ignored_dirs: [
                ".git",
                "node_modules",
                "target",
                "dist",
                "build",
                "__pycache__",
                ".venv",
                ".flowlens",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            cache_dir: PathBuf::from(".flowlens/cache"),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// `flowlens.toml` under `root` when present, defaults otherwise
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            modify_debounce: Duration::from_millis(self.modify_debounce_ms),
            create_debounce: Duration::from_millis(self.create_debounce_ms),
            editing_inactivity: Duration::from_millis(self.editing_inactivity_ms),
            classification_window: Duration::from_millis(self.classification_window_ms),
        }
    }

    #[must_use]
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        root.join(&self.cache_dir)
    }
}

/// Timing policy of the change scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub modify_debounce: Duration,
    pub create_debounce: Duration,
    pub editing_inactivity: Duration,
    pub classification_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        EngineConfig::default().scheduler_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str("modify_debounce_ms = 400\n").unwrap();

        assert_eq!(config.modify_debounce_ms, 400);
        assert_eq!(config.create_debounce_ms, 250);
        assert!(config.ignored_dirs.iter().any(|d| d == "node_modules"));
    }

    #[test]
    fn converts_to_durations() {
        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.modify_debounce, Duration::from_secs(1));
        assert!(scheduler.create_debounce < scheduler.modify_debounce);
        assert_eq!(scheduler.editing_inactivity, Duration::from_secs(3));
    }

    #[test]
    fn discover_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EngineConfig::discover(dir.path()).unwrap(), EngineConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "cache_dir = \"tmp/cache\"\n").unwrap();
        let config = EngineConfig::discover(dir.path()).unwrap();
        assert_eq!(config.cache_path(dir.path()), dir.path().join("tmp/cache"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(EngineConfig::from_toml_str("modify_debounce_ms = \"soon\"").is_err());
    }
}
