use crate::{IndexerError, Result};
use async_trait::async_trait;
use flowlens_graph::VisualGraph;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// A full analysis together with the file contents it was computed from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub graph: VisualGraph,
    /// Relative path -> content at analysis time
    pub contents: BTreeMap<String, String>,
}

/// Key/value persistence of analyses across restarts
#[async_trait]
pub trait GraphCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedAnalysis>>;

    async fn set(&self, key: &str, analysis: &CachedAnalysis) -> Result<()>;
}

/// Content hash identifying an analyzed file set.
///
/// SHA-256 over `(path, content)` pairs in path order, so the key does not
/// depend on discovery order.
#[must_use]
pub fn cache_key(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (path, content) in files {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    hex_encode_lower(&hasher.finalize())
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[derive(Debug, Default)]
pub struct MemoryGraphCache {
    entries: RwLock<HashMap<String, CachedAnalysis>>,
}

impl MemoryGraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphCache for MemoryGraphCache {
    async fn get(&self, key: &str) -> Result<Option<CachedAnalysis>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, analysis: &CachedAnalysis) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), analysis.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IndexerError::InvalidPath(format!("invalid cache key: {key}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl GraphCache for JsonFileCache {
    async fn get(&self, key: &str) -> Result<Option<CachedAnalysis>> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn set(&self, key: &str, analysis: &CachedAnalysis) -> Result<()> {
        let path = self.entry_path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec_pretty(analysis)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlens_graph::{create_graph_from_call_graph, FunctionInfo};
    use pretty_assertions::assert_eq;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
            .collect()
    }

    fn analysis() -> CachedAnalysis {
        let call_graph = [FunctionInfo::new("f", 1, 2)].into_iter().collect();
        CachedAnalysis {
            graph: create_graph_from_call_graph(&call_graph, "a.py"),
            contents: files(&[("a.py", "def f():\n    pass\n")]),
        }
    }

    #[test]
    fn key_depends_on_paths_and_contents() {
        let base = cache_key(&files(&[("a.py", "x"), ("b.py", "y")]));

        assert_eq!(base.len(), 64);
        assert_eq!(base, cache_key(&files(&[("b.py", "y"), ("a.py", "x")])));
        assert_ne!(base, cache_key(&files(&[("a.py", "x"), ("b.py", "z")])));
        // Boundaries are part of the hash
        assert_ne!(
            cache_key(&files(&[("a", "bc")])),
            cache_key(&files(&[("ab", "c")]))
        );
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryGraphCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", &analysis()).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(analysis()));
    }

    #[tokio::test]
    async fn json_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = cache_key(&analysis().contents);

        JsonFileCache::new(dir.path().join("cache"))
            .set(&key, &analysis())
            .await
            .unwrap();

        let reopened = JsonFileCache::new(dir.path().join("cache"));
        assert_eq!(reopened.get(&key).await.unwrap(), Some(analysis()));
        assert!(!dir.path().join("cache").join(format!("{key}.json.tmp")).exists());
    }

    #[tokio::test]
    async fn json_cache_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path());

        assert!(cache.get("../outside").await.is_err());
    }
}
