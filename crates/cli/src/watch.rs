use anyhow::{Context, Result};
use flowlens_indexer::{
    ChangeScheduler, EngineConfig, FileScanner, FileSource, FsFileSource, JsonFileCache,
    NullClassifier, WorkspaceStore, WorkspaceWatcher,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Seed, analyse and watch `root` until Ctrl-C
pub async fn run(root: &Path, config_path: Option<&Path>) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Workspace root {} not found", root.display()))?;
    let config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::discover(&root)?,
    };

    let source = Arc::new(FsFileSource::new(&root));
    let files = FileScanner::new(&root)
        .with_ignored_dirs(config.ignored_dirs.clone())
        .scan();
    let mut store = WorkspaceStore::new();
    store.seed(files.iter().filter_map(|path| match source.read(path) {
        Ok(content) => Some((path.clone(), content)),
        Err(err) => {
            log::warn!("Skipping {path}: {err}");
            None
        }
    }));

    let scheduler = ChangeScheduler::start(
        store,
        Arc::new(NullClassifier),
        Arc::new(JsonFileCache::new(config.cache_path(&root))),
        source,
        config.scheduler_config(),
    );
    let mut events = scheduler.subscribe();
    let _watcher = WorkspaceWatcher::start(&root, config.ignored_dirs.clone(), scheduler.clone())?;
    scheduler.trigger_full_analysis("startup").await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; stopping");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Output fell behind; {skipped} event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = scheduler.shutdown().await;
    Ok(())
}
