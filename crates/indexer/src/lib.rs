//! # Flowlens Indexer
//!
//! Keeps the visual workflow graph in step with an edited workspace.
//!
//! ## Pipeline
//!
//! ```text
//! Editor / file watcher
//!     │  ChangeEvent (create / modify / delete)
//!     ▼
//! ChangeScheduler ── debounce per file
//!     │
//!     ├──> WorkspaceStore::local_update
//!     │      extract → diff → patch → cross-file splice
//!     │
//!     ├──> ClassificationBatcher ──> Classifier::classify
//!     │      pending nodes, one request per window
//!     │
//!     └──> full analysis fallback ──> GraphCache / Classifier::analyze
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use flowlens_indexer::{
//!     ChangeEvent, ChangeScheduler, EngineConfig, FsFileSource, MemoryGraphCache,
//!     NullClassifier, WorkspaceStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> flowlens_indexer::Result<()> {
//!     let config = EngineConfig::default();
//!     let scheduler = ChangeScheduler::start(
//!         WorkspaceStore::new(),
//!         Arc::new(NullClassifier),
//!         Arc::new(MemoryGraphCache::new()),
//!         Arc::new(FsFileSource::new("/path/to/project")),
//!         config.scheduler_config(),
//!     );
//!
//!     let mut events = scheduler.subscribe();
//!     scheduler.notify(ChangeEvent::modify("agents/chat.py")).await?;
//!     if let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod batcher;
mod cache;
mod classifier;
mod config;
mod error;
mod scanner;
mod scheduler;
mod source;
mod store;
mod timers;
mod watcher;

pub use batcher::{ClassificationBatcher, PendingBatch};
pub use cache::{cache_key, CachedAnalysis, GraphCache, JsonFileCache, MemoryGraphCache};
pub use classifier::{
    local_analysis, parse_classifier_json, ClassificationRequest, ClassificationResponse,
    Classifier, FileClassificationInput, FullAnalysisRequest, NullClassifier,
};
pub use config::{EngineConfig, SchedulerConfig, CONFIG_FILE_NAME};
pub use error::{IndexerError, Result};
pub use scanner::FileScanner;
pub use scheduler::{
    ChangeEvent, ChangeKind, ChangeScheduler, EngineEvent, FileEditState, FileStateChange,
};
pub use source::{relative_path, FileSource, FsFileSource, MemoryFileSource};
pub use store::WorkspaceStore;
pub use timers::DeadlineMap;
pub use watcher::WorkspaceWatcher;
