use crate::batcher::{ClassificationBatcher, PendingBatch};
use crate::cache::{cache_key, CachedAnalysis, GraphCache};
use crate::classifier::{Classifier, ClassificationResponse, FullAnalysisRequest};
use crate::config::SchedulerConfig;
use crate::source::FileSource;
use crate::store::WorkspaceStore;
use crate::timers::DeadlineMap;
use crate::{IndexerError, Result};
use flowlens_graph::{PatchResult, VisualGraph};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

/// File change reported by the editor or the file watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// `/`-separated path relative to the workspace root
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn create(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Create)
    }

    pub fn modify(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Modify)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Delete)
    }
}

/// Transient edit highlight of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEditState {
    Unchanged,
    Changed,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStateChange {
    pub path: String,
    pub state: FileEditState,
    /// Functions touched by the edits behind this state
    pub functions: Vec<String>,
}

/// Notifications for the rendering surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    GraphPatched {
        path: String,
        patch: PatchResult,
        graph: VisualGraph,
    },
    FileState(FileStateChange),
    #[serde(rename_all = "camelCase")]
    AnalysisStarted { reason: String, files: usize },
    #[serde(rename_all = "camelCase")]
    AnalysisCompleted {
        nodes: usize,
        edges: usize,
        from_cache: bool,
    },
    #[serde(rename_all = "camelCase")]
    AnalysisFailed { reason: String, error: String },
    #[serde(rename_all = "camelCase")]
    NodesClassified { ids: Vec<String> },
}

enum SchedulerCommand {
    Change(ChangeEvent),
    FullAnalysis { reason: String },
    Shutdown,
}

/// Results of spawned classifier work, posted back to the loop
enum WorkResult {
    Classified(Result<ClassificationResponse>),
    Analyzed {
        reason: String,
        contents: BTreeMap<String, String>,
        outcome: Result<(VisualGraph, bool)>,
    },
}

/// Handle to the engine loop.
///
/// Clones share the loop; it stops once the last handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct ChangeScheduler {
    inner: Arc<ChangeSchedulerInner>,
}

struct ChangeSchedulerInner {
    command_tx: mpsc::Sender<SchedulerCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    graph_rx: watch::Receiver<VisualGraph>,
}

impl ChangeScheduler {
    /// Spawn the engine loop on the current tokio runtime
    pub fn start(
        store: WorkspaceStore,
        classifier: Arc<dyn Classifier>,
        cache: Arc<dyn GraphCache>,
        source: Arc<dyn FileSource>,
        config: SchedulerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (work_tx, work_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);
        let (graph_tx, graph_rx) = watch::channel(store.graph().clone());

        let engine = EngineLoop {
            batcher: ClassificationBatcher::new(config.classification_window),
            store,
            classifier,
            cache,
            source,
            config,
            debounce: DeadlineMap::new(),
            editing: DeadlineMap::new(),
            activity: HashMap::new(),
            analysis_running: false,
            analysis_queued: None,
            work_tx,
            event_tx: event_tx.clone(),
            graph_tx,
        };
        tokio::spawn(engine.run(command_rx, work_rx));

        Self {
            inner: Arc::new(ChangeSchedulerInner {
                command_tx,
                event_tx,
                graph_rx,
            }),
        }
    }

    pub async fn notify(&self, event: ChangeEvent) -> Result<()> {
        self.send(SchedulerCommand::Change(event)).await
    }

    pub async fn trigger_full_analysis(&self, reason: impl Into<String>) -> Result<()> {
        self.send(SchedulerCommand::FullAnalysis {
            reason: reason.into(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SchedulerCommand::Shutdown).await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Current visual graph
    #[must_use]
    pub fn snapshot(&self) -> VisualGraph {
        self.inner.graph_rx.borrow().clone()
    }

    #[must_use]
    pub fn graph_stream(&self) -> watch::Receiver<VisualGraph> {
        self.inner.graph_rx.clone()
    }

    async fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| IndexerError::Other("scheduler loop has stopped".to_string()))
    }
}

impl Drop for ChangeScheduler {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(SchedulerCommand::Shutdown);
        }
    }
}

#[derive(Debug, Clone)]
struct FileActivity {
    state: FileEditState,
    functions: Vec<String>,
}

/// State owned by the engine task
struct EngineLoop {
    store: WorkspaceStore,
    classifier: Arc<dyn Classifier>,
    cache: Arc<dyn GraphCache>,
    source: Arc<dyn FileSource>,
    config: SchedulerConfig,
    debounce: DeadlineMap<String>,
    editing: DeadlineMap<String>,
    activity: HashMap<String, FileActivity>,
    batcher: ClassificationBatcher,
    analysis_running: bool,
    analysis_queued: Option<String>,
    work_tx: mpsc::Sender<WorkResult>,
    event_tx: broadcast::Sender<EngineEvent>,
    graph_tx: watch::Sender<VisualGraph>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        mut work_rx: mpsc::Receiver<WorkResult>,
    ) {
        info!("Change scheduler started");
        loop {
            let next_deadline = self.next_deadline();

            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(SchedulerCommand::Change(event)) => self.on_change(event),
                    Some(SchedulerCommand::FullAnalysis { reason }) => self.start_analysis(reason),
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
                Some(result) = work_rx.recv() => self.on_work_result(result),
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => self.on_deadline(Instant::now()),
            }
        }
        info!("Change scheduler stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.debounce.next(),
            self.editing.next(),
            self.batcher.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }

    fn publish_graph(&self) {
        let _ = self.graph_tx.send(self.store.graph().clone());
    }

    fn on_change(&mut self, event: ChangeEvent) {
        let now = Instant::now();
        match event.kind {
            ChangeKind::Delete => self.remove_file(&event.path),
            ChangeKind::Create => {
                self.debounce
                    .schedule(event.path, now + self.config.create_debounce);
            }
            ChangeKind::Modify => {
                self.debounce
                    .schedule(event.path, now + self.config.modify_debounce);
            }
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        for path in self.debounce.pop_expired(now) {
            self.process_change(&path, now);
        }

        for path in self.editing.pop_expired(now) {
            self.set_state(&path, FileEditState::Changed, Vec::new());
        }

        if let Some(batch) = self.batcher.take_due(now) {
            self.flush_classification(&batch);
        }
    }

    fn process_change(&mut self, path: &str, now: Instant) {
        let content = match self.source.read(path) {
            Ok(content) => content,
            Err(err) => {
                debug!("Skipping {path}: {err}");
                return;
            }
        };

        match self.store.local_update(path, &content) {
            Some(patch) if patch.is_empty() => {
                debug!("No structural change in {path}");
                self.publish_graph();
            }
            Some(patch) => {
                let mut functions = patch.changed_functions.clone();
                functions.extend(
                    patch
                        .nodes_added
                        .iter()
                        .filter_map(|id| self.store.graph().node(id))
                        .map(|node| node.source.function.clone()),
                );

                self.batcher
                    .enqueue(path, patch.needs_metadata.iter().cloned(), now);
                self.publish_graph();
                self.emit(EngineEvent::GraphPatched {
                    path: path.to_string(),
                    patch,
                    graph: self.store.graph().clone(),
                });
                self.set_state(path, FileEditState::Active, functions);
                self.editing
                    .schedule(path.to_string(), now + self.config.editing_inactivity);
            }
            None if self.store.was_analyzed(path) => {
                info!("Cannot patch {path} locally; falling back to full analysis");
                self.editing.cancel(&path.to_string());
                self.activity.remove(path);
                self.start_analysis(format!("fallback:{path}"));
            }
            None => debug!("Ignoring change to {path}: not part of the graph"),
        }
    }

    fn remove_file(&mut self, path: &str) {
        let key = path.to_string();
        self.debounce.cancel(&key);
        self.editing.cancel(&key);
        self.activity.remove(path);
        self.batcher.forget_file(path);

        let patch = self.store.remove_file(path);
        if patch.is_empty() {
            return;
        }
        self.publish_graph();
        self.emit(EngineEvent::GraphPatched {
            path: key,
            patch,
            graph: self.store.graph().clone(),
        });
    }

    /// Functions accumulate until the next full analysis clears the entry
    fn set_state(&mut self, path: &str, state: FileEditState, functions: Vec<String>) {
        let activity = self
            .activity
            .entry(path.to_string())
            .or_insert_with(|| FileActivity {
                state,
                functions: Vec::new(),
            });
        activity.state = state;
        for function in functions {
            if !activity.functions.contains(&function) {
                activity.functions.push(function);
            }
        }
        let functions = activity.functions.clone();
        self.emit(EngineEvent::FileState(FileStateChange {
            path: path.to_string(),
            state,
            functions,
        }));
    }

    fn start_analysis(&mut self, reason: String) {
        if self.analysis_running {
            debug!("Analysis already running; queueing {reason}");
            self.analysis_queued = Some(reason);
            return;
        }

        let files = self.store.analysis_files();
        if files.is_empty() {
            info!("No workflow files to analyze ({reason})");
            return;
        }

        info!("Full analysis of {} file(s): {reason}", files.len());
        self.analysis_running = true;
        self.emit(EngineEvent::AnalysisStarted {
            reason: reason.clone(),
            files: files.len(),
        });

        let classifier = self.classifier.clone();
        let cache = self.cache.clone();
        let work_tx = self.work_tx.clone();
        tokio::spawn(async move {
            let outcome = run_analysis(classifier.as_ref(), cache.as_ref(), &files).await;
            let _ = work_tx
                .send(WorkResult::Analyzed {
                    reason,
                    contents: files,
                    outcome,
                })
                .await;
        });
    }

    fn flush_classification(&mut self, batch: &PendingBatch) {
        let request = self.store.classification_request(batch);
        if request.is_empty() {
            return;
        }
        debug!(
            "Classifying {} node(s) in {} file(s)",
            request.node_count(),
            request.files.len()
        );

        let classifier = self.classifier.clone();
        let work_tx = self.work_tx.clone();
        tokio::spawn(async move {
            let result = classifier.classify(request).await;
            let _ = work_tx.send(WorkResult::Classified(result)).await;
        });
    }

    fn on_work_result(&mut self, result: WorkResult) {
        match result {
            WorkResult::Classified(Ok(response)) => {
                let ids = self.store.apply_classification(&response.nodes);
                if ids.is_empty() {
                    return;
                }
                self.publish_graph();
                self.emit(EngineEvent::NodesClassified { ids });
            }
            WorkResult::Classified(Err(err)) => {
                warn!("Classification failed, nodes stay pending: {err}");
            }
            WorkResult::Analyzed {
                reason,
                contents,
                outcome,
            } => {
                self.analysis_running = false;
                match outcome {
                    Ok((graph, from_cache)) => self.finish_analysis(graph, &contents, from_cache),
                    Err(err) => {
                        warn!("Full analysis failed ({reason}): {err}");
                        self.emit(EngineEvent::AnalysisFailed {
                            reason,
                            error: err.to_string(),
                        });
                    }
                }
                if let Some(queued) = self.analysis_queued.take() {
                    self.start_analysis(queued);
                }
            }
        }
    }

    fn finish_analysis(
        &mut self,
        graph: VisualGraph,
        contents: &BTreeMap<String, String>,
        from_cache: bool,
    ) {
        let now = Instant::now();
        let stale = self.store.install_analysis(graph, contents);

        let (nodes, edges) = self.store.graph().stats();
        self.publish_graph();
        self.emit(EngineEvent::AnalysisCompleted {
            nodes,
            edges,
            from_cache,
        });

        let touched: Vec<String> = self
            .activity
            .iter()
            .filter(|(_, a)| a.state != FileEditState::Unchanged)
            .map(|(path, _)| path.clone())
            .collect();
        self.activity.clear();
        self.editing = DeadlineMap::new();
        for path in touched {
            self.emit(EngineEvent::FileState(FileStateChange {
                path,
                state: FileEditState::Unchanged,
                functions: Vec::new(),
            }));
        }

        for path in stale {
            debug!("{path} changed during analysis; re-applying");
            self.debounce.schedule(path, now);
        }

        for (path, ids) in self.store.pending_by_file() {
            self.batcher.enqueue(&path, ids, now);
        }
    }
}

/// Serve an analysis from the cache, or ask the classifier and cache it
async fn run_analysis(
    classifier: &dyn Classifier,
    cache: &dyn GraphCache,
    files: &BTreeMap<String, String>,
) -> Result<(VisualGraph, bool)> {
    let key = cache_key(files);
    match cache.get(&key).await {
        Ok(Some(hit)) if hit.contents == *files => {
            debug!("Analysis cache hit {key}");
            return Ok((hit.graph, true));
        }
        Ok(_) => {}
        Err(err) => warn!("Analysis cache read failed: {err}"),
    }

    let graph = classifier
        .analyze(FullAnalysisRequest::new(files.clone()))
        .await?;

    let entry = CachedAnalysis {
        graph,
        contents: files.clone(),
    };
    if let Err(err) = cache.set(&key, &entry).await {
        warn!("Analysis cache write failed: {err}");
    }
    Ok((entry.graph, false))
}
