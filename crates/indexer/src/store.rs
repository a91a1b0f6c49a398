use crate::batcher::PendingBatch;
use crate::classifier::{ClassificationRequest, FileClassificationInput};
use flowlens_graph::{
    apply_classification, apply_local_update, create_graph_from_call_graph, diff, extract,
    merge_file_graph, relevance, splice_cross_file_edges, try_extract, CallGraph,
    CrossFileResolver, Language, NodeClassification, PatchResult, VisualGraph,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Everything the engine knows about the workspace: the visual graph, the
/// latest call graph and content of each file, and the cross-file index.
///
/// Owned by a single task; nothing here is synchronized.
#[derive(Debug, Default)]
pub struct WorkspaceStore {
    graph: VisualGraph,
    call_graphs: HashMap<String, CallGraph>,
    contents: HashMap<String, String>,
    resolver: CrossFileResolver,
    analyzed: BTreeSet<String>,
}

impl WorkspaceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn graph(&self) -> &VisualGraph {
        &self.graph
    }

    #[must_use]
    pub fn call_graph(&self, relative_path: &str) -> Option<&CallGraph> {
        self.call_graphs.get(relative_path)
    }

    #[must_use]
    pub fn resolver(&self) -> &CrossFileResolver {
        &self.resolver
    }

    #[must_use]
    pub fn is_tracked(&self, relative_path: &str) -> bool {
        self.call_graphs.contains_key(relative_path)
    }

    /// Whether the file took part in the last full analysis, either as input
    /// or as the home of nodes the analysis produced
    #[must_use]
    pub fn was_analyzed(&self, relative_path: &str) -> bool {
        self.analyzed.contains(relative_path)
    }

    #[must_use]
    pub fn tracked_files(&self) -> BTreeSet<String> {
        self.call_graphs.keys().cloned().collect()
    }

    /// Record a file's current content as the baseline for later diffs
    /// without touching the visual graph
    pub fn track_file(&mut self, relative_path: &str, content: &str) {
        let call_graph = extract(content, relative_path);
        self.resolver
            .update_with_call_graph(content, relative_path, &call_graph);
        self.call_graphs.insert(relative_path.to_string(), call_graph);
        self.contents
            .insert(relative_path.to_string(), content.to_string());
    }

    /// Track a batch of files, then resolve calls between them
    pub fn seed<I, P, C>(&mut self, files: I)
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut count = 0usize;
        for (path, content) in files {
            self.track_file(path.as_ref(), content.as_ref());
            count += 1;
        }
        self.resolver.resolve_all();
        log::info!("Seeded {count} file(s)");
    }

    /// Bring the visual graph in line with a new revision of a file.
    ///
    /// `None` means the edit could not be applied locally: the file is
    /// unknown to the graph, or the patch failed. A zero-change patch is
    /// `Some` with an empty [`PatchResult`].
    pub fn local_update(&mut self, relative_path: &str, content: &str) -> Option<PatchResult> {
        let language = Language::from_path(relative_path);
        if !language.is_supported() {
            return None;
        }

        let old_call_graph = self.call_graphs.get(relative_path);
        let has_nodes = self.graph.has_file(relative_path);

        let new_call_graph = match try_extract(content, language) {
            Ok(call_graph) => call_graph,
            Err(err) if old_call_graph.is_some_and(|old| !old.is_empty()) => {
                log::debug!(
                    "Extraction failed for {relative_path}: {err}; keeping previous call graph"
                );
                return Some(PatchResult::default());
            }
            Err(err) => {
                log::debug!("Extraction failed for {relative_path}: {err}");
                CallGraph::new()
            }
        };

        let mut patch = match (old_call_graph, has_nodes) {
            (Some(old), true) => {
                let delta = diff(old, &new_call_graph);
                match apply_local_update(&mut self.graph, &delta, &new_call_graph, relative_path) {
                    Ok(patch) => patch,
                    Err(err) => {
                        log::warn!("Local update of {relative_path} failed: {err}");
                        return None;
                    }
                }
            }
            (None, true) => {
                // Nodes from an analysis we have no baseline for
                return None;
            }
            (_, false) if is_workflow_file(relative_path, content) => {
                let file_graph = create_graph_from_call_graph(&new_call_graph, relative_path);
                merge_file_graph(&mut self.graph, relative_path, file_graph)
            }
            (old, false) => {
                let known = old.is_some();
                self.resolver
                    .update_with_call_graph(content, relative_path, &new_call_graph);
                self.remember(relative_path, content, new_call_graph);
                return known.then(PatchResult::default);
            }
        };

        let affected = self
            .resolver
            .update_with_call_graph(content, relative_path, &new_call_graph);
        self.remember(relative_path, content, new_call_graph);

        let mut files: BTreeSet<String> = affected;
        files.insert(relative_path.to_string());
        for file in &files {
            let (added, removed) =
                splice_cross_file_edges(&mut self.graph, file, self.resolver.calls_from(file));
            patch.edges_added += added;
            patch.edges_removed += removed;
        }

        Some(patch)
    }

    fn remember(&mut self, relative_path: &str, content: &str, call_graph: CallGraph) {
        self.call_graphs.insert(relative_path.to_string(), call_graph);
        self.contents
            .insert(relative_path.to_string(), content.to_string());
    }

    /// Drop a deleted file from every structure
    pub fn remove_file(&mut self, relative_path: &str) -> PatchResult {
        let mut patch = PatchResult::default();
        let (removed, removed_edges) = self.graph.remove_file(relative_path);
        patch.nodes_removed = removed;
        patch.edges_removed = removed_edges;

        self.call_graphs.remove(relative_path);
        self.contents.remove(relative_path);
        self.analyzed.remove(relative_path);

        for caller in self.resolver.remove_file(relative_path) {
            let (added, removed) =
                splice_cross_file_edges(&mut self.graph, &caller, self.resolver.calls_from(&caller));
            patch.edges_added += added;
            patch.edges_removed += removed;
        }

        if !patch.is_empty() {
            self.graph.refresh_pending_endpoints();
        }
        patch
    }

    /// Files worth a full analysis, with their current content
    #[must_use]
    pub fn analysis_files(&self) -> BTreeMap<String, String> {
        self.contents
            .iter()
            .filter(|(path, content)| is_workflow_file(path, content))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect()
    }

    /// Replace the visual graph with a full analysis of `contents`.
    ///
    /// Returns the files whose live content moved on while the analysis ran;
    /// they need another local update.
    pub fn install_analysis(
        &mut self,
        graph: VisualGraph,
        contents: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut stale = Vec::new();
        for (path, analyzed) in contents {
            if let Some(live) = self.contents.get(path) {
                if live != analyzed {
                    stale.push(path.clone());
                }
            }
            let call_graph = extract(analyzed, path);
            self.resolver
                .update_with_call_graph(analyzed, path, &call_graph);
            self.call_graphs.insert(path.clone(), call_graph);
            self.contents.insert(path.clone(), analyzed.clone());
        }

        self.analyzed = contents.keys().cloned().collect();
        self.analyzed
            .extend(graph.files().into_iter().map(str::to_string));
        self.graph = graph;
        log::info!(
            "Installed analysis: {} node(s), {} edge(s) over {} file(s)",
            self.graph.nodes.len(),
            self.graph.edges.len(),
            contents.len()
        );
        stale
    }

    pub fn apply_classification(&mut self, classifications: &[NodeClassification]) -> Vec<String> {
        apply_classification(&mut self.graph, classifications)
    }

    /// Classifier request for the still-pending nodes of a batch
    #[must_use]
    pub fn classification_request(&self, batch: &PendingBatch) -> ClassificationRequest {
        let mut request = ClassificationRequest::default();
        for (path, ids) in batch {
            let (Some(call_graph), Some(content)) =
                (self.call_graphs.get(path), self.contents.get(path))
            else {
                continue;
            };

            let mut node_ids = Vec::new();
            let mut functions = Vec::new();
            for id in ids {
                if let Some(node) = self.graph.node(id).filter(|n| n.pending) {
                    node_ids.push(node.id.clone());
                    functions.push(node.source.function.clone());
                }
            }
            if node_ids.is_empty() {
                continue;
            }

            request.files.insert(
                path.clone(),
                FileClassificationInput {
                    node_ids,
                    functions,
                    call_graph: call_graph.clone(),
                    content: content.clone(),
                },
            );
        }
        request
    }

    /// Pending node ids grouped by file
    #[must_use]
    pub fn pending_by_file(&self) -> PendingBatch {
        let mut batch = PendingBatch::new();
        for node in self.graph.nodes.iter().filter(|n| n.pending) {
            batch
                .entry(node.source.file.clone())
                .or_default()
                .insert(node.id.clone());
        }
        batch
    }
}

fn is_workflow_file(relative_path: &str, content: &str) -> bool {
    relevance::should_analyze_file(relative_path) && relevance::detect_workflow(content)
}
