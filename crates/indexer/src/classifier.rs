use crate::{IndexerError, Result};
use async_trait::async_trait;
use flowlens_graph::{
    create_graph_from_call_graph, extract, merge_file_graph, relevance, splice_cross_file_edges,
    CallGraph, CrossFileResolver, NodeClassification, VisualGraph,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the classifier needs to know about one file with pending nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileClassificationInput {
    /// Ids of the pending nodes to classify
    pub node_ids: Vec<String>,
    /// Function names behind `node_ids`
    pub functions: Vec<String>,
    pub call_graph: CallGraph,
    pub content: String,
}

/// Batched request keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub files: BTreeMap<String, FileClassificationInput>,
}

impl ClassificationRequest {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.files.values().map(|f| f.node_ids.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub nodes: Vec<NodeClassification>,
}

/// Request for a from-scratch analysis of the workflow files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullAnalysisRequest {
    /// Relative path -> content
    pub files: BTreeMap<String, String>,
    /// Framework or client library detected in the files, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

impl FullAnalysisRequest {
    /// Request for `files` with the framework hint derived from their content
    #[must_use]
    pub fn new(files: BTreeMap<String, String>) -> Self {
        let framework = files
            .values()
            .find_map(|content| relevance::detect_framework(content))
            .map(str::to_string);
        Self { files, framework }
    }
}

/// External semantic classifier (typically an LLM behind an HTTP API)
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Type and label for pending nodes
    async fn classify(&self, request: ClassificationRequest) -> Result<ClassificationResponse>;

    /// Complete workflow graph for a set of files
    async fn analyze(&self, request: FullAnalysisRequest) -> Result<VisualGraph>;
}

/// Parse a classifier reply that may be wrapped in a markdown code fence
pub fn parse_classifier_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    serde_json::from_str(text.trim())
        .map_err(|e| IndexerError::ClassifierError(format!("malformed classifier reply: {e}")))
}

/// Classifier that never names anything.
///
/// `classify` leaves every node pending; `analyze` builds the graph from
/// local extraction alone, so the engine can run without a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

#[async_trait]
impl Classifier for NullClassifier {
    async fn classify(&self, request: ClassificationRequest) -> Result<ClassificationResponse> {
        log::debug!(
            "No classifier configured; {} node(s) in {} file(s) stay pending",
            request.node_count(),
            request.files.len()
        );
        Ok(ClassificationResponse::default())
    }

    async fn analyze(&self, request: FullAnalysisRequest) -> Result<VisualGraph> {
        Ok(local_analysis(&request.files))
    }
}

/// Workflow graph built purely from extraction and cross-file resolution
#[must_use]
pub fn local_analysis(files: &BTreeMap<String, String>) -> VisualGraph {
    let mut graph = VisualGraph::new();
    let mut resolver = CrossFileResolver::new();

    for (path, content) in files {
        let call_graph = extract(content, path);
        resolver.update_with_call_graph(content, path, &call_graph);
        merge_file_graph(&mut graph, path, create_graph_from_call_graph(&call_graph, path));
    }
    for path in files.keys() {
        splice_cross_file_edges(&mut graph, path, resolver.calls_from(path));
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fenced_and_bare_replies() {
        let bare = r#"{"nodes": [{"id": "a.py::f", "type": "llm", "label": "Summarize"}]}"#;
        let fenced = format!("```json\n{bare}\n```");
        let plain_fence = format!("```\n{bare}\n```  ");

        let expected: ClassificationResponse = parse_classifier_json(bare).unwrap();
        assert_eq!(expected.nodes.len(), 1);
        assert_eq!(expected.nodes[0].node_type, "llm");
        assert_eq!(parse_classifier_json::<ClassificationResponse>(&fenced).unwrap(), expected);
        assert_eq!(
            parse_classifier_json::<ClassificationResponse>(&plain_fence).unwrap(),
            expected
        );
    }

    #[test]
    fn malformed_reply_is_a_classifier_error() {
        let result = parse_classifier_json::<ClassificationResponse>("```json\nnot json\n```");
        assert!(matches!(result, Err(IndexerError::ClassifierError(_))));
    }

    #[test]
    fn full_analysis_request_carries_framework_hint() {
        let files: BTreeMap<String, String> = [
            ("util.py".to_string(), "def f(): pass\n".to_string()),
            (
                "agent.py".to_string(),
                "from langgraph.graph import StateGraph\n".to_string(),
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            FullAnalysisRequest::new(files).framework.as_deref(),
            Some("langgraph")
        );
    }

    #[tokio::test]
    async fn null_classifier_builds_pending_graph() {
        let files: BTreeMap<String, String> = [
            ("a.py".to_string(), "def summarize(t):\n    return t\n".to_string()),
            (
                "b.py".to_string(),
                "import a\n\ndef main(x):\n    return a.summarize(x)\n".to_string(),
            ),
        ]
        .into_iter()
        .collect();

        let graph = NullClassifier
            .analyze(FullAnalysisRequest::new(files))
            .await
            .unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes.iter().all(|n| n.pending));
        assert!(graph.has_edge("b.py::main", "a.py::summarize"));

        let response = NullClassifier
            .classify(ClassificationRequest::default())
            .await
            .unwrap();
        assert!(response.nodes.is_empty());
    }
}
