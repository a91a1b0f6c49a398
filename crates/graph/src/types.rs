use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `(caller, callee)` pair as recorded in a call list
pub type CallEdge = (String, String);

/// Node type given to nodes that have not been classified yet
pub const PENDING_NODE_TYPE: &str = "step";

/// Label of edges derived locally, before the classifier has named them
pub const UNRESOLVED_EDGE_LABEL: &str = "calls";

/// One function of a file and the calls made from its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Call expressions in source order, normalized to `[module.]function`
    pub calls: Vec<String>,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            name: name.into(),
            start_line,
            end_line,
            calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_calls<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls = calls.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-file call graph for one revision of the file.
///
/// Function names are unique; inserting a function with an existing name
/// replaces the earlier declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallGraph {
    functions: BTreeMap<String, FunctionInfo>,
}

impl CallGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a function, returning the declaration it replaced (if any)
    pub fn insert(&mut self, function: FunctionInfo) -> Option<FunctionInfo> {
        self.functions.insert(function.name.clone(), function)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Flattened `(caller, call)` pairs of every function
    #[must_use]
    pub fn edges(&self) -> BTreeSet<CallEdge> {
        self.functions
            .values()
            .flat_map(|f| f.calls.iter().map(|c| (f.name.clone(), c.clone())))
            .collect()
    }
}

impl FromIterator<FunctionInfo> for CallGraph {
    fn from_iter<T: IntoIterator<Item = FunctionInfo>>(iter: T) -> Self {
        let mut graph = Self::new();
        for function in iter {
            graph.insert(function);
        }
        graph
    }
}

/// Structural delta between two call-graph snapshots of the same file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphDiff {
    pub added_functions: BTreeSet<String>,
    pub removed_functions: BTreeSet<String>,
    pub modified_functions: BTreeSet<String>,
    pub added_edges: BTreeSet<CallEdge>,
    pub removed_edges: BTreeSet<CallEdge>,
}

/// Where a node (or edge) lives in the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSource {
    pub file: String,
    pub line: usize,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub source: NodeSource,
    #[serde(default)]
    pub is_entry_point: bool,
    #[serde(default)]
    pub is_exit_point: bool,
    /// Set until the classifier supplies `type`/`label` for this node
    #[serde(default)]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Node {
    /// Unclassified node for a function discovered locally
    pub fn pending(id: impl Into<String>, file: &str, function: &FunctionInfo) -> Self {
        Self {
            id: id.into(),
            label: function.name.clone(),
            node_type: PENDING_NODE_TYPE.to_string(),
            source: NodeSource {
                file: file.to_string(),
                line: function.start_line,
                function: function.name.clone(),
            },
            is_entry_point: false,
            is_exit_point: false,
            pending: true,
            description: None,
        }
    }

    #[must_use]
    pub fn belongs_to(&self, file: &str) -> bool {
        self.source.file == file
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<NodeSource>,
}

impl Edge {
    /// Locally derived call edge with the unresolved label
    pub fn unresolved(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: UNRESOLVED_EDGE_LABEL.to_string(),
            data_type: None,
            description: None,
            source_location: None,
        }
    }

    #[must_use]
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// Workflow graph shown by the renderer and persisted by the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Outcome of one local patch against the visual graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub nodes_added: Vec<String>,
    pub nodes_removed: Vec<String>,
    pub nodes_updated: Vec<String>,
    pub edges_added: usize,
    pub edges_removed: usize,
    /// Node ids still waiting for classification
    pub needs_metadata: Vec<String>,
    /// Names of functions whose body or position changed
    pub changed_functions: Vec<String>,
}

impl PatchResult {
    /// No node or edge was added or removed.
    ///
    /// An empty patch never warrants a re-render, even when `nodes_updated`
    /// carries position refreshes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes_added.is_empty()
            && self.nodes_removed.is_empty()
            && self.edges_added == 0
            && self.edges_removed == 0
    }
}

/// Semantic type/label supplied by the classifier for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeClassification {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Function entry of the repository-wide file index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFunction {
    pub name: String,
    pub calls: Vec<String>,
    pub line: usize,
}

/// One import binding: a local symbol and the module specifiers it may refer
/// to, most specific first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    pub specifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndexEntry {
    pub functions: Vec<IndexedFunction>,
    /// `None` when the file declares no explicit export list
    pub exports: Option<BTreeSet<String>>,
    pub imports: Vec<ImportBinding>,
}

impl FileIndexEntry {
    /// Whether a call into `function` of this file may be accepted
    #[must_use]
    pub fn exports_function(&self, function: &str) -> bool {
        self.exports
            .as_ref()
            .map_or(true, |exports| exports.contains(function))
    }
}

/// Relative file path → index entry
pub type RepoFileIndex = BTreeMap<String, FileIndexEntry>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub function: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallTarget {
    pub file: String,
    pub function: String,
    pub module: String,
}

/// Call resolved from one file into a function of another file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrossFileCall {
    pub caller: CallSite,
    pub callee: CallTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_declaration_replaces_earlier() {
        let mut graph = CallGraph::new();
        graph.insert(FunctionInfo::new("f", 1, 2).with_calls(["g"]));
        let replaced = graph.insert(FunctionInfo::new("f", 10, 12).with_calls(["h"]));

        assert_eq!(replaced.map(|f| f.start_line), Some(1));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("f").map(|f| f.calls.clone()), Some(vec!["h".to_string()]));
    }

    #[test]
    fn edges_flatten_call_lists() {
        let graph: CallGraph = [
            FunctionInfo::new("f", 1, 3).with_calls(["g", "a.summarize"]),
            FunctionInfo::new("g", 5, 6),
        ]
        .into_iter()
        .collect();

        let edges = graph.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&("f".to_string(), "a.summarize".to_string())));
    }

    #[test]
    fn node_serializes_with_collaborator_field_names() {
        let node = Node::pending("a.py::f", "a.py", &FunctionInfo::new("f", 3, 9));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "step");
        assert_eq!(json["isEntryPoint"], false);
        assert_eq!(json["pending"], true);
        assert_eq!(json["source"]["line"], 3);
    }

    #[test]
    fn permissive_exports_accept_any_function() {
        let entry = FileIndexEntry::default();
        assert!(entry.exports_function("anything"));

        let entry = FileIndexEntry {
            exports: Some(["summarize".to_string()].into_iter().collect()),
            ..FileIndexEntry::default()
        };
        assert!(entry.exports_function("summarize"));
        assert!(!entry.exports_function("helper"));
    }
}
