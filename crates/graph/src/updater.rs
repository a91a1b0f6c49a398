use crate::error::{GraphError, Result};
use crate::extract::split_call;
use crate::types::{
    CallGraph, CallGraphDiff, CrossFileCall, Edge, Node, NodeClassification, PatchResult,
    VisualGraph, UNRESOLVED_EDGE_LABEL,
};
use std::collections::BTreeSet;

/// Callee name if `call` targets a function of the same file
fn local_callee<'a>(caller: &str, call: &'a str, call_graph: &CallGraph) -> Option<&'a str> {
    match split_call(call) {
        (None, name) if name != caller && call_graph.contains(name) => Some(name),
        _ => None,
    }
}

/// Apply a call-graph diff of `relative_path` to the visual graph.
///
/// The patch is built on a working copy and committed only when every step
/// succeeds, so an error leaves `graph` untouched and the caller can fall
/// back to a full analysis.
pub fn apply_local_update(
    graph: &mut VisualGraph,
    diff: &CallGraphDiff,
    new_call_graph: &CallGraph,
    relative_path: &str,
) -> Result<PatchResult> {
    let mut working = graph.clone();
    let mut patch = PatchResult::default();

    for name in &diff.removed_functions {
        if let Some(id) = working.function_node_id(relative_path, name) {
            patch.edges_removed += working.remove_node(&id);
            patch.nodes_removed.push(id);
        }
    }

    for name in &diff.added_functions {
        let info = new_call_graph
            .get(name)
            .ok_or_else(|| GraphError::inconsistent_diff(relative_path, name))?;

        if let Some(node) = working.function_node_mut(relative_path, name) {
            // Already shown (e.g. by an analysis that raced this edit)
            node.source.line = info.start_line;
            patch.nodes_updated.push(node.id.clone());
            continue;
        }

        let id = working.allocate_node_id(relative_path, name, info.start_line);
        working.nodes.push(Node::pending(id.clone(), relative_path, info));
        patch.nodes_added.push(id.clone());
        patch.needs_metadata.push(id);
    }

    for name in &diff.modified_functions {
        let info = new_call_graph
            .get(name)
            .ok_or_else(|| GraphError::inconsistent_diff(relative_path, name))?;

        if let Some(node) = working.function_node_mut(relative_path, name) {
            node.source.line = info.start_line;
            patch.nodes_updated.push(node.id.clone());
        }
        patch.changed_functions.push(name.clone());
    }

    for (caller, call) in &diff.removed_edges {
        let (None, callee) = split_call(call) else {
            continue;
        };
        let (Some(source), Some(target)) = (
            working.function_node_id(relative_path, caller),
            working.function_node_id(relative_path, callee),
        ) else {
            continue;
        };
        patch.edges_removed += working.remove_edge(&source, &target);
    }

    for (caller, call) in &diff.added_edges {
        let Some(callee) = local_callee(caller, call, new_call_graph) else {
            continue;
        };
        let (Some(source), Some(target)) = (
            working.function_node_id(relative_path, caller),
            working.function_node_id(relative_path, callee),
        ) else {
            continue;
        };
        if working.add_edge(Edge::unresolved(source, target)) {
            patch.edges_added += 1;
        }
    }

    // Calls that predate their callee's definition are in both snapshots,
    // so they never show up in added_edges
    for name in &diff.added_functions {
        let Some(target) = working.function_node_id(relative_path, name) else {
            continue;
        };
        for caller in new_call_graph.functions() {
            let calls_it = caller
                .calls
                .iter()
                .any(|call| local_callee(&caller.name, call, new_call_graph) == Some(name.as_str()));
            if !calls_it {
                continue;
            }
            let Some(source) = working.function_node_id(relative_path, &caller.name) else {
                continue;
            };
            if working.add_edge(Edge::unresolved(source, target.clone())) {
                patch.edges_added += 1;
            }
        }
    }

    if !patch.is_empty() {
        working.refresh_pending_endpoints();
    }

    log::debug!(
        "Local patch for {relative_path}: +{} -{} ~{} nodes, +{} -{} edges",
        patch.nodes_added.len(),
        patch.nodes_removed.len(),
        patch.nodes_updated.len(),
        patch.edges_added,
        patch.edges_removed
    );

    *graph = working;
    Ok(patch)
}

/// Visual graph for a file seen for the first time: every function becomes a
/// pending node and every intra-file call an unresolved edge
#[must_use]
pub fn create_graph_from_call_graph(call_graph: &CallGraph, relative_path: &str) -> VisualGraph {
    let mut graph = VisualGraph::new();

    for function in call_graph.functions() {
        let id = graph.allocate_node_id(relative_path, &function.name, function.start_line);
        graph.nodes.push(Node::pending(id, relative_path, function));
    }

    for function in call_graph.functions() {
        for call in &function.calls {
            let Some(callee) = local_callee(&function.name, call, call_graph) else {
                continue;
            };
            if let (Some(source), Some(target)) = (
                graph.function_node_id(relative_path, &function.name),
                graph.function_node_id(relative_path, callee),
            ) {
                graph.add_edge(Edge::unresolved(source, target));
            }
        }
    }

    graph.refresh_pending_endpoints();
    graph
}

/// Splice a freshly created file graph into the workspace graph, replacing
/// whatever that file contributed before
pub fn merge_file_graph(
    graph: &mut VisualGraph,
    relative_path: &str,
    file_graph: VisualGraph,
) -> PatchResult {
    let mut patch = PatchResult::default();

    let (removed, removed_edges) = graph.remove_file(relative_path);
    patch.nodes_removed = removed;
    patch.edges_removed = removed_edges;

    for node in file_graph.nodes {
        if node.pending {
            patch.needs_metadata.push(node.id.clone());
        }
        patch.nodes_added.push(node.id.clone());
        graph.nodes.push(node);
    }
    for edge in file_graph.edges {
        if graph.add_edge(edge) {
            patch.edges_added += 1;
        }
    }

    patch
}

/// Replace the locally derived cross-file edges leaving `relative_path` with
/// the ones implied by `calls`. Edges are only drawn between existing nodes;
/// edges the classifier labelled are left alone.
///
/// Returns `(added, removed)` edge counts.
pub fn splice_cross_file_edges<'a, I>(
    graph: &mut VisualGraph,
    relative_path: &str,
    calls: I,
) -> (usize, usize)
where
    I: IntoIterator<Item = &'a CrossFileCall>,
{
    let mut desired: BTreeSet<(String, String)> = BTreeSet::new();
    for call in calls {
        if call.caller.file != relative_path {
            continue;
        }
        let source = graph.function_node_id(relative_path, &call.caller.function);
        let target = graph.function_node_id(&call.callee.file, &call.callee.function);
        if let (Some(source), Some(target)) = (source, target) {
            desired.insert((source, target));
        }
    }

    let file_ids: BTreeSet<String> = graph.file_nodes(relative_path).map(|n| n.id.clone()).collect();
    let before = graph.edges.len();
    graph.edges.retain(|edge| {
        let outgoing_cross_file = file_ids.contains(&edge.source) && !file_ids.contains(&edge.target);
        !outgoing_cross_file
            || edge.label != UNRESOLVED_EDGE_LABEL
            || desired.contains(&(edge.source.clone(), edge.target.clone()))
    });
    let removed = before - graph.edges.len();

    let mut added = 0;
    for (source, target) in desired {
        if graph.add_edge(Edge::unresolved(source, target)) {
            added += 1;
        }
    }

    if added > 0 || removed > 0 {
        graph.refresh_pending_endpoints();
    }

    (added, removed)
}

/// Hydrate pending nodes from a classifier response.
///
/// Only nodes that are still pending and named in the response change;
/// returns the ids that were classified.
pub fn apply_classification(
    graph: &mut VisualGraph,
    classifications: &[NodeClassification],
) -> Vec<String> {
    let mut classified = Vec::new();
    for entry in classifications {
        let Some(node) = graph.node_mut(&entry.id) else {
            log::debug!("Classification for unknown node {}", entry.id);
            continue;
        };
        if !node.pending {
            continue;
        }
        node.node_type = entry.node_type.clone();
        node.label = entry.label.clone();
        if entry.description.is_some() {
            node.description = entry.description.clone();
        }
        node.pending = false;
        classified.push(entry.id.clone());
    }
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::types::{CallSite, CallTarget, FunctionInfo};
    use pretty_assertions::assert_eq;

    fn call_graph(functions: &[(&str, usize, &[&str])]) -> CallGraph {
        functions
            .iter()
            .map(|(name, line, calls)| {
                FunctionInfo::new(*name, *line, line + 1).with_calls(calls.iter().copied())
            })
            .collect()
    }

    fn classified(graph: &mut VisualGraph) {
        for node in &mut graph.nodes {
            node.pending = false;
            node.node_type = "llm".to_string();
        }
    }

    #[test]
    fn renamed_call_updates_node_and_swaps_edge() {
        let old = call_graph(&[("f", 1, &["g"]), ("g", 4, &[]), ("h", 7, &[])]);
        let new = call_graph(&[("f", 1, &["h"]), ("g", 4, &[]), ("h", 7, &[])]);
        let mut graph = create_graph_from_call_graph(&old, "a.py");
        classified(&mut graph);

        let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "a.py").unwrap();

        assert_eq!(patch.nodes_updated, vec!["a.py::f".to_string()]);
        assert_eq!(patch.edges_added, 1);
        assert_eq!(patch.edges_removed, 1);
        assert!(patch.nodes_added.is_empty());
        assert_eq!(patch.changed_functions, vec!["f".to_string()]);
        assert!(graph.has_edge("a.py::f", "a.py::h"));
        assert!(!graph.has_edge("a.py::f", "a.py::g"));
        assert!(!graph.node("a.py::f").unwrap().pending);
    }

    #[test]
    fn removed_function_takes_every_touching_edge() {
        let old = call_graph(&[("f", 1, &["g"]), ("g", 4, &[]), ("h", 7, &["f"])]);
        let new = call_graph(&[("g", 4, &[]), ("h", 7, &[])]);
        let mut graph = create_graph_from_call_graph(&old, "a.py");

        let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "a.py").unwrap();

        assert_eq!(patch.nodes_removed, vec!["a.py::f".to_string()]);
        assert_eq!(patch.edges_removed, 2);
        assert!(graph.edges.iter().all(|e| !e.touches("a.py::f")));
    }

    #[test]
    fn added_function_is_pending_and_linked() {
        let old = call_graph(&[("f", 1, &[])]);
        let new = call_graph(&[("f", 1, &["g", "a.summarize"]), ("g", 4, &[])]);
        let mut graph = create_graph_from_call_graph(&old, "a.py");
        classified(&mut graph);

        let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "a.py").unwrap();

        assert_eq!(patch.nodes_added, vec!["a.py::g".to_string()]);
        assert_eq!(patch.needs_metadata, vec!["a.py::g".to_string()]);
        // `a.summarize` is left for the cross-file resolver
        assert_eq!(patch.edges_added, 1);
        assert!(graph.node("a.py::g").unwrap().pending);
    }

    #[test]
    fn unchanged_snapshot_yields_empty_patch() {
        let cg = call_graph(&[("f", 1, &["g"]), ("g", 4, &[])]);
        let mut graph = create_graph_from_call_graph(&cg, "a.py");
        let before = graph.clone();

        let patch = apply_local_update(&mut graph, &diff(&cg, &cg), &cg, "a.py").unwrap();

        assert!(patch.is_empty());
        assert_eq!(patch, PatchResult::default());
        assert_eq!(graph, before);
    }

    #[test]
    fn inconsistent_diff_leaves_graph_untouched() {
        let old = call_graph(&[("f", 1, &[])]);
        let new = call_graph(&[("f", 1, &[]), ("g", 3, &[])]);
        let mut graph = create_graph_from_call_graph(&old, "a.py");
        let before = graph.clone();

        let d = diff(&old, &new);
        let result = apply_local_update(&mut graph, &d, &old, "a.py");

        assert!(matches!(result, Err(GraphError::InconsistentDiff { .. })));
        assert_eq!(graph, before);
    }

    #[test]
    fn new_file_graph_has_pending_nodes_and_local_edges() {
        let cg = call_graph(&[("load", 1, &["parse", "os.path"]), ("parse", 5, &[])]);

        let graph = create_graph_from_call_graph(&cg, "b.py");

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes.iter().all(|n| n.pending && n.node_type == "step"));
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].label, UNRESOLVED_EDGE_LABEL);
        assert!(graph.node("b.py::load").unwrap().is_entry_point);
        assert!(graph.node("b.py::parse").unwrap().is_exit_point);
    }

    #[test]
    fn merge_replaces_previous_file_contribution() {
        let mut graph = create_graph_from_call_graph(&call_graph(&[("old", 1, &[])]), "b.py");
        let fresh = create_graph_from_call_graph(&call_graph(&[("new", 1, &[])]), "b.py");

        let patch = merge_file_graph(&mut graph, "b.py", fresh);

        assert_eq!(patch.nodes_removed, vec!["b.py::old".to_string()]);
        assert_eq!(patch.nodes_added, vec!["b.py::new".to_string()]);
        assert_eq!(patch.needs_metadata, vec!["b.py::new".to_string()]);
    }

    #[test]
    fn cross_file_edges_are_replaced_not_duplicated() {
        let mut graph = create_graph_from_call_graph(&call_graph(&[("summarize", 1, &[])]), "a.py");
        merge_file_graph(
            &mut graph,
            "b.py",
            create_graph_from_call_graph(&call_graph(&[("main", 1, &["a.summarize"])]), "b.py"),
        );
        let call = CrossFileCall {
            caller: CallSite {
                file: "b.py".into(),
                function: "main".into(),
                line: 1,
            },
            callee: CallTarget {
                file: "a.py".into(),
                function: "summarize".into(),
                module: "a".into(),
            },
        };

        assert_eq!(splice_cross_file_edges(&mut graph, "b.py", [&call]), (1, 0));
        assert_eq!(splice_cross_file_edges(&mut graph, "b.py", [&call]), (0, 0));
        assert!(graph.has_edge("b.py::main", "a.py::summarize"));

        assert_eq!(
            splice_cross_file_edges(&mut graph, "b.py", std::iter::empty()),
            (0, 1)
        );
        assert!(!graph.has_edge("b.py::main", "a.py::summarize"));
    }

    #[test]
    fn defining_an_already_called_function_links_its_callers() {
        let old = call_graph(&[("f", 1, &["helper"])]);
        let new = call_graph(&[("f", 1, &["helper"]), ("helper", 4, &[])]);
        let mut graph = create_graph_from_call_graph(&old, "a.py");
        classified(&mut graph);

        let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "a.py").unwrap();

        assert_eq!(patch.nodes_added, vec!["a.py::helper".to_string()]);
        assert_eq!(patch.edges_added, 1);
        assert!(graph.has_edge("a.py::f", "a.py::helper"));

        let edges = |g: &VisualGraph| {
            let mut pairs: Vec<_> = g
                .edges
                .iter()
                .map(|e| (e.source.clone(), e.target.clone()))
                .collect();
            pairs.sort();
            pairs
        };
        assert_eq!(edges(&graph), edges(&create_graph_from_call_graph(&new, "a.py")));
    }

    #[test]
    fn classification_clears_pending_only_for_named_ids() {
        let cg = call_graph(&[("f", 1, &[]), ("g", 3, &[])]);
        let mut graph = create_graph_from_call_graph(&cg, "a.py");

        let ids = apply_classification(
            &mut graph,
            &[NodeClassification {
                id: "a.py::f".into(),
                node_type: "llm".into(),
                label: "Summarize".into(),
                description: None,
            }],
        );

        assert_eq!(ids, vec!["a.py::f".to_string()]);
        let f = graph.node("a.py::f").unwrap();
        assert_eq!((f.node_type.as_str(), f.label.as_str(), f.pending), ("llm", "Summarize", false));
        assert!(graph.node("a.py::g").unwrap().pending);
    }
}
