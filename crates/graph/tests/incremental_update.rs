//! End-to-end tests for extract -> diff -> patch -> resolve

use flowlens_graph::{
    apply_local_update, create_graph_from_call_graph, diff, extract, splice_cross_file_edges,
    CrossFileResolver, VisualGraph,
};
use pretty_assertions::assert_eq;

const A_BEFORE: &str = "\
def f(x):
    return g(x)

def g(x):
    return x

def h(x):
    return x * 2
";

const A_AFTER: &str = "\
def f(x):
    return h(x)

def g(x):
    return x

def h(x):
    return x * 2
";

#[test]
fn test_rename_to_non_local_callee_reports_diff_without_edges() {
    let old = extract("def f(x):\n    return g(x)\n", "a.py");
    let new = extract("def f(x):\n    return h(x)\n", "a.py");
    let mut graph = create_graph_from_call_graph(&old, "a.py");

    let delta = diff(&old, &new);
    assert!(delta.removed_edges.contains(&("f".to_string(), "g".to_string())));
    assert!(delta.added_edges.contains(&("f".to_string(), "h".to_string())));

    let patch = apply_local_update(&mut graph, &delta, &new, "a.py").unwrap();

    assert_eq!(patch.nodes_updated, vec!["a.py::f".to_string()]);
    assert_eq!((patch.edges_added, patch.edges_removed), (0, 0));
    assert!(graph.edges.is_empty());
}

fn classify_all(graph: &mut VisualGraph) {
    for node in &mut graph.nodes {
        node.pending = false;
        node.node_type = "llm".to_string();
        node.label = format!("Step {}", node.source.function);
    }
}

#[test]
fn test_rename_callee_patches_single_edge() {
    let old = extract(A_BEFORE, "a.py");
    let new = extract(A_AFTER, "a.py");
    let mut graph = create_graph_from_call_graph(&old, "a.py");
    classify_all(&mut graph);

    let delta = diff(&old, &new);
    assert_eq!(delta.modified_functions.iter().collect::<Vec<_>>(), vec!["f"]);
    assert!(delta.removed_edges.contains(&("f".to_string(), "g".to_string())));
    assert!(delta.added_edges.contains(&("f".to_string(), "h".to_string())));

    let patch = apply_local_update(&mut graph, &delta, &new, "a.py").unwrap();

    assert_eq!(patch.nodes_updated, vec!["a.py::f".to_string()]);
    assert_eq!(patch.edges_added, 1);
    assert_eq!(patch.edges_removed, 1);
    // Classified labels survive a modification
    assert_eq!(graph.node("a.py::f").unwrap().label, "Step f");
    assert!(graph.pending_ids().is_empty());
}

#[test]
fn test_unchanged_edit_is_an_empty_patch() {
    let old = extract(A_BEFORE, "a.py");
    let same = extract(&A_BEFORE.replace("x * 2", "x * 3"), "a.py");
    let mut graph = create_graph_from_call_graph(&old, "a.py");

    let patch = apply_local_update(&mut graph, &diff(&old, &same), &same, "a.py").unwrap();

    assert!(patch.is_empty());
}

#[test]
fn test_deleted_function_leaves_no_dangling_edges() {
    let old = extract(A_BEFORE, "a.py");
    let new = extract("def g(x):\n    return x\n\ndef h(x):\n    return x\n", "a.py");
    let mut graph = create_graph_from_call_graph(&old, "a.py");

    let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "a.py").unwrap();

    assert_eq!(patch.nodes_removed, vec!["a.py::f".to_string()]);
    assert!(!graph.contains_node("a.py::f"));
    assert!(graph.edges.iter().all(|e| !e.touches("a.py::f")));
    // Every node still maps to a function of the file
    for node in &graph.nodes {
        assert!(new.contains(&node.source.function));
    }
}

#[test]
fn test_cross_file_call_becomes_edge() {
    let a = "def summarize(text):\n    return text\n";
    let b = "import a\n\ndef main(x):\n    return a.summarize(x)\n\ndef helper():\n    pass\n";

    let mut resolver = CrossFileResolver::new();
    resolver.update(a, "a.py");
    resolver.update(b, "b.py");

    let mut graph = create_graph_from_call_graph(&extract(a, "a.py"), "a.py");
    let b_graph = create_graph_from_call_graph(&extract(b, "b.py"), "b.py");
    assert_eq!(b_graph.nodes.len(), 2);
    assert!(b_graph.nodes.iter().all(|n| n.pending));
    flowlens_graph::merge_file_graph(&mut graph, "b.py", b_graph);

    let (added, removed) = splice_cross_file_edges(&mut graph, "b.py", resolver.calls_from("b.py"));

    assert_eq!((added, removed), (1, 0));
    assert!(graph.has_edge("b.py::main", "a.py::summarize"));
    assert!(graph.node("a.py::summarize").unwrap().is_exit_point);
    assert!(!graph.node("a.py::summarize").unwrap().is_entry_point);
}

#[test]
fn test_private_target_yields_no_cross_file_call() {
    let a = "def _summarize(text):\n    return text\n";
    let b = "import a\n\ndef main(x):\n    return a._summarize(x)\n";

    let mut resolver = CrossFileResolver::new();
    resolver.update(a, "a.py");
    resolver.update(b, "b.py");

    assert_eq!(resolver.calls_from("b.py").count(), 0);
}

#[test]
fn test_typescript_module_edit_round() {
    let before = r"
import * as llm from './llm';

export async function answer(q: string) {
  const prompt = build(q);
  return llm.complete(prompt);
}

function build(q: string) {
  return `Q: ${q}`;
}
";
    let after = r"
import * as llm from './llm';

export async function answer(q: string) {
  return llm.complete(q);
}
";
    let old = extract(before, "src/app.ts");
    let new = extract(after, "src/app.ts");
    let mut graph = create_graph_from_call_graph(&old, "src/app.ts");

    let patch = apply_local_update(&mut graph, &diff(&old, &new), &new, "src/app.ts").unwrap();

    assert_eq!(patch.nodes_removed, vec!["src/app.ts::build".to_string()]);
    assert_eq!(patch.edges_removed, 1);
    assert_eq!(graph.nodes.len(), 1);
    let answer = graph.node("src/app.ts::answer").unwrap();
    assert!(answer.is_entry_point && answer.is_exit_point);
}
