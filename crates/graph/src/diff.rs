use crate::types::{CallEdge, CallGraph, CallGraphDiff};
use std::collections::BTreeSet;

/// Structural delta between two snapshots of the same file.
///
/// Function sets come from key differences; a function present in both is
/// modified when its call list (order-sensitive) or line span changed. The
/// edge delta is computed over the flattened `(caller, call)` pairs
/// independently, so a pure reordering of calls still shows up there.
#[must_use]
pub fn diff(old: &CallGraph, new: &CallGraph) -> CallGraphDiff {
    let old_names: BTreeSet<&str> = old.names().collect();
    let new_names: BTreeSet<&str> = new.names().collect();

    let added_functions = new_names
        .difference(&old_names)
        .map(|s| (*s).to_string())
        .collect();
    let removed_functions = old_names
        .difference(&new_names)
        .map(|s| (*s).to_string())
        .collect();

    let modified_functions = old_names
        .intersection(&new_names)
        .filter(|name| {
            match (old.get(name), new.get(name)) {
                (Some(before), Some(after)) => {
                    before.calls != after.calls
                        || before.start_line != after.start_line
                        || before.end_line != after.end_line
                }
                _ => false,
            }
        })
        .map(|s| (*s).to_string())
        .collect();

    let old_edges = edges_of(old);
    let new_edges = edges_of(new);

    CallGraphDiff {
        added_functions,
        removed_functions,
        modified_functions,
        added_edges: new_edges.difference(&old_edges).cloned().collect(),
        removed_edges: old_edges.difference(&new_edges).cloned().collect(),
    }
}

/// Flattened `(caller, call)` pairs of a snapshot
#[must_use]
pub fn edges_of(graph: &CallGraph) -> BTreeSet<CallEdge> {
    graph.edges()
}

impl CallGraphDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_functions.is_empty()
            && self.removed_functions.is_empty()
            && self.modified_functions.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }

    /// Replay the function-level delta on the key set of the old snapshot
    #[must_use]
    pub fn apply_to_keys(&self, old_keys: &BTreeSet<String>) -> BTreeSet<String> {
        old_keys
            .iter()
            .filter(|k| !self.removed_functions.contains(*k))
            .chain(self.added_functions.iter())
            .cloned()
            .collect()
    }
}
