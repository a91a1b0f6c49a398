use crate::types::{Edge, Node, VisualGraph};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashSet;

/// Stable node id of a function: `relativePath::functionName`
#[must_use]
pub fn node_id(relative_path: &str, function: &str) -> String {
    format!("{relative_path}::{function}")
}

impl VisualGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Node representing `function` of `file`, looked up by source rather than
    /// by id so collision-suffixed ids are found too
    #[must_use]
    pub fn function_node(&self, file: &str, function: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.source.file == file && n.source.function == function)
    }

    pub fn function_node_mut(&mut self, file: &str, function: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.source.file == file && n.source.function == function)
    }

    #[must_use]
    pub fn function_node_id(&self, file: &str, function: &str) -> Option<String> {
        self.function_node(file, function).map(|n| n.id.clone())
    }

    pub fn file_nodes<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| n.belongs_to(file))
    }

    #[must_use]
    pub fn has_file(&self, file: &str) -> bool {
        self.nodes.iter().any(|n| n.belongs_to(file))
    }

    /// Pick an id for a new node: the plain composite key, or the key
    /// suffixed with the line when another function already holds it
    #[must_use]
    pub fn allocate_node_id(&self, file: &str, function: &str, line: usize) -> String {
        let id = node_id(file, function);
        if !self.contains_node(&id) {
            return id;
        }
        let suffixed = format!("{id}::{line}");
        if !self.contains_node(&suffixed) {
            return suffixed;
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{suffixed}-{n}");
            if !self.contains_node(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    #[must_use]
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    /// Add an edge unless one already links the two nodes
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.has_edge(&edge.source, &edge.target) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Remove every edge `source -> target`; returns how many were removed
    pub fn remove_edge(&mut self, source: &str, target: &str) -> usize {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.source == source && e.target == target));
        before - self.edges.len()
    }

    /// Remove a node and every edge touching it; returns the removed edge count
    pub fn remove_node(&mut self, id: &str) -> usize {
        self.nodes.retain(|n| n.id != id);
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        before - self.edges.len()
    }

    /// Remove all nodes of a file; returns `(removed ids, removed edge count)`
    pub fn remove_file(&mut self, file: &str) -> (Vec<String>, usize) {
        let ids: Vec<String> = self.file_nodes(file).map(|n| n.id.clone()).collect();
        let edges = ids.iter().map(|id| self.remove_node(id)).sum();
        (ids, edges)
    }

    /// Directed view of the graph keyed by node id
    #[must_use]
    pub fn topology(&self) -> DiGraphMap<&str, ()> {
        let mut graph = DiGraphMap::new();
        for node in &self.nodes {
            graph.add_node(node.id.as_str());
        }
        for edge in &self.edges {
            if graph.contains_node(edge.source.as_str()) && graph.contains_node(edge.target.as_str())
            {
                graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
            }
        }
        graph
    }

    #[must_use]
    pub fn callers_of(&self, id: &str) -> Vec<String> {
        self.topology()
            .neighbors_directed(id, Direction::Incoming)
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn callees_of(&self, id: &str) -> Vec<String> {
        self.topology()
            .neighbors_directed(id, Direction::Outgoing)
            .map(str::to_string)
            .collect()
    }

    /// Recompute entry/exit flags of pending nodes from their degree.
    ///
    /// Classified nodes keep the flags the classifier gave them.
    pub fn refresh_pending_endpoints(&mut self) {
        let flags: Vec<(String, bool, bool)> = {
            let topology = self.topology();
            self.nodes
                .iter()
                .filter(|n| n.pending)
                .map(|n| {
                    let id = n.id.as_str();
                    let no_callers = topology
                        .neighbors_directed(id, Direction::Incoming)
                        .all(|caller| caller == id);
                    let no_callees = topology
                        .neighbors_directed(id, Direction::Outgoing)
                        .all(|callee| callee == id);
                    (n.id.clone(), no_callers, no_callees)
                })
                .collect()
        };

        for (id, entry, exit) in flags {
            if let Some(node) = self.node_mut(&id) {
                node.is_entry_point = entry;
                node.is_exit_point = exit;
            }
        }
    }

    /// Ids of nodes still waiting for classification
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.pending)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Files that contribute at least one node
    #[must_use]
    pub fn files(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.source.file.as_str()).collect()
    }

    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        (self.nodes.len(), self.edges.len())
    }
}
