//! # Flowlens Graph
//!
//! Incremental maintenance of an LLM workflow graph from source edits.
//!
//! ## Features
//!
//! - **Structural extraction** - per-function call lists via tree-sitter or
//!   regex scanning
//! - **Diffing** - function and call-edge deltas between two snapshots
//! - **Local patching** - minimal node/edge updates on the visual graph
//! - **Cross-file resolution** - `module.function` calls mapped through
//!   imports and exports
//!
//! ## Architecture
//!
//! ```text
//! file text
//!     │
//!     ├──> Extractor (AST walk | pattern scan)
//!     │      └─ CallGraph { name -> calls }
//!     │
//!     ├──> Differ (old CallGraph, new CallGraph)
//!     │      └─ CallGraphDiff
//!     │
//!     ├──> Updater (VisualGraph, diff)
//!     │      ├─ pending nodes for new functions
//!     │      └─ PatchResult
//!     │
//!     └──> CrossFileResolver (imports, exports)
//!            └─ CrossFileCall set -> spliced cross-file edges
//! ```

mod ast;
mod diff;
mod error;
mod extract;
mod graph;
mod imports;
mod language;
mod pattern;
pub mod relevance;
mod resolver;
mod types;
mod updater;

pub use diff::{diff, edges_of};
pub use error::{GraphError, Result};
pub use extract::{extract, normalize_call, split_call, try_extract};
pub use graph::node_id;
pub use imports::{extract_exports, extract_imports};
pub use language::{BlockLayout, ExtractionStrategy, Language};
pub use resolver::CrossFileResolver;
pub use types::{
    CallEdge, CallGraph, CallGraphDiff, CallSite, CallTarget, CrossFileCall, Edge,
    FileIndexEntry, FunctionInfo, ImportBinding, IndexedFunction, Node, NodeClassification,
    NodeSource, PatchResult, RepoFileIndex, VisualGraph, PENDING_NODE_TYPE,
    UNRESOLVED_EDGE_LABEL,
};
pub use updater::{
    apply_classification, apply_local_update, create_graph_from_call_graph, merge_file_graph,
    splice_cross_file_edges,
};
