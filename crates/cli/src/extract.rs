use anyhow::{Context, Result};
use flowlens_graph::{diff, try_extract, CallGraph, CallGraphDiff, Language};
use flowlens_indexer::relative_path;
use std::path::Path;

/// Call graph of `file`, named relative to `root`
pub fn extract_file(file: &Path, root: Option<&Path>) -> Result<CallGraph> {
    let content = read(file)?;
    let language = Language::from_path(file);
    let call_graph = try_extract(&content, language)
        .with_context(|| format!("Cannot extract {}", file.display()))?;
    log::debug!(
        "Extracted {} function(s) from {}",
        call_graph.len(),
        display_name(file, root)
    );
    Ok(call_graph)
}

/// Diff of two revisions; the language follows the new file's extension
pub fn diff_files(old: &Path, new: &Path) -> Result<CallGraphDiff> {
    let language = Language::from_path(new);
    let old_graph = try_extract(&read(old)?, language)
        .with_context(|| format!("Cannot extract {}", old.display()))?;
    let new_graph = try_extract(&read(new)?, language)
        .with_context(|| format!("Cannot extract {}", new.display()))?;
    Ok(diff(&old_graph, &new_graph))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn display_name(file: &Path, root: Option<&Path>) -> String {
    let root = root.or_else(|| file.parent()).unwrap_or(Path::new("."));
    relative_path(root, file).unwrap_or_else(|| file.display().to_string())
}
