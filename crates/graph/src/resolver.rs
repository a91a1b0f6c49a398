use crate::extract::{extract, split_call};
use crate::imports::{extract_exports, extract_imports};
use crate::language::Language;
use crate::types::{
    CallGraph, CallSite, CallTarget, CrossFileCall, FileIndexEntry, IndexedFunction,
    RepoFileIndex,
};
use std::collections::BTreeSet;

/// Suffixes tried, in order, when turning an import specifier into a file
const RESOLUTION_CANDIDATES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".mjs",
    ".py",
    ".rs",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/__init__.py",
    "/mod.rs",
];

/// Extensions dropped from a specifier before retrying (`./a.js` -> `./a.ts`)
const SPECIFIER_EXTENSIONS: &[&str] = &[".js", ".jsx", ".mjs", ".ts", ".tsx", ".py"];

/// Workspace-wide index of functions, exports and imports, plus the calls
/// resolved between files.
///
/// Resolution is best effort: calls whose module cannot be mapped to a known
/// file, or whose target does not export the function, are skipped.
#[derive(Debug, Clone, Default)]
pub struct CrossFileResolver {
    index: RepoFileIndex,
    calls: BTreeSet<CrossFileCall>,
    known_files: BTreeSet<String>,
}

impl CrossFileResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-index one file from its content.
    ///
    /// Returns the files whose outgoing cross-file calls changed.
    pub fn update(&mut self, content: &str, relative_path: &str) -> BTreeSet<String> {
        let call_graph = extract(content, relative_path);
        self.update_with_call_graph(content, relative_path, &call_graph)
    }

    /// Same as [`update`](Self::update) with an already extracted call graph
    pub fn update_with_call_graph(
        &mut self,
        content: &str,
        relative_path: &str,
        call_graph: &CallGraph,
    ) -> BTreeSet<String> {
        let language = Language::from_path(relative_path);
        let entry = FileIndexEntry {
            functions: call_graph
                .functions()
                .map(|f| IndexedFunction {
                    name: f.name.clone(),
                    calls: f.calls.clone(),
                    line: f.start_line,
                })
                .collect(),
            exports: extract_exports(language, content),
            imports: extract_imports(language, content),
        };

        let newly_known = self.known_files.insert(relative_path.to_string());
        let entry_changed = self.index.get(relative_path) != Some(&entry);
        self.index.insert(relative_path.to_string(), entry);

        let mut affected = BTreeSet::new();
        if self.rederive(relative_path) {
            affected.insert(relative_path.to_string());
        }

        // Callers of this file may resolve differently now
        if newly_known || entry_changed {
            for caller in self.importers_of(relative_path) {
                if self.rederive(&caller) {
                    affected.insert(caller);
                }
            }
        }

        affected
    }

    /// Make a path resolvable as an import target without indexing it
    pub fn register_file(&mut self, relative_path: &str) {
        self.known_files.insert(relative_path.to_string());
    }

    /// Forget a file; returns the other files whose outgoing calls changed
    pub fn remove_file(&mut self, relative_path: &str) -> BTreeSet<String> {
        self.index.remove(relative_path);
        self.known_files.remove(relative_path);

        let mut affected = BTreeSet::new();
        self.calls.retain(|call| {
            if call.caller.file == relative_path {
                return false;
            }
            if call.callee.file == relative_path {
                affected.insert(call.caller.file.clone());
                return false;
            }
            true
        });
        affected
    }

    /// Re-derive every file's calls, e.g. after seeding the index in bulk
    pub fn resolve_all(&mut self) -> BTreeSet<String> {
        let files: Vec<String> = self.index.keys().cloned().collect();
        files
            .into_iter()
            .filter(|file| self.rederive(file))
            .collect()
    }

    pub fn calls_from<'a>(&'a self, relative_path: &'a str) -> impl Iterator<Item = &'a CrossFileCall> + 'a {
        self.calls
            .iter()
            .filter(move |call| call.caller.file == relative_path)
    }

    pub fn calls_into<'a>(&'a self, relative_path: &'a str) -> impl Iterator<Item = &'a CrossFileCall> + 'a {
        self.calls
            .iter()
            .filter(move |call| call.callee.file == relative_path)
    }

    #[must_use]
    pub fn calls(&self) -> &BTreeSet<CrossFileCall> {
        &self.calls
    }

    #[must_use]
    pub fn index(&self) -> &RepoFileIndex {
        &self.index
    }

    #[must_use]
    pub fn known_files(&self) -> &BTreeSet<String> {
        &self.known_files
    }

    /// Replace the calls made from `file`; returns whether they changed
    fn rederive(&mut self, file: &str) -> bool {
        let fresh = self.resolve_calls_from(file);
        let current: BTreeSet<CrossFileCall> = self.calls_from(file).cloned().collect();
        if fresh == current {
            return false;
        }
        self.calls.retain(|call| call.caller.file != file);
        self.calls.extend(fresh);
        true
    }

    fn resolve_calls_from(&self, file: &str) -> BTreeSet<CrossFileCall> {
        let Some(entry) = self.index.get(file) else {
            return BTreeSet::new();
        };

        let mut resolved = BTreeSet::new();
        for function in &entry.functions {
            for call in &function.calls {
                let (Some(module), callee) = split_call(call) else {
                    continue;
                };
                let Some(target_file) = self.resolve_module(file, entry, module) else {
                    continue;
                };
                let Some(target) = self.index.get(&target_file) else {
                    continue;
                };
                if !target.exports_function(callee) {
                    continue;
                }
                resolved.insert(CrossFileCall {
                    caller: CallSite {
                        file: file.to_string(),
                        function: function.name.clone(),
                        line: function.line,
                    },
                    callee: CallTarget {
                        file: target_file,
                        function: callee.to_string(),
                        module: module.to_string(),
                    },
                });
            }
        }
        resolved
    }

    /// File a module alias used in `importer` refers to
    fn resolve_module(&self, importer: &str, entry: &FileIndexEntry, module: &str) -> Option<String> {
        entry
            .imports
            .iter()
            .filter(|binding| binding.local == module)
            .flat_map(|binding| binding.specifiers.iter())
            .find_map(|specifier| self.resolve_specifier(importer, specifier))
    }

    /// Known file an import specifier points to
    #[must_use]
    pub fn resolve_specifier(&self, importer: &str, specifier: &str) -> Option<String> {
        if is_relative(specifier) {
            let joined = join_relative(parent_dir(importer), specifier)?;
            return self
                .try_candidates(&joined)
                .filter(|resolved| resolved != importer);
        }

        if let Some(found) = self.try_candidates(specifier) {
            if found != importer {
                return Some(found);
            }
        }
        self.match_bare_module(importer, specifier)
    }

    fn try_candidates(&self, base: &str) -> Option<String> {
        let stripped = SPECIFIER_EXTENSIONS
            .iter()
            .find_map(|ext| base.strip_suffix(ext));

        std::iter::once(base)
            .chain(stripped)
            .flat_map(|stem| {
                RESOLUTION_CANDIDATES
                    .iter()
                    .map(move |suffix| format!("{stem}{suffix}"))
            })
            .find(|candidate| self.known_files.contains(candidate))
    }

    /// Non-relative specifiers: match a known file by path suffix, then by stem
    fn match_bare_module(&self, importer: &str, specifier: &str) -> Option<String> {
        let specifier = specifier.trim_matches('/');
        if specifier.is_empty() {
            return None;
        }
        let candidates = || self.known_files.iter().filter(|f| f.as_str() != importer);

        let by_suffix = candidates().find(|file| {
            let module = module_path(file);
            module == specifier || module.ends_with(&format!("/{specifier}"))
        });
        if by_suffix.is_some() {
            return by_suffix.cloned();
        }

        let last = specifier.rsplit('/').next()?;
        candidates().find(|file| module_path(file).rsplit('/').next() == Some(last)).cloned()
    }

    /// Files whose imports may resolve to `target`
    fn importers_of(&self, target: &str) -> Vec<String> {
        self.index
            .iter()
            .filter(|(file, _)| file.as_str() != target)
            .filter(|(file, entry)| {
                entry.imports.iter().any(|binding| {
                    binding
                        .specifiers
                        .iter()
                        .any(|spec| self.resolve_specifier(file, spec).as_deref() == Some(target))
                })
            })
            .map(|(file, _)| file.clone())
            .collect()
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join a relative specifier onto a directory; `None` when it climbs above
/// the workspace root
fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// `pkg/llm/__init__.py` -> `pkg/llm`, `src/a.ts` -> `src/a`
fn module_path(file: &str) -> &str {
    let without_ext = file.rsplit_once('.').map_or(file, |(stem, ext)| {
        if ext.contains('/') {
            file
        } else {
            stem
        }
    });
    ["/__init__", "/index", "/mod"]
        .iter()
        .find_map(|suffix| without_ext.strip_suffix(suffix))
        .unwrap_or(without_ext)
}
