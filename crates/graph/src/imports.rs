//! Import bindings and exported function names, read textually.
//!
//! Specifiers are returned in a path-like form: relative specifiers keep
//! their `./` / `../` prefix, module paths use `/` as separator
//! (`pkg.sub` and `crate::pkg::sub` both become `pkg/sub`).

use crate::language::Language;
use crate::types::ImportBinding;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^[ \t]*import[ \t]+([^\n#;]+)"));

static PY_FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+(\([^)]*\)|[^\n#;]+)")
});

static PY_TOP_LEVEL_DEF: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)"));

static PY_ALL: Lazy<Regex> =
    Lazy::new(|| regex(r"(?s)__all__\s*(?::[^=\n]*)?=\s*[\[(](.*?)[\])]"));

static QUOTED: Lazy<Regex> = Lazy::new(|| regex(r#"['"]([^'"]+)['"]"#));

static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?ms)^[ \t]*import[ \t]+(?:type[ \t]+)?([^'";]+?)\s+from\s*['"]([^'"]+)['"]"#)
});

static JS_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    regex(
        r#"(?:const|let|var)\s+(\{[^}]*\}|[A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#,
    )
});

static JS_EXPORT_SYNTAX: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^[ \t]*export\b|\bmodule\.exports\b|\bexports\.[A-Za-z_$][\w$]*\s*="));

static JS_EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    regex(
        r"(?m)^[ \t]*export[ \t]+(?:default[ \t]+)?(?:async[ \t]+)?(?:function|const|let|var|class)[ \t]*\*?[ \t]*([A-Za-z_$][\w$]*)",
    )
});

static JS_EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^[ \t]*export[ \t]*(?:type[ \t]*)?\{([^}]*)\}"));

static JS_EXPORT_DEFAULT_NAME: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^[ \t]*export[ \t]+default[ \t]+([A-Za-z_$][\w$]*)[ \t]*;?[ \t]*$"));

static CJS_EXPORT_OBJECT: Lazy<Regex> =
    Lazy::new(|| regex(r"\bmodule\.exports\s*=\s*\{([^}]*)\}"));

static CJS_EXPORT_NAME: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)\bmodule\.exports\s*=\s*([A-Za-z_$][\w$]*)[ \t]*;?[ \t]*$"));

static CJS_EXPORT_PROPERTY: Lazy<Regex> =
    Lazy::new(|| regex(r"\b(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*="));

static RUST_USE: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?use[ \t]+([^;]+);")
});

static RUST_MOD: Lazy<Regex> = Lazy::new(|| {
    regex(r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?mod[ \t]+([A-Za-z_]\w*)[ \t]*;")
});

static RUST_PUB_FN: Lazy<Regex> = Lazy::new(|| {
    regex(
        r#"(?m)^[ \t]*pub(?:\([^)]*\))?[ \t]+(?:const[ \t]+)?(?:async[ \t]+)?(?:unsafe[ \t]+)?(?:extern[ \t]+"[^"]*"[ \t]+)?fn[ \t]+([A-Za-z_]\w*)"#,
    )
});

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("import pattern compiles")
}

/// Import bindings declared by a file, in source order
#[must_use]
pub fn extract_imports(language: Language, source: &str) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();
    match language {
        Language::Python => python_imports(source, &mut bindings),
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            js_imports(source, &mut bindings);
        }
        Language::Rust => rust_imports(source, &mut bindings),
        _ => {}
    }
    bindings
}

/// Function names a file makes visible to other files.
///
/// `None` means the file has no explicit export list, so any of its
/// functions may be called from elsewhere.
#[must_use]
pub fn extract_exports(language: Language, source: &str) -> Option<BTreeSet<String>> {
    match language {
        Language::Python => Some(python_exports(source)),
        Language::JavaScript | Language::TypeScript | Language::Tsx => js_exports(source),
        Language::Rust => {
            let names: BTreeSet<String> = RUST_PUB_FN
                .captures_iter(source)
                .map(|caps| caps[1].to_string())
                .collect();
            (!names.is_empty()).then_some(names)
        }
        _ => None,
    }
}

fn binding(local: &str, specifiers: Vec<String>) -> ImportBinding {
    ImportBinding {
        local: local.to_string(),
        specifiers,
    }
}

/// `a as b` -> (`a`, `b`)
fn split_alias<'a>(item: &'a str, keyword: &str) -> (&'a str, &'a str) {
    let item = item.trim();
    match item.split_once(keyword) {
        Some((name, alias)) if !alias.trim().is_empty() => (name.trim(), alias.trim()),
        _ => (item, item),
    }
}

/// Python module path (`..pkg.mod`) in specifier form (`../pkg/mod`)
fn python_specifier(module: &str) -> String {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = module[dots..].replace('.', "/");
    let prefix = match dots {
        0 => return rest,
        1 => "./".to_string(),
        n => "../".repeat(n - 1),
    };
    if rest.is_empty() {
        prefix.trim_end_matches('/').to_string()
    } else {
        format!("{prefix}{rest}")
    }
}

fn python_imports(source: &str, out: &mut Vec<ImportBinding>) {
    for caps in PY_IMPORT.captures_iter(source) {
        for item in caps[1].split(',') {
            let (module, alias) = split_alias(item, " as ");
            if module.is_empty() {
                continue;
            }
            let specifier = python_specifier(module);
            if alias != module {
                out.push(binding(alias, vec![specifier]));
                continue;
            }
            // `import pkg.mod` binds `pkg`; calls through it normalize to `mod.f`
            let mut segments = module.split('.');
            if let Some(root) = segments.next() {
                out.push(binding(root, vec![root.to_string()]));
            }
            if let Some(last) = module.rsplit('.').next().filter(|_| module.contains('.')) {
                out.push(binding(last, vec![specifier]));
            }
        }
    }

    for caps in PY_FROM_IMPORT.captures_iter(source) {
        let base = python_specifier(&caps[1]);
        let names = caps[2].trim().trim_start_matches('(').trim_end_matches(')');
        for item in names.split(',') {
            let (name, alias) = split_alias(item, " as ");
            if name.is_empty() || name == "*" {
                continue;
            }
            let nested = if base.is_empty() {
                name.to_string()
            } else {
                format!("{base}/{name}")
            };
            out.push(binding(alias, vec![nested, base.clone()]));
        }
    }
}

fn js_imports(source: &str, out: &mut Vec<ImportBinding>) {
    for caps in JS_IMPORT.captures_iter(source) {
        let specifier = caps[2].to_string();
        let clause = caps[1].trim();

        let (outside, named) = match (clause.find('{'), clause.rfind('}')) {
            (Some(open), Some(close)) if close > open => (
                format!("{}{}", &clause[..open], &clause[close + 1..]),
                Some(&clause[open + 1..close]),
            ),
            _ => (clause.to_string(), None),
        };

        for part in outside.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let local = part
                .strip_prefix('*')
                .map_or(part, |ns| split_alias(ns, "as ").1);
            if is_js_identifier(local) {
                out.push(binding(local, vec![specifier.clone()]));
            }
        }

        for item in named.into_iter().flat_map(|n| n.split(',')) {
            let item = item.trim().trim_start_matches("type ");
            let (_, local) = split_alias(item, " as ");
            if is_js_identifier(local) {
                out.push(binding(local, vec![specifier.clone()]));
            }
        }
    }

    for caps in JS_REQUIRE.captures_iter(source) {
        let specifier = caps[2].to_string();
        let target = &caps[1];
        match target.strip_prefix('{') {
            Some(destructured) => {
                for item in destructured.trim_end_matches('}').split(',') {
                    let (_, local) = split_alias(item, ":");
                    if is_js_identifier(local) {
                        out.push(binding(local, vec![specifier.clone()]));
                    }
                }
            }
            None => out.push(binding(target, vec![specifier])),
        }
    }
}

fn rust_imports(source: &str, out: &mut Vec<ImportBinding>) {
    for caps in RUST_USE.captures_iter(source) {
        let mut paths = Vec::new();
        expand_use_tree(&[], &caps[1], &mut paths);
        for (path, local) in paths {
            out.push(binding(&local, vec![rust_specifier(&path)]));
        }
    }
    for caps in RUST_MOD.captures_iter(source) {
        let name = &caps[1];
        out.push(binding(name, vec![format!("./{name}")]));
    }
}

/// Flatten a `use` tree into `(path segments, local name)` pairs
fn expand_use_tree(prefix: &[String], tree: &str, out: &mut Vec<(Vec<String>, String)>) {
    let tree = tree.trim();
    if let (Some(open), Some(close)) = (tree.find('{'), tree.rfind('}')) {
        let mut base = prefix.to_vec();
        base.extend(path_segments(&tree[..open]));
        for item in split_top_level(&tree[open + 1..close]) {
            expand_use_tree(&base, item, out);
        }
        return;
    }

    let (path, alias) = split_alias(tree, " as ");
    let mut full = prefix.to_vec();
    full.extend(path_segments(path));
    if full.last().is_some_and(|last| last == "self") {
        full.pop();
    }
    let Some(last) = full.last().cloned() else {
        return;
    };
    if last == "*" {
        return;
    }
    let local = if alias == path { last } else { alias.to_string() };
    out.push((full, local));
}

fn path_segments(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Split on commas that are not nested inside braces
fn split_top_level(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in list.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// `crate::a::b` -> `a/b`, `super::a` -> `./a`, `super::super::a` -> `../a`
fn rust_specifier(path: &[String]) -> String {
    let mut segments = path.iter().map(String::as_str).peekable();
    let mut prefix = String::new();
    match segments.peek() {
        Some(&"crate") => {
            segments.next();
        }
        Some(&"self") => {
            segments.next();
            prefix.push_str("./");
        }
        Some(&"super") => {
            segments.next();
            prefix.push_str("./");
            while segments.peek() == Some(&"super") {
                segments.next();
                if prefix == "./" {
                    prefix = "../".to_string();
                } else {
                    prefix.push_str("../");
                }
            }
        }
        _ => {}
    }
    let rest: Vec<&str> = segments.collect();
    format!("{prefix}{}", rest.join("/"))
}

fn python_exports(source: &str) -> BTreeSet<String> {
    if let Some(caps) = PY_ALL.captures(source) {
        return QUOTED
            .captures_iter(&caps[1])
            .map(|c| c[1].to_string())
            .collect();
    }
    PY_TOP_LEVEL_DEF
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .filter(|name| !name.starts_with('_'))
        .collect()
}

fn js_exports(source: &str) -> Option<BTreeSet<String>> {
    if !JS_EXPORT_SYNTAX.is_match(source) {
        return None;
    }

    let mut names = BTreeSet::new();
    for caps in JS_EXPORT_DECL.captures_iter(source) {
        names.insert(caps[1].to_string());
    }
    for caps in JS_EXPORT_LIST.captures_iter(source) {
        for item in caps[1].split(',') {
            let (_, exported) = split_alias(item, " as ");
            if is_js_identifier(exported) && exported != "default" {
                names.insert(exported.to_string());
            }
        }
    }
    for caps in JS_EXPORT_DEFAULT_NAME.captures_iter(source) {
        names.insert(caps[1].to_string());
    }
    for caps in CJS_EXPORT_OBJECT.captures_iter(source) {
        for item in caps[1].split(',') {
            let key = item
                .split(|c: char| c == ':' || c == '(')
                .next()
                .unwrap_or("")
                .trim()
                .trim_start_matches("async ");
            if is_js_identifier(key) {
                names.insert(key.to_string());
            }
        }
    }
    for caps in CJS_EXPORT_NAME.captures_iter(source) {
        let name = &caps[1];
        if !matches!(name, "function" | "class" | "async" | "require") {
            names.insert(name.to_string());
        }
    }
    for caps in CJS_EXPORT_PROPERTY.captures_iter(source) {
        names.insert(caps[1].to_string());
    }
    Some(names)
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bindings(language: Language, source: &str) -> Vec<(String, Vec<String>)> {
        extract_imports(language, source)
            .into_iter()
            .map(|b| (b.local, b.specifiers))
            .collect()
    }

    fn names(items: &[&str]) -> Option<BTreeSet<String>> {
        Some(items.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn python_plain_and_aliased_imports() {
        let found = bindings(
            Language::Python,
            "import a\nimport numpy as np\nimport pkg.llm\n",
        );
        assert_eq!(
            found,
            vec![
                ("a".to_string(), vec!["a".to_string()]),
                ("np".to_string(), vec!["numpy".to_string()]),
                ("pkg".to_string(), vec!["pkg".to_string()]),
                ("llm".to_string(), vec!["pkg/llm".to_string()]),
            ]
        );
    }

    #[test]
    fn python_from_imports_with_relative_dots() {
        let found = bindings(
            Language::Python,
            "from . import prompts\nfrom ..core import (\n    llm as model,\n    tools,\n)\n",
        );
        assert_eq!(
            found,
            vec![
                ("prompts".to_string(), vec!["./prompts".to_string(), ".".to_string()]),
                (
                    "model".to_string(),
                    vec!["../core/llm".to_string(), "../core".to_string()]
                ),
                (
                    "tools".to_string(),
                    vec!["../core/tools".to_string(), "../core".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn javascript_es_imports_and_require() {
        let source = r#"
import OpenAI from "openai";
import * as a from './a';
import def, { summarize as sum, type Options } from "../lib/text";
const fs = require('fs');
const { readFile, join: joinPath } = require("./util");
"#;
        let found = bindings(Language::TypeScript, source);
        let locals: Vec<&str> = found.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            locals,
            vec!["OpenAI", "a", "def", "sum", "Options", "fs", "readFile", "joinPath"]
        );
        assert_eq!(found[1].1, vec!["./a".to_string()]);
        assert_eq!(found[3].1, vec!["../lib/text".to_string()]);
    }

    #[test]
    fn rust_use_trees_and_mod_declarations() {
        let source = "\
mod llm;
use crate::prompts::{self, render as draw};
use super::tools;
use std::collections::HashMap;
";
        let found = bindings(Language::Rust, source);
        assert_eq!(
            found,
            vec![
                ("prompts".to_string(), vec!["prompts".to_string()]),
                ("draw".to_string(), vec!["prompts/render".to_string()]),
                ("tools".to_string(), vec!["./tools".to_string()]),
                ("HashMap".to_string(), vec!["std/collections/HashMap".to_string()]),
                ("llm".to_string(), vec!["./llm".to_string()]),
            ]
        );
    }

    #[test]
    fn python_exports_skip_private_and_nested() {
        let source = "\
def summarize(x):
    def inner():
        pass
    return x

def _helper():
    pass
";
        assert_eq!(extract_exports(Language::Python, source), names(&["summarize"]));
    }

    #[test]
    fn python_dunder_all_wins() {
        let source = "__all__ = [\n    'run',\n]\n\ndef run(): pass\ndef other(): pass\n";
        assert_eq!(extract_exports(Language::Python, source), names(&["run"]));
    }

    #[test]
    fn javascript_exports_or_permissive() {
        let source = "\
export async function handle(req) {}
export const format = () => {};
function inner() {}
export { inner as publicInner };
";
        assert_eq!(
            extract_exports(Language::JavaScript, source),
            names(&["format", "handle", "publicInner"])
        );
        assert_eq!(extract_exports(Language::JavaScript, "function f() {}\n"), None);
    }

    #[test]
    fn commonjs_exports() {
        let source = "module.exports = { summarize, classify: run };\nexports.extra = 1;\n";
        assert_eq!(
            extract_exports(Language::JavaScript, source),
            names(&["classify", "extra", "summarize"])
        );
    }

    #[test]
    fn rust_public_functions() {
        let source = "pub fn run() {}\npub(crate) async fn plan() {}\nfn private() {}\n";
        assert_eq!(extract_exports(Language::Rust, source), names(&["plan", "run"]));
        assert_eq!(extract_exports(Language::Rust, "fn main() {}\n"), None);
    }
}
