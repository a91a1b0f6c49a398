use crate::ast::AstExtractor;
use crate::error::Result;
use crate::language::{ExtractionStrategy, Language};
use crate::pattern::PatternScanner;
use crate::types::CallGraph;

/// Words that look like calls (`if (`, `return (`) but never are
const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "foreach", "while", "switch", "case", "catch", "return", "match",
    "function", "fn", "func", "fun", "def", "class", "with", "yield", "await", "async", "typeof",
    "sizeof", "not", "and", "or", "in", "is", "assert", "lambda", "except", "del", "unless",
    "until", "loop", "go", "defer", "guard", "void",
];

/// Receivers that refer to the enclosing object rather than a module
const SELF_RECEIVERS: &[&str] = &["self", "this", "cls", "super", "Self"];

/// Extract the call graph of one file.
///
/// Never fails: an unsupported language or a parse failure yields an empty
/// call graph, which callers treat as "nothing to diff".
pub fn extract(source: &str, path: &str) -> CallGraph {
    let language = Language::from_path(path);
    match try_extract(source, language) {
        Ok(graph) => graph,
        Err(err) => {
            log::debug!("Extraction failed for {path}: {err}");
            CallGraph::new()
        }
    }
}

/// Extraction with the error surfaced, used by [`extract`]
pub fn try_extract(source: &str, language: Language) -> Result<CallGraph> {
    match language.strategy() {
        ExtractionStrategy::Ast => match AstExtractor::new(language) {
            Ok(mut extractor) => extractor.extract(source),
            Err(err) => {
                log::debug!(
                    "AST extraction unavailable for {}: {err}; falling back to pattern scan",
                    language.as_str()
                );
                PatternScanner::new(language).scan(source)
            }
        },
        ExtractionStrategy::Pattern(_) => PatternScanner::new(language).scan(source),
        ExtractionStrategy::Unsupported => Err(crate::GraphError::UnsupportedLanguage(
            language.as_str().to_string(),
        )),
    }
}

/// Normalize a raw call target (`self.client.chat.create`, `crate::a::b::<T>`)
/// to the `[module.]function` form used for diffing and cross-file lookup.
///
/// Returns `None` when the target is not a named call.
pub fn normalize_call(raw: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(raw.len());
    let mut angle_depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '<' => angle_depth += 1,
            '>' if angle_depth > 0 => angle_depth -= 1,
            _ if angle_depth > 0 => {}
            c if c.is_whitespace() => {}
            '!' => {}
            c => cleaned.push(c),
        }
    }

    let cleaned = cleaned.replace("?.", ".").replace("::", ".");
    let segments: Vec<&str> = cleaned.split('.').filter(|s| !s.is_empty()).collect();

    // Keep the trailing run of plain identifiers: `client().chat.create` -> `chat.create`
    let mut tail: Vec<&str> = segments
        .iter()
        .rev()
        .take_while(|s| is_identifier(s))
        .copied()
        .collect();
    tail.reverse();

    let first_named = tail
        .iter()
        .position(|s| !SELF_RECEIVERS.contains(s))
        .unwrap_or(tail.len());
    let tail = &tail[first_named..];

    let function = *tail.last()?;
    if KEYWORDS.contains(&function) {
        return None;
    }

    let start = tail.len().saturating_sub(2);
    Some(tail[start..].join("."))
}

/// Split a normalized call into its optional module and function name
pub fn split_call(call: &str) -> (Option<&str>, &str) {
    match call.split_once('.') {
        Some((module, function)) => (Some(module), function),
        None => (None, call),
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
