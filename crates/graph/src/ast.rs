use crate::error::{GraphError, Result};
use crate::extract::normalize_call;
use crate::language::Language;
use crate::types::{CallGraph, FunctionInfo};
use tree_sitter::{Node, Parser};

/// JS/TS node kinds whose `value` makes a named binding a function
const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Tree-sitter based call-graph extraction
pub struct AstExtractor {
    language: Language,
    parser: Parser,
}

impl AstExtractor {
    pub fn new(language: Language) -> Result<Self> {
        let ts_lang = language
            .tree_sitter_language()
            .ok_or_else(|| GraphError::UnsupportedLanguage(language.as_str().to_string()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&ts_lang)
            .map_err(|e| GraphError::ParseError(format!("Failed to set language: {e}")))?;

        Ok(Self { language, parser })
    }

    pub fn extract(&mut self, source: &str) -> Result<CallGraph> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| GraphError::ParseError("Failed to parse source".to_string()))?;

        let mut graph = CallGraph::new();
        let mut open: Vec<FunctionInfo> = Vec::new();
        self.traverse(tree.root_node(), source.as_bytes(), &mut open, &mut graph);

        Ok(graph)
    }

    /// Depth-first walk; calls go to the innermost open function
    fn traverse(
        &self,
        node: Node,
        source: &[u8],
        open: &mut Vec<FunctionInfo>,
        graph: &mut CallGraph,
    ) {
        let declared = self.declared_function(node, source);

        if let Some(name) = &declared {
            open.push(FunctionInfo::new(
                name.clone(),
                node.start_position().row + 1,
                node.end_position().row + 1,
            ));
        } else if let Some(call) = self.call_target(node, source).and_then(normalize_call) {
            if let Some(current) = open.last_mut() {
                current.calls.push(call);
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.traverse(child, source, open, graph);
        }

        if declared.is_some() {
            if let Some(function) = open.pop() {
                graph.insert(function);
            }
        }
    }

    /// Name of the function declared by `node`, if it declares one
    fn declared_function(&self, node: Node, source: &[u8]) -> Option<String> {
        let kind = node.kind();
        let name_node = match self.language {
            Language::Python => (kind == "function_definition")
                .then(|| node.child_by_field_name("name"))
                .flatten(),
            Language::Rust => (kind == "function_item")
                .then(|| node.child_by_field_name("name"))
                .flatten(),
            Language::JavaScript | Language::TypeScript | Language::Tsx => match kind {
                "function_declaration" | "generator_function_declaration" | "method_definition" => {
                    node.child_by_field_name("name")
                }
                "variable_declarator" | "public_field_definition" | "field_definition" => {
                    let value = node.child_by_field_name("value")?;
                    if !FUNCTION_VALUE_KINDS.contains(&value.kind()) {
                        return None;
                    }
                    node.child_by_field_name("name")
                        .or_else(|| node.child_by_field_name("property"))
                }
                _ => None,
            },
            _ => None,
        }?;

        let name = name_node.utf8_text(source).ok()?.trim();
        let simple = name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '#');
        (!name.is_empty() && simple).then(|| name.to_string())
    }

    /// Raw callee text of a call-like node
    fn call_target<'a>(&self, node: Node, source: &'a [u8]) -> Option<&'a str> {
        let kind = node.kind();
        let target = match self.language {
            Language::Python => (kind == "call")
                .then(|| node.child_by_field_name("function"))
                .flatten(),
            Language::Rust => (kind == "call_expression")
                .then(|| node.child_by_field_name("function"))
                .flatten(),
            Language::JavaScript | Language::TypeScript | Language::Tsx => match kind {
                "call_expression" => node.child_by_field_name("function"),
                "new_expression" => node.child_by_field_name("constructor"),
                _ => None,
            },
            _ => None,
        }?;

        target.utf8_text(source).ok()
    }
}
