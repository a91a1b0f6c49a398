//! Regex-based extraction for languages without an in-process grammar.
//!
//! Function headers are found with per-language patterns; bodies are
//! delimited either by brace depth or by indentation.

use crate::error::{GraphError, Result};
use crate::extract::normalize_call;
use crate::language::{BlockLayout, Language};
use crate::types::{CallGraph, FunctionInfo};
use once_cell::sync::Lazy;
use regex::Regex;

static GO_DEFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"^\s*func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)\s*[\(\[]"])
});

static KOTLIN_DEFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^\s*(?:[a-z]+\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?(?P<name>[A-Za-z_]\w*)\s*\(",
    ])
});

static SWIFT_DEFS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"^\s*(?:[@\w]+\s+)*func\s+(?P<name>[A-Za-z_]\w*)\s*[<(]"]));

static PHP_DEFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^\s*(?:(?:public|private|protected|static|final|abstract)\s+)*function\s+&?(?P<name>[A-Za-z_]\w*)\s*\(",
    ])
});

static RUBY_DEFS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"^\s*def\s+(?:self\.)?(?P<name>[A-Za-z_]\w*[?!=]?)"]));

static PYTHON_DEFS: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*\("]));

static JS_DEFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)\s*[<(]",
        r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    ])
});

static RUST_DEFS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>[A-Za-z_]\w*)"#,
    ])
});

static CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Za-z_$][\w$]*\s*(?:\?\.|\.|::)\s*)*[A-Za-z_$][\w$]*[!?]?\s*\(")
        .expect("call pattern compiles")
});

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`(?:[^`\\]|\\.)*`"#)
        .expect("string pattern compiles")
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("definition pattern compiles"))
        .collect()
}

/// A function header found by the scanner
#[derive(Debug, Clone)]
struct Definition {
    name: String,
    /// 0-based line index of the header
    start: usize,
    /// 0-based inclusive line index of the last body line
    end: usize,
    /// Byte offset on the header line where the definition match ends
    header_end: usize,
}

pub struct PatternScanner {
    language: Language,
    layout: BlockLayout,
}

impl PatternScanner {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self {
            language,
            layout: language.block_layout(),
        }
    }

    fn definitions(&self) -> Result<&'static [Regex]> {
        let defs: &'static Lazy<Vec<Regex>> = match self.language {
            Language::Go => &GO_DEFS,
            Language::Kotlin => &KOTLIN_DEFS,
            Language::Swift => &SWIFT_DEFS,
            Language::Php => &PHP_DEFS,
            Language::Ruby => &RUBY_DEFS,
            Language::Python => &PYTHON_DEFS,
            Language::JavaScript | Language::TypeScript | Language::Tsx => &JS_DEFS,
            Language::Rust => &RUST_DEFS,
            Language::Unknown => {
                return Err(GraphError::UnsupportedLanguage(
                    self.language.as_str().to_string(),
                ))
            }
        };
        Ok(defs.as_slice())
    }

    pub fn scan(&self, source: &str) -> Result<CallGraph> {
        let patterns = self.definitions()?;
        let lines: Vec<String> = source.lines().map(|l| self.strip_noise(l)).collect();

        let mut definitions = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let found = patterns.iter().find_map(|re| {
                re.captures(line).and_then(|caps| {
                    let name = caps.name("name")?.as_str().to_string();
                    let header_end = caps.get(0)?.end();
                    Some((name, header_end))
                })
            });
            if let Some((name, header_end)) = found {
                let end = match self.layout {
                    BlockLayout::Braces => brace_block_end(&lines, idx, header_end),
                    BlockLayout::Indentation => indented_block_end(&lines, idx),
                };
                definitions.push(Definition {
                    name,
                    start: idx,
                    end,
                    header_end,
                });
            }
        }

        let mut functions: Vec<FunctionInfo> = definitions
            .iter()
            .map(|d| FunctionInfo::new(d.name.clone(), d.start + 1, d.end + 1))
            .collect();

        for (idx, line) in lines.iter().enumerate() {
            // Header lines: only the text after the signature belongs to the function
            if let Some(pos) = definitions.iter().position(|d| d.start == idx) {
                let rest = line.get(definitions[pos].header_end..).unwrap_or("");
                collect_calls(rest, &mut functions[pos].calls);
                continue;
            }
            if let Some(owner) = innermost_owner(&definitions, idx) {
                collect_calls(line, &mut functions[owner].calls);
            }
        }

        Ok(functions.into_iter().collect())
    }

    /// Blank out string literals and trailing line comments
    fn strip_noise(&self, line: &str) -> String {
        let without_strings = STRING_LITERAL.replace_all(line, "\"\"");
        let marker = self.language.line_comment();
        match without_strings.find(marker) {
            Some(pos) => without_strings[..pos].to_string(),
            None => without_strings.into_owned(),
        }
    }
}

fn collect_calls(text: &str, calls: &mut Vec<String>) {
    for m in CALL.find_iter(text) {
        let raw = m.as_str().trim_end_matches('(');
        if let Some(call) = normalize_call(raw) {
            calls.push(call);
        }
    }
}

/// Definition with the smallest range strictly containing `line`
fn innermost_owner(definitions: &[Definition], line: usize) -> Option<usize> {
    definitions
        .iter()
        .enumerate()
        .filter(|(_, d)| d.start < line && line <= d.end)
        .min_by_key(|(_, d)| d.end - d.start)
        .map(|(idx, _)| idx)
}

fn brace_block_end(lines: &[String], start: usize, header_end: usize) -> usize {
    let mut depth = 0usize;
    let mut opened = false;

    for (idx, line) in lines.iter().enumerate().skip(start) {
        let text = if idx == start {
            line.get(header_end..).unwrap_or("")
        } else {
            line.as_str()
        };

        if !opened && idx > start && text.trim().is_empty() {
            // Expression body (`fun f() = g()`) ended without a block
            return idx - 1;
        }

        for ch in text.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if opened => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return idx;
                    }
                }
                ';' if !opened => return idx,
                _ => {}
            }
        }
    }

    if opened {
        lines.len().saturating_sub(1)
    } else {
        start
    }
}

fn indented_block_end(lines: &[String], start: usize) -> usize {
    let base = indent_width(&lines[start]);

    // Skip a multi-line signature: the header ends once parentheses balance
    let mut header_last = start;
    let mut parens = 0i32;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '(' | '[' => parens += 1,
                ')' | ']' => parens -= 1,
                _ => {}
            }
        }
        header_last = idx;
        if parens <= 0 {
            break;
        }
    }

    let mut end = header_last;
    for (idx, line) in lines.iter().enumerate().skip(header_last + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if indent_width(line) <= base {
            if trimmed == "end" && indent_width(line) == base {
                return idx;
            }
            break;
        }
        end = idx;
    }
    end
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(language: Language, source: &str) -> CallGraph {
        PatternScanner::new(language).scan(source).unwrap()
    }

    #[test]
    fn go_functions_and_receivers() {
        let source = r#"
package main

func (s *Server) Handle(req Request) error {
	resp := s.client.Complete(req.Prompt)
	return render(resp) // log("ignored")
}

func render(resp string) error {
	fmt.Println("call(not)")
	return nil
}
"#;
        let graph = scan(Language::Go, source);

        let handle = graph.get("Handle").expect("Handle");
        assert_eq!((handle.start_line, handle.end_line), (4, 7));
        assert_eq!(handle.calls, vec!["client.Complete", "render"]);
        assert_eq!(graph.get("render").unwrap().calls, vec!["fmt.Println"]);
    }

    #[test]
    fn kotlin_expression_body() {
        let source = "\
fun greet(name: String) = format(name)

fun format(name: String): String {
    return name.uppercase()
}
";
        let graph = scan(Language::Kotlin, source);

        let greet = graph.get("greet").unwrap();
        assert_eq!((greet.start_line, greet.end_line), (1, 1));
        assert_eq!(greet.calls, vec!["format"]);
        assert_eq!(graph.get("format").unwrap().end_line, 5);
    }

    #[test]
    fn ruby_indentation_with_end_keyword() {
        let source = "\
class Agent
  def run(input)
    prompt = build(input)
    client.chat(prompt)
  end

  def build(input)
    input.strip
  end
end
";
        let graph = scan(Language::Ruby, source);

        let run = graph.get("run").unwrap();
        assert_eq!((run.start_line, run.end_line), (2, 5));
        assert_eq!(run.calls, vec!["build", "client.chat"]);
        assert_eq!(graph.get("build").unwrap().end_line, 9);
    }

    #[test]
    fn python_fallback_handles_multiline_signature() {
        let source = "\
def f(
    x,
):
    return g(x)

def g(x):
    return x
";
        let graph = scan(Language::Python, source);

        let f = graph.get("f").unwrap();
        assert_eq!((f.start_line, f.end_line), (1, 4));
        assert_eq!(f.calls, vec!["g"]);
    }

    #[test]
    fn nested_definitions_own_their_lines() {
        let source = "\
def outer():
    def inner():
        helper()
    inner()
";
        let graph = scan(Language::Python, source);

        assert_eq!(graph.get("outer").unwrap().calls, vec!["inner"]);
        assert_eq!(graph.get("inner").unwrap().calls, vec!["helper"]);
    }
}
