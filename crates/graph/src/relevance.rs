//! Cheap textual detection of LLM workflow code.
//!
//! Decides which files are worth sending to the classifier and which
//! framework hint goes along with them.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use std::path::Path;

/// Extensions the classifier understands
const ANALYZABLE_EXTENSIONS: &[&str] = &["py", "ts", "js", "tsx", "jsx"];

static LLM_CLIENTS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"from\s+openai\s+import",
        r"import\s+openai",
        r"OpenAI\s*\(",
        r#"import\s+.*from\s+['"]openai['"]"#,
        r"from\s+anthropic\s+import",
        r"import\s+anthropic",
        r"Anthropic\s*\(",
        r#"import\s+.*from\s+['"]@anthropic-ai/sdk['"]"#,
        r"import\s+google\.generativeai",
        r"genai\.configure",
        r"genai\.GenerativeModel",
        r#"from\s+['"]@google/generative-ai['"]"#,
        r"GoogleGenerativeAI",
        r"from\s+groq\s+import",
        r"import\s+groq",
        r"Groq\s*\(",
        r#"import\s+.*from\s+['"]groq-sdk['"]"#,
        r"from\s+ollama\s+import",
        r"import\s+ollama",
        r#"import\s+.*from\s+['"]ollama['"]"#,
        r"import\s+cohere",
        r"cohere\.Client",
        r#"from\s+['"]cohere-ai['"]"#,
        r"from\s+huggingface_hub\s+import",
        r"InferenceClient",
        r#"from\s+['"]@huggingface/inference['"]"#,
    ])
});

static LLM_CALLS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"\.chat\.completions\.create",
        r"\.completions\.create",
        r"\.messages\.create",
        r"\.generate_content",
        r"\.generateContent",
        r"\.chat\(",
        r"\.generate\(",
    ])
});

/// Workflow frameworks, checked in order
static FRAMEWORKS: Lazy<Vec<(&'static str, RegexSet)>> = Lazy::new(|| {
    vec![
        (
            "langgraph",
            set(&[
                r"from\s+langgraph",
                r#"import\s+.*from\s+['"]@langchain/langgraph['"]"#,
                r"StateGraph|MessageGraph",
            ]),
        ),
        (
            "mastra",
            set(&[
                r"from\s+mastra",
                r#"import\s+.*from\s+['"]mastra['"]"#,
                r"@mastra/",
            ]),
        ),
        (
            "langchain",
            set(&[
                r"from\s+langchain",
                r#"import\s+.*from\s+['"]@langchain"#,
                r"LLMChain|SequentialChain",
            ]),
        ),
        (
            "crewai",
            set(&[
                r"from\s+crewai",
                r#"import\s+.*from\s+['"]crewai['"]"#,
                r"Crew\s*\(",
            ]),
        ),
    ]
});

/// Client libraries named when no framework is in use
static CLIENTS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("openai", r"from\s+openai\s+import|import\s+openai|OpenAI\s*\("),
        ("anthropic", r"from\s+anthropic\s+import|import\s+anthropic|Anthropic\s*\("),
        ("gemini", r"import\s+google\.generativeai|genai\.|GoogleGenerativeAI"),
        ("groq", r"from\s+groq\s+import|import\s+groq|Groq\s*\("),
        ("ollama", r"from\s+ollama\s+import|import\s+ollama"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("client pattern compiles")))
    .collect()
});

fn set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).expect("relevance patterns compile")
}

fn uses_framework(code: &str) -> Option<&'static str> {
    FRAMEWORKS
        .iter()
        .find(|(_, patterns)| patterns.is_match(code))
        .map(|(name, _)| *name)
}

/// Whether `code` looks like part of an LLM pipeline: an LLM client together
/// with an LLM API call, or any workflow framework
#[must_use]
pub fn detect_workflow(code: &str) -> bool {
    let client_and_call = LLM_CLIENTS.is_match(code) && LLM_CALLS.is_match(code);
    client_and_call || uses_framework(code).is_some()
}

/// Framework (or client library) a file is built on, used as a hint for
/// the classifier
#[must_use]
pub fn detect_framework(code: &str) -> Option<&'static str> {
    if let Some(framework) = uses_framework(code) {
        return Some(framework);
    }
    if let Some((client, _)) = CLIENTS.iter().find(|(_, re)| re.is_match(code)) {
        return Some(client);
    }
    detect_workflow(code).then_some("generic-llm")
}

/// Whether the classifier accepts files of this kind
pub fn should_analyze_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ANALYZABLE_EXTENSIONS.contains(&ext))
}
