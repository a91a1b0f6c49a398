use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of a file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Kotlin,
    Swift,
    Php,
    Ruby,
    Unknown,
}

/// How a function body is delimited for the pattern scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    Braces,
    Indentation,
}

/// Extraction strategy for a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Tree-sitter grammar available in-process
    Ast,
    /// Regular expressions over keyword and indentation layout
    Pattern(BlockLayout),
    Unsupported,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" => Self::Python,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "go" => Self::Go,
            "kt" | "kts" => Self::Kotlin,
            "swift" => Self::Swift,
            "php" => Self::Php,
            "rb" => Self::Ruby,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Unknown => "unknown",
        }
    }

    pub const fn strategy(self) -> ExtractionStrategy {
        match self {
            Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript | Self::Tsx => {
                ExtractionStrategy::Ast
            }
            Self::Go | Self::Kotlin | Self::Swift | Self::Php => {
                ExtractionStrategy::Pattern(BlockLayout::Braces)
            }
            Self::Ruby => ExtractionStrategy::Pattern(BlockLayout::Indentation),
            Self::Unknown => ExtractionStrategy::Unsupported,
        }
    }

    /// Layout used when the pattern scanner handles this language, either as
    /// its primary strategy or as a fallback for a failed AST parse
    pub const fn block_layout(self) -> BlockLayout {
        match self {
            Self::Python | Self::Ruby => BlockLayout::Indentation,
            _ => BlockLayout::Braces,
        }
    }

    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Option<tree_sitter::Language> {
        match self {
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            _ => None,
        }
    }

    /// Line comment prefix, stripped before pattern scanning
    pub const fn line_comment(self) -> &'static str {
        match self {
            Self::Python | Self::Ruby => "#",
            _ => "//",
        }
    }

    pub const fn is_javascript_family(self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript | Self::Tsx)
    }
}
