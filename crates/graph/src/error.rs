use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Function `{function}` is listed in the diff but missing from the new call graph of {path}")]
    InconsistentDiff { path: String, function: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GraphError {
    pub fn inconsistent_diff(path: &str, function: &str) -> Self {
        Self::InconsistentDiff {
            path: path.to_string(),
            function: function.to_string(),
        }
    }
}
