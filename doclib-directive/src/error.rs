//! Error types for doclib-directive.

use std::path::PathBuf;

use thiserror::Error;

/// Why a line is not a directive. Callers skip such lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("expected at least 2 tokens, found {found}")]
    TooFewTokens { found: usize },

    #[error("token `{found}` does not match directive prefix `{expected}`")]
    PrefixMismatch { expected: String, found: String },
}

/// Errors raised by an agent handler while computing its effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// Auto fan-out needs the document inside the product's workspace tree.
    #[error("document path {path} is not inside the `{product}` workspace")]
    ProductNotInPath { path: PathBuf, product: String },

    /// `--include` named something outside the agent table.
    #[error("unknown agent kind `{0}` (expected auto, product or version)")]
    UnknownKind(String),
}
