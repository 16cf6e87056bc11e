//! Error types for sql-blocks.

use thiserror::Error;

/// The main error type for building, parsing and rewriting queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A builder was configured with something it cannot apply.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two queries were combined but no binding exists in either direction.
    #[error("No relationship found between {left} and {right}")]
    RelationshipNotFound { left: String, right: String },

    /// Input text matches no known syntax.
    #[error("Unknown dialect for input: '{0}'")]
    UnknownDialect(String),

    /// Unrecognized function token in a pattern field expression.
    #[error("Unknown function: '{0}'")]
    UnknownFunction(String),

    /// A pattern edge has no field left to act as join key.
    #[error("Missing key: no candidate field to join {0}")]
    MissingKey(String),

    /// Malformed text in an otherwise recognized syntax.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// IO error while reading a settings file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid settings file.
    #[error("Settings error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl QueryError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build an `UnknownDialect` error carrying a short prefix of the input.
    pub fn unknown_dialect(text: &str) -> Self {
        let snippet: String = text.chars().take(40).collect();
        Self::UnknownDialect(snippet)
    }
}

/// Result type alias for sql-blocks operations.
pub type QueryResult<T> = Result<T, QueryError>;
