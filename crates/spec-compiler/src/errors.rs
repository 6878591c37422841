use caseforge_core_types::{Category, SuiteError};
use thiserror::Error;

/// Fatal errors raised while compiling a test document.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Required textual markers are absent from the source document.
    #[error("test case section not found: {0}")]
    Extraction(String),

    /// The completion service produced no parseable structured payload.
    #[error("malformed completion response: {reason}")]
    MalformedResponse { reason: String, excerpt: String },

    /// The completion service could not be reached or reported an error.
    #[error("completion service failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("inconsistent suite numbering: {0}")]
    Suite(#[from] SuiteError),
}

impl CompileError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Malformed response keeping a short excerpt of the offending text.
    pub fn malformed(reason: impl Into<String>, text: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            excerpt: text.chars().take(120).collect(),
        }
    }
}

/// Local error for a single raw record; the record is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{category} record #{index} is not an object")]
    NotAnObject { category: Category, index: usize },

    #[error("{category} record #{index} is missing required field '{field}'")]
    MissingField {
        category: Category,
        index: usize,
        field: &'static str,
    },

    #[error("{category} record #{index} field '{field}' has the wrong type")]
    WrongType {
        category: Category,
        index: usize,
        field: &'static str,
    },

    #[error("{category} record #{index} has an empty name")]
    EmptyTitle { category: Category, index: usize },
}

/// Failure reported by a completion service implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("completion contained no text")]
    Empty,
}

impl CompletionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }
}
