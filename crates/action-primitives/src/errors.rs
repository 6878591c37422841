//! Error types for UI actions

use thiserror::Error;

/// Failure modes of a single UI action.
///
/// Every variant is terminal for the test case that issued the action;
/// nothing in this crate retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Selector did not match any element
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Bounded wait elapsed before the condition was observed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Element exists but cannot receive the interaction
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Page could not be loaded
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Custom action name missing from the dispatch table
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Selector descriptor could not be parsed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Transport or protocol failure talking to the browser
    #[error("Driver error: {0}")]
    Driver(String),
}

impl ActionError {
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound(target.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// True for failures caused by a bounded wait elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionError::Timeout(_))
    }
}
