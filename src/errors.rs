//! Errors raised while turning configuration into runtime components.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("login.dashboard_selector is invalid: {0}")]
    Selector(String),

    #[error("environment variable {0} holding the completion service key is not set")]
    MissingSecret(String),
}

impl ConfigError {
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }

    pub fn zero(field: &'static str) -> Self {
        Self::Zero { field }
    }
}
