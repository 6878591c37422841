use std::fmt;

use action_primitives::{ActionError, AnchorDescriptor, TransientSignal};
use caseforge_core_types::OutcomeError;
use serde::{Deserialize, Serialize};
use spec_compiler::CompletionError;
use thiserror::Error;

/// Why multi-factor approval did not produce a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFailure {
    /// The approval request was explicitly denied.
    Denied,
    /// No decision was observed within the approval window.
    TimedOut { waited_secs: u64 },
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::Denied => write!(f, "multi-factor approval was denied"),
            AuthFailure::TimedOut { waited_secs } => {
                write!(f, "multi-factor approval not granted within {waited_secs}s")
            }
        }
    }
}

/// Fatal errors: the run is aborted and no further case is attempted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    Authentication(AuthFailure),

    #[error("application page failed to load: {0}")]
    PageLoad(ActionError),

    #[error("login step failed: {0}")]
    LoginAction(ActionError),

    #[error("dashboard did not load within {timeout_secs}s")]
    DashboardNotLoaded { timeout_secs: u64 },

    #[error("outcome bookkeeping violated: {0}")]
    Outcome(#[from] OutcomeError),
}

/// Failures of the driving agent. The orchestrator treats them as
/// "cannot proceed" on the primary path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("unusable agent reply: {0}")]
    MalformedReply(String),
}

impl AgentError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReply(message.into())
    }
}

/// What happened to the single recovery action after an unresponsive click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecoveryAttempt {
    /// The affordance was clicked and disappeared within the dialog-close wait.
    Closed { label: String },
    /// The affordance was clicked but was still visible afterwards.
    StillOpen { label: String },
    /// Clicking the affordance raised an error.
    ClickFailed { label: String, error: String },
    /// None of the configured affordances was visible.
    NoAffordance { labels: Vec<String> },
}

impl fmt::Display for RecoveryAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryAttempt::Closed { label } => {
                write!(f, "Recovery: clicked '{label}' once and the dialog closed")
            }
            RecoveryAttempt::StillOpen { label } => {
                write!(f, "Recovery: clicked '{label}' once but the dialog stayed open")
            }
            RecoveryAttempt::ClickFailed { label, error } => {
                write!(f, "Recovery: clicking '{label}' failed: {error}")
            }
            RecoveryAttempt::NoAffordance { labels } => {
                write!(f, "Recovery: no {} affordance was visible", labels.join("/"))
            }
        }
    }
}

/// Reason a single case attempt ended in `Failed`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaseFailure {
    #[error("Step {step}: {error}")]
    UiAction { step: usize, error: ActionError },

    #[error("Step {step}: {signal}")]
    TransientSignal { step: usize, signal: TransientSignal },

    #[error("Step {step}: unresponsive control {target}: click produced no navigation or DOM change")]
    UnresponsiveControl {
        step: usize,
        target: AnchorDescriptor,
        recovery: RecoveryAttempt,
    },

    #[error("Outcome mismatch: {detail}")]
    OutcomeMismatch { detail: String },

    #[error("Step {step}: could not be resolved ({reason}) and no fallback script exists")]
    Unresolved { step: usize, reason: String },
}

impl CaseFailure {
    /// Diagnostics appended to the case's outcome details, in order.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            CaseFailure::UnresponsiveControl { recovery, .. } => {
                vec![self.to_string(), recovery.to_string()]
            }
            _ => vec![self.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresponsive_control_yields_two_diagnostics() {
        let failure = CaseFailure::UnresponsiveControl {
            step: 2,
            target: AnchorDescriptor::text("Save"),
            recovery: RecoveryAttempt::Closed {
                label: "Close".to_string(),
            },
        };
        let details = failure.diagnostics();
        assert_eq!(details.len(), 2);
        assert!(details[0].contains("unresponsive control text:Save"));
        assert_eq!(details[1], "Recovery: clicked 'Close' once and the dialog closed");
    }

    #[test]
    fn auth_failures_are_distinct() {
        assert_ne!(
            RunError::Authentication(AuthFailure::Denied).to_string(),
            RunError::Authentication(AuthFailure::TimedOut { waited_secs: 300 }).to_string()
        );
        assert_eq!(
            RunError::DashboardNotLoaded { timeout_secs: 10 }.to_string(),
            "dashboard did not load within 10s"
        );
    }
}
