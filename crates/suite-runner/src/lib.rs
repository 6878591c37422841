//! Suite runner
//!
//! Drives a compiled [`TestSuite`](caseforge_core_types::TestSuite)
//! against a [`UiDriver`](action_primitives::UiDriver) under the
//! single-attempt, fail-and-continue execution policy, and aggregates
//! the outcomes into a report.

pub mod agent;
pub mod errors;
pub mod history;
pub mod orchestrator;
pub mod report;

pub use agent::{AgentDecision, CompletionAgent, InstructionAgent, Verdict};
pub use errors::{AgentError, AuthFailure, CaseFailure, RecoveryAttempt, RunError};
pub use history::{
    ActionOrigin, ActionRecord, CaseTrace, ExecutionPath, RunHistory, RunState, StateTransition,
};
pub use orchestrator::{ExecutionOrchestrator, RunOutcome};
pub use report::{CaseReport, ResultAggregator, TestReport};
