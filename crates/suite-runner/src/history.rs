//! Structured audit trail of a run.

use std::fmt;

use action_primitives::{ActionReport, UiAction};
use caseforge_core_types::OutcomeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RecoveryAttempt;

/// Global run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    LoggingIn,
    ExecutingSuite,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotStarted => "not_started",
            RunState::LoggingIn => "logging_in",
            RunState::ExecutingSuite => "executing_suite",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub at: DateTime<Utc>,
}

/// Which artifact drove an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOrigin {
    Login,
    Primary,
    Fallback,
    Recovery,
    ReturnHome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub origin: ActionOrigin,
    /// 1-based step index; zero for actions outside the step list.
    pub step: usize,
    pub action: UiAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ActionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Path a case attempt took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPath {
    Primary,
    /// Fallback script substituted at `from_step` for the rest of the attempt.
    Fallback { from_step: usize, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseTrace {
    pub sequence: u32,
    pub title: String,
    pub attempts: u32,
    /// Highest 1-based step the attempt got to.
    pub steps_reached: usize,
    pub path: ExecutionPath,
    pub actions: Vec<ActionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryAttempt>,
    pub status: OutcomeStatus,
    pub details: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error from the return-to-home transition that followed this case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_home_error: Option<String>,
}

impl CaseTrace {
    pub fn begin(sequence: u32, title: impl Into<String>) -> Self {
        Self {
            sequence,
            title: title.into(),
            attempts: 0,
            steps_reached: 0,
            path: ExecutionPath::Primary,
            actions: Vec::new(),
            recovery: None,
            status: OutcomeStatus::Pending,
            details: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            return_home_error: None,
        }
    }

    pub fn reach(&mut self, step: usize) {
        self.steps_reached = self.steps_reached.max(step);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub run_id: Uuid,
    pub policy_version: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    pub transitions: Vec<StateTransition>,
    pub login_actions: Vec<ActionRecord>,
    pub cases: Vec<CaseTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunHistory {
    pub fn new(policy_version: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            policy_version,
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::NotStarted,
            transitions: Vec::new(),
            login_actions: Vec::new(),
            cases: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn transition(&mut self, to: RunState) {
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn case(&self, sequence: u32) -> Option<&CaseTrace> {
        self.cases.iter().find(|trace| trace.sequence == sequence)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_recorded_in_order() {
        let mut history = RunHistory::new(1);
        history.transition(RunState::LoggingIn);
        history.transition(RunState::Aborted);
        let pairs: Vec<(RunState, RunState)> = history
            .transitions
            .iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (RunState::NotStarted, RunState::LoggingIn),
                (RunState::LoggingIn, RunState::Aborted)
            ]
        );
        assert!(history.finished_at.is_some());
    }

    #[test]
    fn history_serializes_as_json() {
        let mut history = RunHistory::new(1);
        let mut trace = CaseTrace::begin(1, "Apply filter");
        trace.attempts += 1;
        trace.path = ExecutionPath::Fallback {
            from_step: 2,
            reason: "no such button".to_string(),
        };
        history.cases.push(trace);
        let json: serde_json::Value =
            serde_json::from_str(&history.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["state"], "not_started");
        assert_eq!(json["cases"][0]["path"]["kind"], "fallback");
        assert_eq!(json["cases"][0]["path"]["from_step"], 2);
        assert_eq!(json["cases"][0]["attempts"], 1);
    }
}
