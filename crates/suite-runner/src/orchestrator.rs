//! Execution policy state machine.
//!
//! One session, one case in flight, one attempt per case. Per-case errors
//! become outcome details; only session-establishment failures abort.

use std::sync::Arc;

use action_primitives::{
    poll_for, poll_until, ActionDispatcher, ActionError, AnchorDescriptor, UiAction, UiDriver,
    WaitPolicy,
};
use caseforge_core_types::{OutcomeStatus, TestCase, TestSuite};
use chrono::Utc;
use spec_compiler::{ExecutionPolicy, FallbackSet, LoginPreamble};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentDecision, InstructionAgent, Verdict};
use crate::errors::{AuthFailure, CaseFailure, RecoveryAttempt, RunError};
use crate::history::{ActionOrigin, ActionRecord, CaseTrace, ExecutionPath, RunHistory, RunState};
use crate::report::{ResultAggregator, TestReport};

/// Final state of a run together with everything it produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub suite: TestSuite,
    pub history: RunHistory,
    pub error: Option<RunError>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn report(&self) -> TestReport {
        ResultAggregator::aggregate(&self.suite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MfaDecision {
    Approved,
    Denied,
}

pub struct ExecutionOrchestrator {
    driver: Arc<dyn UiDriver>,
    agent: Arc<dyn InstructionAgent>,
    dispatcher: ActionDispatcher,
    preamble: LoginPreamble,
    policy: ExecutionPolicy,
    home_url: String,
}

impl ExecutionOrchestrator {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        agent: Arc<dyn InstructionAgent>,
        preamble: LoginPreamble,
        policy: ExecutionPolicy,
        home_url: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            agent,
            dispatcher: ActionDispatcher::with_builtins(WaitPolicy::default()),
            preamble,
            policy,
            home_url: home_url.into(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: ActionDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Log in once, then attempt every case exactly once in suite order.
    pub async fn run(&self, mut suite: TestSuite, fallbacks: &FallbackSet) -> RunOutcome {
        let mut history = RunHistory::new(self.policy.version);

        self.enter(&mut history, RunState::LoggingIn);
        if let Err(err) = self.login(&mut history).await {
            return self.abort(suite, history, err);
        }

        self.enter(&mut history, RunState::ExecutingSuite);
        let mut carried: Option<String> = None;
        let mut fatal = None;
        for case in suite.cases_mut() {
            match self.execute_case(case, fallbacks, carried.take(), &mut history).await {
                Ok(next) => carried = next,
                Err(err) => {
                    fatal = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = fatal {
            return self.abort(suite, history, err);
        }
        if let Some(detail) = carried {
            warn!(%detail, "return to home failed after the last test case");
        }

        self.enter(&mut history, RunState::Completed);
        RunOutcome {
            state: RunState::Completed,
            suite,
            history,
            error: None,
        }
    }

    fn enter(&self, history: &mut RunHistory, state: RunState) {
        info!(from = %history.state, to = %state, "run state changed");
        history.transition(state);
    }

    fn abort(&self, suite: TestSuite, mut history: RunHistory, err: RunError) -> RunOutcome {
        error!(error = %err, "run aborted");
        history.abort_reason = Some(err.to_string());
        self.enter(&mut history, RunState::Aborted);
        RunOutcome {
            state: RunState::Aborted,
            suite,
            history,
            error: Some(err),
        }
    }

    async fn login(&self, history: &mut RunHistory) -> Result<(), RunError> {
        let preamble = &self.preamble;

        self.login_action(history, UiAction::Navigate {
            url: preamble.app_url.clone(),
        })
        .await
        .map_err(RunError::PageLoad)?;

        for label in [&preamble.sso_trigger, &preamble.account] {
            self.login_action(history, UiAction::click(AnchorDescriptor::text(label.clone())))
                .await
                .map_err(RunError::LoginAction)?;
        }

        match self.await_mfa().await? {
            Some(MfaDecision::Approved) => debug!("multi-factor approval observed"),
            Some(MfaDecision::Denied) => return Err(RunError::Authentication(AuthFailure::Denied)),
            None => {
                return Err(RunError::Authentication(AuthFailure::TimedOut {
                    waited_secs: preamble.mfa_timeout.as_secs(),
                }))
            }
        }

        match self
            .driver
            .wait_for(&preamble.dashboard, preamble.dashboard_timeout)
            .await
        {
            Ok(()) => {
                info!(account = %preamble.account, "session established");
                Ok(())
            }
            Err(err) if err.is_timeout() => Err(RunError::DashboardNotLoaded {
                timeout_secs: preamble.dashboard_timeout.as_secs(),
            }),
            Err(err) => Err(RunError::LoginAction(err)),
        }
    }

    async fn login_action(&self, history: &mut RunHistory, action: UiAction) -> Result<(), ActionError> {
        let result = self.dispatcher.dispatch(self.driver.as_ref(), &action).await;
        history.login_actions.push(ActionRecord {
            origin: ActionOrigin::Login,
            step: 0,
            action,
            report: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        result.map(|_| ())
    }

    /// Denied banner wins over the prompt; the prompt disappearing means approval.
    async fn await_mfa(&self) -> Result<Option<MfaDecision>, RunError> {
        let preamble = &self.preamble;
        let denied = AnchorDescriptor::partial_text(preamble.mfa_denied.clone());
        let prompt = AnchorDescriptor::partial_text(preamble.mfa_prompt.clone());
        let driver = self.driver.as_ref();

        poll_for(preamble.mfa_timeout, preamble.mfa_poll_interval, || {
            let (denied, prompt) = (&denied, &prompt);
            async move {
                let decision = if driver.query_visible(denied).await? {
                    Some(MfaDecision::Denied)
                } else if driver.query_visible(prompt).await? {
                    None
                } else {
                    Some(MfaDecision::Approved)
                };
                Ok::<_, ActionError>(decision)
            }
        })
        .await
        .map_err(RunError::LoginAction)
    }

    /// Returns the diagnostic to carry into the next case, if returning home failed.
    async fn execute_case(
        &self,
        case: &mut TestCase,
        fallbacks: &FallbackSet,
        carried: Option<String>,
        history: &mut RunHistory,
    ) -> Result<Option<String>, RunError> {
        let mut trace = CaseTrace::begin(case.sequence(), case.title());
        case.start_attempt()?;
        trace.attempts += 1;
        info!(case = case.sequence(), title = %case.title(), "test case started");

        if let Some(detail) = carried {
            case.record_detail(detail)?;
        }

        let result = self.attempt(case, fallbacks, &mut trace).await;
        case.record_step_reached(trace.steps_reached)?;
        let status = match result {
            Ok(()) => OutcomeStatus::Passed,
            Err(failure) => {
                warn!(case = case.sequence(), failure = %failure, "test case failed");
                for detail in failure.diagnostics() {
                    case.record_detail(detail)?;
                }
                if let CaseFailure::UnresponsiveControl { recovery, .. } = &failure {
                    trace.recovery = Some(recovery.clone());
                }
                OutcomeStatus::Failed
            }
        };
        case.conclude(status)?;
        info!(case = case.sequence(), %status, "test case finished");

        trace.status = status;
        trace.details = case.details().to_vec();
        trace.finished_at = Some(Utc::now());

        let carry = match self.return_home(&mut trace).await {
            Ok(()) => None,
            Err(err) => {
                let detail = format!(
                    "Return to home after test case {} failed: {}",
                    case.sequence(),
                    err
                );
                warn!(case = case.sequence(), error = %err, "return to home failed");
                trace.return_home_error = Some(detail.clone());
                Some(detail)
            }
        };
        history.cases.push(trace);
        Ok(carry)
    }

    async fn attempt(
        &self,
        case: &TestCase,
        fallbacks: &FallbackSet,
        trace: &mut CaseTrace,
    ) -> Result<(), CaseFailure> {
        let mut observations = Vec::new();

        for (offset, step) in case.steps().iter().enumerate() {
            let index = offset + 1;
            let decision = match self.agent.resolve_step(case, index, step).await {
                Ok(decision) => decision,
                Err(err) => AgentDecision::CannotProceed(err.to_string()),
            };
            match decision {
                AgentDecision::Act(actions) => {
                    trace.reach(index);
                    for action in &actions {
                        self.perform(ActionOrigin::Primary, index, action, trace, &mut observations)
                            .await?;
                    }
                }
                AgentDecision::CannotProceed(reason) => {
                    return self
                        .continue_with_fallback(case, index, reason, fallbacks, trace, observations)
                        .await;
                }
            }
        }

        self.judge(case, &observations).await
    }

    /// Finish the same attempt with the fallback script, from `from_step` on.
    ///
    /// Without a verification query the agent still judges the expected result.
    async fn continue_with_fallback(
        &self,
        case: &TestCase,
        from_step: usize,
        reason: String,
        fallbacks: &FallbackSet,
        trace: &mut CaseTrace,
        mut observations: Vec<String>,
    ) -> Result<(), CaseFailure> {
        let Some(script) = fallbacks.for_case(case) else {
            return Err(CaseFailure::Unresolved {
                step: from_step,
                reason,
            });
        };
        info!(case = case.sequence(), from_step, %reason, "substituting fallback script");
        trace.path = ExecutionPath::Fallback { from_step, reason };

        for step in script.steps_from(from_step) {
            trace.reach(step.index);
            for action in &step.actions {
                self.perform(ActionOrigin::Fallback, step.index, action, trace, &mut observations)
                    .await?;
            }
        }
        match &script.verification {
            Some(check) => {
                self.perform(ActionOrigin::Fallback, 0, check, trace, &mut observations)
                    .await
            }
            None => self.judge(case, &observations).await,
        }
    }

    async fn judge(&self, case: &TestCase, observations: &[String]) -> Result<(), CaseFailure> {
        match self.agent.judge_outcome(case, observations).await {
            Ok(Verdict::Matches) => Ok(()),
            Ok(Verdict::Mismatch(reason)) => Err(CaseFailure::OutcomeMismatch {
                detail: format!("expected \"{}\": {}", case.expected_result(), reason),
            }),
            Err(err) => Err(CaseFailure::OutcomeMismatch {
                detail: format!("verdict unavailable: {err}"),
            }),
        }
    }

    /// Dispatch one action and apply the forced-failure rules to its result.
    async fn perform(
        &self,
        origin: ActionOrigin,
        step: usize,
        action: &UiAction,
        trace: &mut CaseTrace,
        observations: &mut Vec<String>,
    ) -> Result<(), CaseFailure> {
        let report = match self.dispatcher.dispatch(self.driver.as_ref(), action).await {
            Ok(report) => report,
            Err(error) => {
                trace.actions.push(ActionRecord {
                    origin,
                    step,
                    action: action.clone(),
                    report: None,
                    error: Some(error.to_string()),
                });
                return Err(CaseFailure::UiAction { step, error });
            }
        };
        trace.actions.push(ActionRecord {
            origin,
            step,
            action: action.clone(),
            report: Some(report.clone()),
            error: None,
        });

        if let Some(signal) = report
            .post_signals
            .transient
            .iter()
            .copied()
            .find(|signal| self.policy.is_terminal_signal(*signal))
        {
            return Err(CaseFailure::TransientSignal { step, signal });
        }

        match action {
            UiAction::Click { target } if report.post_signals.is_inert() => {
                let recovery = self.recover(trace).await;
                return Err(CaseFailure::UnresponsiveControl {
                    step,
                    target: target.clone(),
                    recovery,
                });
            }
            UiAction::Query {
                target,
                expect_visible,
            } => {
                let visible = report.observed_visible.unwrap_or(false);
                if visible != *expect_visible {
                    return Err(CaseFailure::OutcomeMismatch {
                        detail: format!(
                            "{} expected {} but was {}",
                            target,
                            visibility(*expect_visible),
                            visibility(visible)
                        ),
                    });
                }
            }
            _ => {}
        }

        observations.push(format!("step {step}: {action}"));
        Ok(())
    }

    /// At most one recovery click; the original control is never touched.
    async fn recover(&self, trace: &mut CaseTrace) -> RecoveryAttempt {
        let driver = self.driver.as_ref();
        for label in &self.policy.recovery_labels {
            let anchor = AnchorDescriptor::text(label.clone());
            match driver.query_visible(&anchor).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!(%label, error = %err, "recovery affordance probe failed");
                    continue;
                }
            }

            let action = UiAction::click(anchor.clone());
            let result = self.dispatcher.dispatch(driver, &action).await;
            trace.actions.push(ActionRecord {
                origin: ActionOrigin::Recovery,
                step: 0,
                action,
                report: result.as_ref().ok().cloned(),
                error: result.as_ref().err().map(ToString::to_string),
            });
            if let Err(err) = result {
                return RecoveryAttempt::ClickFailed {
                    label: label.clone(),
                    error: err.to_string(),
                };
            }

            let policy = self.dispatcher.policy();
            let closed = poll_until(policy.dialog_close_timeout(), policy.poll_interval(), || {
                let anchor = &anchor;
                async move { driver.query_visible(anchor).await.map(|visible| !visible) }
            })
            .await
            .unwrap_or(false);
            return if closed {
                RecoveryAttempt::Closed {
                    label: label.clone(),
                }
            } else {
                RecoveryAttempt::StillOpen {
                    label: label.clone(),
                }
            };
        }
        RecoveryAttempt::NoAffordance {
            labels: self.policy.recovery_labels.clone(),
        }
    }

    async fn return_home(&self, trace: &mut CaseTrace) -> Result<(), ActionError> {
        let action = UiAction::Navigate {
            url: self.home_url.clone(),
        };
        let result = self.dispatcher.dispatch(self.driver.as_ref(), &action).await;
        trace.actions.push(ActionRecord {
            origin: ActionOrigin::ReturnHome,
            step: 0,
            action,
            report: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        result?;
        self.driver
            .wait_for(&self.preamble.dashboard, self.preamble.dashboard_timeout)
            .await
    }
}

fn visibility(visible: bool) -> &'static str {
    if visible {
        "visible"
    } else {
        "hidden"
    }
}
