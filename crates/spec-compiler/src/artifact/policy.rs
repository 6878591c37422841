//! Versioned execution policy rule table.
//!
//! The runner enforces these rules directly; the instruction document only
//! renders them, so editing rendered text never changes behaviour.

use std::fmt;

use action_primitives::TransientSignal;
use serde::{Deserialize, Serialize};

/// Bumped whenever a rule's meaning changes.
pub const POLICY_VERSION: u32 = 1;

/// Recovery affordances tried, in order, after an unresponsive click.
pub const DEFAULT_RECOVERY_LABELS: [&str; 3] = ["Cancel", "Close", "Exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRuleId {
    DashboardGate,
    SingleAttempt,
    StrictStepOrder,
    FailFast,
    ReturnHome,
    OutcomeCheck,
    NoRetry,
    NoUninstructedAction,
    TransientSignalTerminal,
    UnresponsiveControl,
    NoRetryOriginalControl,
    StopAfterSuite,
}

/// Heading a rule is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySection {
    Execution,
    ImportantRules,
    FailAndContinue,
}

impl PolicySection {
    pub const ORDER: [PolicySection; 3] = [
        PolicySection::Execution,
        PolicySection::ImportantRules,
        PolicySection::FailAndContinue,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            PolicySection::Execution => "EXECUTION ORDER",
            PolicySection::ImportantRules => "IMPORTANT RULES",
            PolicySection::FailAndContinue => "FAIL AND CONTINUE",
        }
    }
}

impl fmt::Display for PolicySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: PolicyRuleId,
    pub section: PolicySection,
    pub text: String,
}

impl PolicyRule {
    fn new(id: PolicyRuleId, section: PolicySection, text: impl Into<String>) -> Self {
        Self {
            id,
            section,
            text: text.into(),
        }
    }
}

/// The single-attempt, fail-and-continue policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    pub version: u32,
    pub rules: Vec<PolicyRule>,
    pub transient_signals: Vec<TransientSignal>,
    pub recovery_labels: Vec<String>,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::standard(DEFAULT_RECOVERY_LABELS.iter().map(|label| label.to_string()).collect())
    }
}

impl ExecutionPolicy {
    /// Standard rule table with the given recovery affordance labels.
    pub fn standard(recovery_labels: Vec<String>) -> Self {
        use PolicyRuleId::*;
        use PolicySection::*;

        let transient_signals = vec![
            TransientSignal::NewElementAppeared,
            TransientSignal::ElementIndexChanged,
            TransientSignal::ScrolledUp,
            TransientSignal::ScrolledDown,
        ];
        let signal_list = transient_signals
            .iter()
            .map(|signal| format!("\"{signal}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let labels = join_alternatives(&recovery_labels);

        let rules = vec![
            PolicyRule::new(DashboardGate, Execution, "Ensure the dashboard actually loads before executing the test cases."),
            PolicyRule::new(SingleAttempt, Execution, "Execute each test case exactly once, Positive Test Cases first, then Negative Test Cases."),
            PolicyRule::new(StrictStepOrder, Execution, "Execute the steps of a test case strictly in the order given. Do not skip, reorder or infer steps."),
            PolicyRule::new(OutcomeCheck, Execution, "Check whether the actual outcome matches the expected result to decide Passed or Failed."),
            PolicyRule::new(ReturnHome, Execution, "After a test case passes or fails, ALWAYS navigate back to the main dashboard or Home page before starting the next test case."),
            PolicyRule::new(StopAfterSuite, Execution, "After every test case has run once, stop execution and summarize each result with its status and failure details."),
            PolicyRule::new(NoRetry, ImportantRules, "DO NOT retry or reattempt any test case or step under any circumstances."),
            PolicyRule::new(NoRetry, ImportantRules, "DO NOT loop or retry actions because of page changes, DOM updates, element index changes or scrolling."),
            PolicyRule::new(NoUninstructedAction, ImportantRules, "DO NOT take any action unless explicitly instructed."),
            PolicyRule::new(FailFast, FailAndContinue, "If a test case fails at any step, immediately stop it, mark it FAILED and move on to the NEXT test case."),
            PolicyRule::new(TransientSignalTerminal, FailAndContinue, format!("If messages like {signal_list} appear, immediately stop the current test case, mark it FAILED and move on. Treat them as terminal failures.")),
            PolicyRule::new(UnresponsiveControl, FailAndContinue, format!("If a button is clicked but nothing visibly changes (no navigation, no update, the dialog stays open), click a {labels} button once if visible, then mark the test case FAILED and move on.")),
            PolicyRule::new(NoRetryOriginalControl, FailAndContinue, "DO NOT retry the original button, even if it remains on screen."),
        ];

        Self {
            version: POLICY_VERSION,
            rules,
            transient_signals,
            recovery_labels,
        }
    }

    pub fn is_terminal_signal(&self, signal: TransientSignal) -> bool {
        self.transient_signals.contains(&signal)
    }

    /// First rule with the given id.
    pub fn rule(&self, id: PolicyRuleId) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn section(&self, section: PolicySection) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter().filter(move |rule| rule.section == section)
    }

    /// Natural-language rendering, grouped by section.
    pub fn render(&self) -> String {
        let mut out = format!("Execution policy v{}\n", self.version);
        for section in PolicySection::ORDER {
            let mut rules = self.section(section).peekable();
            if rules.peek().is_none() {
                continue;
            }
            out.push_str(&format!("\n**{}**\n", section.heading()));
            for rule in rules {
                out.push_str(&format!("    - {}\n", rule.text));
            }
        }
        out
    }
}

fn join_alternatives(labels: &[String]) -> String {
    match labels {
        [] => "Close".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}
