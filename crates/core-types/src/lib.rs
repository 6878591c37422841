//! Shared test-case model for the caseforge compiler and runner.
//!
//! A [`TestSuite`] is built once per run by the compiler and is frozen
//! afterwards, except for the outcome of each [`TestCase`], which the
//! runner settles exactly once during that case's single attempt.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when the outcome lifecycle of a test case is violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("test case {sequence} has already been attempted")]
    AlreadyAttempted { sequence: u32 },

    #[error("test case {sequence} is not running")]
    NotRunning { sequence: u32 },

    #[error("test case {sequence} cannot conclude with a pending status")]
    NotTerminal { sequence: u32 },
}

/// Errors raised when assembling a suite whose numbering is inconsistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuiteError {
    #[error("expected sequence number {expected}, found {found}")]
    NonContiguous { expected: u32, found: u32 },

    #[error("positive test case {sequence} appears after a negative test case")]
    CategoryOrder { sequence: u32 },
}

/// Category a test case was authored under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Positive,
    Negative,
}

impl Category {
    /// Categories in execution order.
    pub const ALL: [Category; 2] = [Category::Positive, Category::Negative];

    /// Key used for the category in the structured JSON payload.
    pub fn payload_key(self) -> &'static str {
        match self {
            Category::Positive => "Positive Test Cases",
            Category::Negative => "Negative Test Cases",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Positive => write!(f, "Positive"),
            Category::Negative => write!(f, "Negative"),
        }
    }
}

/// Recorded status of a test case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

impl OutcomeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OutcomeStatus::Pending)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Pending => write!(f, "Pending"),
            OutcomeStatus::Passed => write!(f, "Passed"),
            OutcomeStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// A single compiled UI test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    sequence: u32,
    category: Category,
    title: String,
    description: String,
    steps: Vec<String>,
    expected_result: String,
    status: OutcomeStatus,
    details: Vec<String>,
    /// Highest 1-based step the attempt got to.
    #[serde(default)]
    steps_reached: usize,
    #[serde(skip)]
    running: bool,
}

impl TestCase {
    pub fn new(
        sequence: u32,
        category: Category,
        title: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<String>,
        expected_result: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            category,
            title: title.into(),
            description: description.into(),
            steps,
            expected_result: expected_result.into(),
            status: OutcomeStatus::Pending,
            details: Vec::new(),
            steps_reached: 0,
            running: false,
        }
    }

    /// Replace the step list. Only meaningful before the suite is frozen.
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn expected_result(&self) -> &str {
        &self.expected_result
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Steps the attempt actually got to, in order.
    pub fn executed_steps(&self) -> &[String] {
        &self.steps[..self.steps_reached.min(self.steps.len())]
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Move the case from `Pending` into its one and only attempt.
    pub fn start_attempt(&mut self) -> Result<(), OutcomeError> {
        if self.running || self.status.is_terminal() {
            return Err(OutcomeError::AlreadyAttempted {
                sequence: self.sequence,
            });
        }
        self.running = true;
        Ok(())
    }

    /// Append a diagnostic while the attempt is in flight.
    pub fn record_detail(&mut self, detail: impl Into<String>) -> Result<(), OutcomeError> {
        if !self.running {
            return Err(OutcomeError::NotRunning {
                sequence: self.sequence,
            });
        }
        self.details.push(detail.into());
        Ok(())
    }

    /// Note that the attempt got as far as `step` (1-based). Never moves backwards.
    pub fn record_step_reached(&mut self, step: usize) -> Result<(), OutcomeError> {
        if !self.running {
            return Err(OutcomeError::NotRunning {
                sequence: self.sequence,
            });
        }
        self.steps_reached = self.steps_reached.max(step.min(self.steps.len()));
        Ok(())
    }

    /// Settle the attempt. The status is never mutated again afterwards.
    pub fn conclude(&mut self, status: OutcomeStatus) -> Result<(), OutcomeError> {
        if !self.running {
            return Err(OutcomeError::NotRunning {
                sequence: self.sequence,
            });
        }
        if !status.is_terminal() {
            return Err(OutcomeError::NotTerminal {
                sequence: self.sequence,
            });
        }
        self.status = status;
        self.running = false;
        Ok(())
    }
}

/// Ordered collection of test cases, positive cases first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    cases: Vec<TestCase>,
}

impl TestSuite {
    /// Build a suite, checking that numbering is `1..=N` and that every
    /// positive case precedes every negative case.
    pub fn new(cases: Vec<TestCase>) -> Result<Self, SuiteError> {
        let mut seen_negative = false;
        for (index, case) in cases.iter().enumerate() {
            let expected = index as u32 + 1;
            if case.sequence != expected {
                return Err(SuiteError::NonContiguous {
                    expected,
                    found: case.sequence,
                });
            }
            match case.category {
                Category::Negative => seen_negative = true,
                Category::Positive if seen_negative => {
                    return Err(SuiteError::CategoryOrder {
                        sequence: case.sequence,
                    })
                }
                Category::Positive => {}
            }
        }
        Ok(Self { cases })
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Mutable access for the runner, which only touches outcome fields.
    pub fn cases_mut(&mut self) -> &mut [TestCase] {
        &mut self.cases
    }

    pub fn category(&self, category: Category) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(move |case| case.category == category)
    }

    pub fn positive(&self) -> impl Iterator<Item = &TestCase> {
        self.category(Category::Positive)
    }

    pub fn negative(&self) -> impl Iterator<Item = &TestCase> {
        self.category(Category::Negative)
    }

    pub fn get(&self, sequence: u32) -> Option<&TestCase> {
        self.cases.iter().find(|case| case.sequence == sequence)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// True once every case carries a terminal status.
    pub fn is_settled(&self) -> bool {
        self.cases.iter().all(|case| case.status.is_terminal())
    }

    pub fn into_cases(self) -> Vec<TestCase> {
        self.cases
    }

    /// Rewrite every case's steps. Numbering and categories are untouched.
    pub fn map_steps<F>(self, mut rewrite: F) -> Self
    where
        F: FnMut(&[String]) -> Vec<String>,
    {
        let cases = self
            .cases
            .into_iter()
            .map(|case| {
                let steps = rewrite(case.steps());
                case.with_steps(steps)
            })
            .collect();
        Self { cases }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(sequence: u32, category: Category) -> TestCase {
        TestCase::new(
            sequence,
            category,
            format!("case {sequence}"),
            "desc",
            vec!["step".to_string()],
            "expected",
        )
    }

    #[test]
    fn outcome_settles_exactly_once() {
        let mut case = case(1, Category::Positive);
        assert_eq!(case.status(), OutcomeStatus::Pending);
        assert!(case.details().is_empty());

        case.start_attempt().unwrap();
        case.record_detail("clicked Apply").unwrap();
        case.conclude(OutcomeStatus::Failed).unwrap();

        assert_eq!(case.status(), OutcomeStatus::Failed);
        assert_eq!(
            case.start_attempt(),
            Err(OutcomeError::AlreadyAttempted { sequence: 1 })
        );
        assert_eq!(
            case.conclude(OutcomeStatus::Passed),
            Err(OutcomeError::NotRunning { sequence: 1 })
        );
        assert_eq!(case.status(), OutcomeStatus::Failed);
    }

    #[test]
    fn details_require_running_attempt() {
        let mut case = case(3, Category::Negative);
        assert_eq!(
            case.record_detail("too early"),
            Err(OutcomeError::NotRunning { sequence: 3 })
        );
        case.start_attempt().unwrap();
        assert_eq!(
            case.conclude(OutcomeStatus::Pending),
            Err(OutcomeError::NotTerminal { sequence: 3 })
        );
        assert!(case.is_running());
    }

    #[test]
    fn suite_rejects_gaps_and_category_inversion() {
        let gap = TestSuite::new(vec![case(1, Category::Positive), case(3, Category::Negative)]);
        assert_eq!(
            gap.unwrap_err(),
            SuiteError::NonContiguous {
                expected: 2,
                found: 3
            }
        );

        let inverted =
            TestSuite::new(vec![case(1, Category::Negative), case(2, Category::Positive)]);
        assert_eq!(
            inverted.unwrap_err(),
            SuiteError::CategoryOrder { sequence: 2 }
        );
    }

    #[test]
    fn suite_partitions_by_category() {
        let suite = TestSuite::new(vec![
            case(1, Category::Positive),
            case(2, Category::Positive),
            case(3, Category::Negative),
        ])
        .unwrap();

        let positive: Vec<u32> = suite.positive().map(TestCase::sequence).collect();
        let negative: Vec<u32> = suite.negative().map(TestCase::sequence).collect();
        assert_eq!(positive, vec![1, 2]);
        assert_eq!(negative, vec![3]);
        assert!(!suite.is_settled());
    }

    #[test]
    fn executed_steps_follow_the_furthest_step() {
        let mut case = TestCase::new(
            1,
            Category::Positive,
            "Bulk modify",
            "",
            vec!["one".to_string(), "two".to_string(), "three".to_string()],
            "done",
        );
        assert!(case.executed_steps().is_empty());
        assert_eq!(
            case.record_step_reached(1),
            Err(OutcomeError::NotRunning { sequence: 1 })
        );

        case.start_attempt().unwrap();
        case.record_step_reached(2).unwrap();
        case.record_step_reached(1).unwrap();
        assert_eq!(case.executed_steps(), ["one", "two"]);
        case.record_step_reached(9).unwrap();
        assert_eq!(case.executed_steps().len(), 3);
    }

    #[test]
    fn running_flag_is_not_serialized() {
        let mut case = case(1, Category::Positive);
        case.start_attempt().unwrap();
        let json = serde_json::to_value(&case).unwrap();
        assert!(json.get("running").is_none());
        assert_eq!(json["status"], "Pending");
    }
}
