//! Final per-case report.

use caseforge_core_types::{OutcomeStatus, TestSuite};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub sequence: u32,
    pub title: String,
    pub steps: Vec<String>,
    pub expected_result: String,
    pub status: OutcomeStatus,
    pub details: Vec<String>,
}

/// Ordered report; totals are derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub cases: Vec<CaseReport>,
}

impl TestReport {
    pub fn passed(&self) -> usize {
        self.count(OutcomeStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.cases.iter().filter(|case| case.status == status).count()
    }

    pub fn render_markdown(&self) -> String {
        let mut lines = vec!["## Test Case Results Summary".to_string()];
        for case in &self.cases {
            lines.push(format!("\n### {}", case.title));
            lines.push("- **Steps Executed:**".to_string());
            lines.extend(case.steps.iter().map(|step| format!("  - {step}")));
            lines.push(format!("- **Expected Result:** \n  - {}", case.expected_result));
            lines.push(format!("- **Actual Outcome Status:** \n  - {}", case.status));
            lines.push("- **Actual Outcome Details:**".to_string());
            lines.extend(case.details.iter().map(|detail| format!("  - {detail}")));
        }
        lines.join("\n")
    }
}

pub struct ResultAggregator;

impl ResultAggregator {
    /// Snapshot the suite in order. The suite is not modified.
    pub fn aggregate(suite: &TestSuite) -> TestReport {
        TestReport {
            cases: suite
                .cases()
                .iter()
                .map(|case| CaseReport {
                    sequence: case.sequence(),
                    title: case.title().to_string(),
                    steps: case.executed_steps().to_vec(),
                    expected_result: case.expected_result().to_string(),
                    status: case.status(),
                    details: case.details().to_vec(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseforge_core_types::{Category, TestCase};

    #[test]
    fn markdown_lists_every_case_in_order() {
        let mut failed = TestCase::new(
            2,
            Category::Negative,
            "Bulk modify without rows",
            "",
            vec!["Click 'Bulk modify'.".to_string()],
            "Button disabled",
        );
        failed.start_attempt().unwrap();
        failed.record_step_reached(1).unwrap();
        failed.record_detail("Step 1: Scrolled down the page").unwrap();
        failed.conclude(OutcomeStatus::Failed).unwrap();

        let mut passed = TestCase::new(
            1,
            Category::Positive,
            "Navigation bar",
            "",
            vec!["Click 'Plans'.".to_string()],
            "Plans page opens",
        );
        passed.start_attempt().unwrap();
        passed.conclude(OutcomeStatus::Passed).unwrap();

        let suite = TestSuite::new(vec![passed, failed]).unwrap();
        let report = ResultAggregator::aggregate(&suite);
        assert_eq!((report.passed(), report.failed(), report.total()), (1, 1, 2));

        let markdown = report.render_markdown();
        assert!(markdown.starts_with("## Test Case Results Summary\n\n### Navigation bar\n"));
        assert!(markdown.contains("- **Actual Outcome Status:** \n  - Failed"));
        assert!(markdown.ends_with("- **Actual Outcome Details:**\n  - Step 1: Scrolled down the page"));
        assert!(markdown.find("### Navigation bar") < markdown.find("### Bulk modify without rows"));
        assert!(markdown.contains("### Bulk modify without rows\n- **Steps Executed:**\n  - Click 'Bulk modify'.\n"));
    }

    #[test]
    fn only_reached_steps_are_listed_as_executed() {
        let mut case = TestCase::new(
            1,
            Category::Negative,
            "Apply filter",
            "",
            vec![
                "Open 'Plans'.".to_string(),
                "Click 'Filter'.".to_string(),
                "Click 'Apply'.".to_string(),
            ],
            "Rows filtered",
        );
        case.start_attempt().unwrap();
        case.record_step_reached(2).unwrap();
        case.conclude(OutcomeStatus::Failed).unwrap();

        let report = ResultAggregator::aggregate(&TestSuite::new(vec![case]).unwrap());
        assert_eq!(report.cases[0].steps, vec!["Open 'Plans'.", "Click 'Filter'."]);
        assert!(!report.render_markdown().contains("Click 'Apply'."));
    }
}
