use caseforge_core_types::TestSuite;

/// Step made redundant by the shared login preamble.
pub const BOILERPLATE_STEP: &str = "Open the application URL.";

/// Drop exact boilerplate matches, keeping the order of everything else.
pub fn filter_steps(steps: &[String]) -> Vec<String> {
    steps
        .iter()
        .filter(|step| step.as_str() != BOILERPLATE_STEP)
        .cloned()
        .collect()
}

/// Apply [`filter_steps`] to every case of the suite.
pub fn filter_suite(suite: TestSuite) -> TestSuite {
    suite.map_steps(filter_steps)
}
