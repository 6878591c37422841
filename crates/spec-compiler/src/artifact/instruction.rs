//! Agent instruction document.

use std::fmt;
use std::time::Duration;

use action_primitives::AnchorDescriptor;
use caseforge_core_types::{Category, TestCase, TestSuite};
use serde::Serialize;

use super::policy::ExecutionPolicy;

/// Session-establishment parameters shared by the instruction document and
/// the runner's login phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginPreamble {
    pub app_url: String,
    pub account: String,
    pub sso_trigger: String,
    pub mfa_prompt: String,
    pub mfa_denied: String,
    pub dashboard: AnchorDescriptor,
    pub mfa_timeout: Duration,
    pub mfa_poll_interval: Duration,
    pub dashboard_timeout: Duration,
}

impl LoginPreamble {
    pub fn new(app_url: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            account: account.into(),
            sso_trigger: "Log in with SSO".to_string(),
            mfa_prompt: "Approve sign in request".to_string(),
            mfa_denied: "Request denied".to_string(),
            dashboard: AnchorDescriptor::css("#dashboard"),
            mfa_timeout: Duration::from_secs(300),
            mfa_poll_interval: Duration::from_secs(5),
            dashboard_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_dashboard(mut self, dashboard: AnchorDescriptor) -> Self {
        self.dashboard = dashboard;
        self
    }

    pub fn render(&self) -> String {
        format!(
            "1. Execute the **Login Test Case** to access the application:\n\
             \x20   - Navigate to the login URL {url}.\n\
             \x20   - Click '{sso}'.\n\
             \x20   - Select the account {account}.\n\
             \x20   - Wait for Authenticator approval (if prompted) for **up to {mfa} seconds**.\n\
             \x20       - If the request is denied or approval times out, **log an error and stop execution**.\n\
             \x20   - Wait for **up to {dash} seconds** for the dashboard to fully load before proceeding.\n",
            url = self.app_url,
            sso = self.sso_trigger,
            account = self.account,
            mfa = self.mfa_timeout.as_secs(),
            dash = self.dashboard_timeout.as_secs(),
        )
    }
}

/// Declarative instruction artifact handed to the driving agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInstructionDocument {
    policy_version: u32,
    text: String,
}

impl AgentInstructionDocument {
    pub fn render(preamble: &LoginPreamble, suite: &TestSuite, policy: &ExecutionPolicy) -> Self {
        let mut text = String::new();
        text.push_str("**AI Agent Task: UI Testing Automation**\n");
        text.push_str("**Objective: Execute defined test cases on the application and summarize the results.**\n");
        text.push_str("---\n");
        text.push_str(&preamble.render());
        text.push_str("\n2. After successfully logging in, execute each test case **only ONCE** in the following order:\n");
        for category in Category::ALL {
            text.push_str(&format!("\n    **{}**\n", category.payload_key()));
            let mut any = false;
            for case in suite.category(category) {
                any = true;
                text.push_str(&render_case(case));
            }
            if !any {
                text.push_str("    (none)\n");
            }
        }
        text.push_str("---\n");
        text.push_str(&policy.render());
        text.push_str("---\n");

        Self {
            policy_version: policy.version,
            text,
        }
    }

    pub fn policy_version(&self) -> u32 {
        self.policy_version
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for AgentInstructionDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Per-case block; also used by the agent when prompting for a single case.
pub fn render_case(case: &TestCase) -> String {
    let mut out = format!("    {}. {}\n", case.sequence(), case.title());
    if !case.description().is_empty() {
        out.push_str(&format!("       Description: {}\n", case.description()));
    }
    out.push_str("       Steps:\n");
    for (index, step) in case.steps().iter().enumerate() {
        out.push_str(&format!("         {}. {}\n", index + 1, step));
    }
    out.push_str(&format!("       Expected result: {}\n", case.expected_result()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> TestSuite {
        TestSuite::new(vec![
            TestCase::new(
                1,
                Category::Positive,
                "Verify Navigation Bar",
                "Links redirect",
                vec!["Click 'Plans'.".to_string()],
                "Plans page opens",
            ),
            TestCase::new(
                2,
                Category::Negative,
                "Bulk modify without selection",
                "",
                vec!["Click 'Bulk modify'.".to_string()],
                "Button stays disabled",
            ),
        ])
        .unwrap()
    }

    #[test]
    fn document_orders_preamble_cases_and_policy() {
        let preamble = LoginPreamble::new("https://app.example", "qa@example.com");
        let doc = AgentInstructionDocument::render(&preamble, &suite(), &ExecutionPolicy::default());
        let text = doc.as_str();

        let login = text.find("Navigate to the login URL https://app.example.").unwrap();
        let positive = text.find("1. Verify Navigation Bar").unwrap();
        let negative = text.find("2. Bulk modify without selection").unwrap();
        let rules = text.find("**FAIL AND CONTINUE**").unwrap();
        assert!(login < positive && positive < negative && negative < rules);
        assert!(text.contains("Select the account qa@example.com."));
        assert!(text.contains("**up to 300 seconds**"));
        assert_eq!(doc.policy_version(), 1);
    }

    #[test]
    fn case_block_omits_empty_description() {
        let suite = suite();
        let block = render_case(&suite.cases()[1]);
        assert!(!block.contains("Description"));
        assert!(block.contains("1. Click 'Bulk modify'."));
    }
}
