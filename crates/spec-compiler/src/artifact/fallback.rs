//! Deterministic fallback procedures, one per test case.

use std::collections::HashMap;

use action_primitives::{AnchorDescriptor, UiAction};
use caseforge_core_types::{TestCase, TestSuite};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Custom action name for a step no heuristic could map to a UI action.
///
/// Not registered with the dispatcher, so running one fails the case.
pub const PLACEHOLDER_ACTION: &str = "placeholder";

const DEFAULT_WAIT_MS: u64 = 5_000;
/// Longest wait an outline will carry; the dispatcher bounds it further.
const MAX_WAIT_MS: u64 = 600_000;

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"‘“]([^'"‘’“”]+)['"’”]"#).expect("static regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s'\x22]+").expect("static regex"));
static SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:seconds?|secs?|s)\b").expect("static regex"));
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:step\s*)?\d+[.)]\s*").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackStep {
    /// 1-based position within the case's steps.
    pub index: usize,
    pub text: String,
    pub actions: Vec<UiAction>,
}

impl FallbackStep {
    pub fn has_placeholder(&self) -> bool {
        self.actions.iter().any(|action| {
            matches!(action, UiAction::Custom { name, .. } if name == PLACEHOLDER_ACTION)
        })
    }
}

/// Title-keyed procedure outline for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackScript {
    pub sequence: u32,
    pub title: String,
    pub steps: Vec<FallbackStep>,
    /// Final check derived from the expected result, when it names something visible.
    pub verification: Option<UiAction>,
}

impl FallbackScript {
    /// Outline a case's steps with the built-in heuristics.
    pub fn outline(case: &TestCase) -> Self {
        let steps = case
            .steps()
            .iter()
            .enumerate()
            .map(|(offset, text)| FallbackStep {
                index: offset + 1,
                text: text.clone(),
                actions: actions_for_step(text),
            })
            .collect();

        Self {
            sequence: case.sequence(),
            title: case.title().to_string(),
            steps,
            verification: verification_for(case.expected_result()),
        }
    }

    /// Steps from `index` (1-based) onwards.
    pub fn steps_from(&self, index: usize) -> &[FallbackStep] {
        let start = index.saturating_sub(1).min(self.steps.len());
        &self.steps[start..]
    }

    pub fn unresolved_steps(&self) -> usize {
        self.steps.iter().filter(|step| step.has_placeholder()).count()
    }

    pub fn render(&self) -> String {
        let mut out = format!("fallback \"{}\" (test case {})\n", self.title, self.sequence);
        for step in &self.steps {
            out.push_str(&format!("  {}. {}\n", step.index, step.text));
            for action in &step.actions {
                out.push_str(&format!("     - {}\n", action));
            }
        }
        match &self.verification {
            Some(check) => out.push_str(&format!("  verify: {}\n", check)),
            None => out.push_str("  verify: steps complete without failure\n"),
        }
        out
    }
}

/// Fallback scripts for a whole suite, looked up by title.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FallbackSet {
    scripts: Vec<FallbackScript>,
    #[serde(skip)]
    by_title: HashMap<String, usize>,
}

impl FallbackSet {
    pub fn outline(suite: &TestSuite) -> Self {
        Self::from_scripts(suite.cases().iter().map(FallbackScript::outline).collect())
    }

    pub fn from_scripts(scripts: Vec<FallbackScript>) -> Self {
        let by_title = scripts
            .iter()
            .enumerate()
            .map(|(position, script)| (script.title.clone(), position))
            .collect();
        Self { scripts, by_title }
    }

    pub fn get(&self, title: &str) -> Option<&FallbackScript> {
        self.by_title.get(title).and_then(|position| self.scripts.get(*position))
    }

    /// Title lookup, confirmed against the case's sequence number.
    pub fn for_case(&self, case: &TestCase) -> Option<&FallbackScript> {
        self.get(case.title())
            .filter(|script| script.sequence == case.sequence())
            .or_else(|| self.scripts.iter().find(|script| script.sequence == case.sequence()))
    }

    pub fn scripts(&self) -> &[FallbackScript] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn into_scripts(self) -> Vec<FallbackScript> {
        self.scripts
    }
}

/// Map one human-readable step to UI actions.
pub fn actions_for_step(step: &str) -> Vec<UiAction> {
    let body = LEADING_NUMBER.replace(step, "");
    let lowered = body.trim().to_lowercase();
    let verb = lowered
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| !word.is_empty())
        .unwrap_or_default();
    let quoted: Vec<String> = QUOTED
        .captures_iter(&body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    let actions = match verb {
        "navigate" | "open" | "go" | "access" | "visit" => {
            if let Some(url) = URL.find(&body) {
                let url = url.as_str().trim_end_matches(['.', ',', ')', ';']);
                vec![UiAction::Navigate {
                    url: url.to_string(),
                }]
            } else {
                quoted
                    .iter()
                    .map(|text| UiAction::click(AnchorDescriptor::partial_text(text.clone())))
                    .collect()
            }
        }
        "click" | "select" | "choose" | "press" | "tap" | "check" | "uncheck" | "toggle" => quoted
            .iter()
            .map(|text| UiAction::click(AnchorDescriptor::text(text.clone())))
            .collect(),
        "wait" => {
            let ms = SECONDS
                .captures(&body)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1_000).min(MAX_WAIT_MS));
            match quoted.first() {
                Some(target) => vec![UiAction::wait_for(
                    AnchorDescriptor::partial_text(target.clone()),
                    ms.unwrap_or(DEFAULT_WAIT_MS),
                )],
                None => vec![UiAction::Custom {
                    name: "pause".to_string(),
                    payload: json!({ "ms": ms.unwrap_or(DEFAULT_WAIT_MS) }),
                }],
            }
        }
        "verify" | "confirm" | "ensure" | "observe" | "validate" | "locate" | "see" => quoted
            .iter()
            .map(|text| UiAction::query(AnchorDescriptor::partial_text(text.clone())))
            .collect(),
        _ => Vec::new(),
    };

    if actions.is_empty() {
        vec![UiAction::Custom {
            name: PLACEHOLDER_ACTION.to_string(),
            payload: json!({ "step": step }),
        }]
    } else {
        actions
    }
}

fn verification_for(expected_result: &str) -> Option<UiAction> {
    QUOTED
        .captures(expected_result)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.is_empty())
        .map(|text| UiAction::query(AnchorDescriptor::partial_text(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseforge_core_types::Category;

    #[test]
    fn heuristics_map_common_verbs() {
        assert_eq!(
            actions_for_step("Click 'Bulk modify owners'."),
            vec![UiAction::click(AnchorDescriptor::text("Bulk modify owners"))]
        );
        assert_eq!(
            actions_for_step("2. Navigate to https://app.example/plans."),
            vec![UiAction::Navigate {
                url: "https://app.example/plans".to_string()
            }]
        );
        assert_eq!(
            actions_for_step("Wait for up to 3 seconds for \"Saved\" to appear."),
            vec![UiAction::wait_for(AnchorDescriptor::partial_text("Saved"), 3_000)]
        );
        assert_eq!(
            actions_for_step("Verify the 'Owner' column is visible."),
            vec![UiAction::query(AnchorDescriptor::partial_text("Owner"))]
        );
    }

    #[test]
    fn untargeted_wait_becomes_pause() {
        let actions = actions_for_step("Wait for up to 10 seconds.");
        assert_eq!(
            actions,
            vec![UiAction::Custom {
                name: "pause".to_string(),
                payload: json!({"ms": 10_000}),
            }]
        );
    }

    #[test]
    fn oversized_wait_is_capped() {
        assert_eq!(
            actions_for_step("Wait 99999999999999999 seconds for the page."),
            vec![UiAction::Custom {
                name: "pause".to_string(),
                payload: json!({"ms": MAX_WAIT_MS}),
            }]
        );
        assert_eq!(
            actions_for_step("Wait 900 seconds for 'Export ready'."),
            vec![UiAction::wait_for(AnchorDescriptor::partial_text("Export ready"), MAX_WAIT_MS)]
        );
    }

    #[test]
    fn unmapped_step_gets_placeholder() {
        let actions = actions_for_step("Drag the first row below the second.");
        assert!(matches!(
            &actions[..],
            [UiAction::Custom { name, .. }] if name == PLACEHOLDER_ACTION
        ));
    }

    #[test]
    fn set_is_title_keyed() {
        let suite = TestSuite::new(vec![TestCase::new(
            1,
            Category::Positive,
            "Apply filter",
            "",
            vec!["Click 'Apply'.".to_string(), "Frobnicate.".to_string()],
            "The 'Filtered' badge is shown",
        )])
        .unwrap();
        let set = FallbackSet::outline(&suite);
        let script = set.for_case(&suite.cases()[0]).unwrap();
        assert_eq!(script.title, "Apply filter");
        assert_eq!(script.unresolved_steps(), 1);
        assert_eq!(script.steps_from(2).len(), 1);
        assert_eq!(
            script.verification,
            Some(UiAction::query(AnchorDescriptor::partial_text("Filtered")))
        );
        assert!(script.render().contains("  1. Click 'Apply'.\n     - click text:Apply\n"));
        assert!(set.get("missing").is_none());
    }
}
