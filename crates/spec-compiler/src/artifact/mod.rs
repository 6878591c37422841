//! Compiles a [`TestSuite`] into its two executable representations.

pub mod fallback;
pub mod instruction;
pub mod policy;
pub mod refine;

use caseforge_core_types::TestSuite;
use serde::Serialize;
use tracing::info;

use crate::codeblock::fence;

pub use fallback::{actions_for_step, FallbackScript, FallbackSet, FallbackStep, PLACEHOLDER_ACTION};
pub use instruction::{render_case, AgentInstructionDocument, LoginPreamble};
pub use policy::{ExecutionPolicy, PolicyRule, PolicyRuleId, PolicySection, POLICY_VERSION};
pub use refine::FallbackRefiner;

pub const INSTRUCTIONS_BANNER: &str = "----------------AGENT INSTRUCTIONS-----------------";
pub const FALLBACK_BANNER: &str = "----------------FALLBACK SCRIPTS-----------------";

/// Both artifacts compiled from one suite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledArtifacts {
    pub instructions: AgentInstructionDocument,
    pub fallbacks: FallbackSet,
}

pub struct ArtifactCompiler {
    policy: ExecutionPolicy,
    preamble: LoginPreamble,
}

impl ArtifactCompiler {
    pub fn new(policy: ExecutionPolicy, preamble: LoginPreamble) -> Self {
        Self { policy, preamble }
    }

    pub fn compile(&self, suite: &TestSuite) -> CompiledArtifacts {
        let instructions = AgentInstructionDocument::render(&self.preamble, suite, &self.policy);
        let fallbacks = FallbackSet::outline(suite);
        let unresolved: usize = fallbacks.scripts().iter().map(FallbackScript::unresolved_steps).sum();
        info!(
            cases = suite.len(),
            policy_version = self.policy.version,
            unresolved_fallback_steps = unresolved,
            "artifacts compiled"
        );
        CompiledArtifacts {
            instructions,
            fallbacks,
        }
    }
}

/// Human-readable extraction log with banner-separated sections.
pub fn render_extraction_log(artifacts: &CompiledArtifacts) -> String {
    let mut out = String::new();
    out.push_str(INSTRUCTIONS_BANNER);
    out.push('\n');
    out.push_str(artifacts.instructions.as_str());
    out.push_str("\n\n");
    out.push_str(FALLBACK_BANNER);
    out.push_str("\n\n");
    let blocks: Vec<String> = artifacts
        .fallbacks
        .scripts()
        .iter()
        .map(|script| fence("text", &script.render()))
        .collect();
    out.push_str(&blocks.join("\n\n"));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codeblock::extract_code_blocks;
    use caseforge_core_types::{Category, TestCase};

    #[test]
    fn log_has_both_banners_and_one_block_per_case() {
        let suite = TestSuite::new(vec![
            TestCase::new(1, Category::Positive, "A", "", vec!["Click 'A'.".into()], "a"),
            TestCase::new(2, Category::Negative, "B", "", vec!["Click 'B'.".into()], "b"),
        ])
        .unwrap();
        let compiler = ArtifactCompiler::new(
            ExecutionPolicy::default(),
            LoginPreamble::new("https://app.example", "qa@example.com"),
        );
        let artifacts = compiler.compile(&suite);
        let log = render_extraction_log(&artifacts);

        assert!(log.starts_with(INSTRUCTIONS_BANNER));
        let fallback_at = log.find(FALLBACK_BANNER).unwrap();
        assert_eq!(extract_code_blocks(&log[fallback_at..], Some("text")).len(), 2);
    }
}
