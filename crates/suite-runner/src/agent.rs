//! The primary, instruction-driven path.

use std::sync::Arc;

use action_primitives::UiAction;
use async_trait::async_trait;
use caseforge_core_types::TestCase;
use serde::Deserialize;
use spec_compiler::artifact::render_case;
use spec_compiler::{isolate_json_payload, CompletionRequest, CompletionService};
use tracing::{debug, info};

use crate::errors::AgentError;

/// Agent answer for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    /// Perform these actions, in order.
    Act(Vec<UiAction>),
    /// The agent cannot map the step to actions; the fallback script takes over.
    CannotProceed(String),
}

/// Agent judgement of the observed outcome against the expected result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matches,
    Mismatch(String),
}

/// Driving agent consulted once per step and once per case verdict.
#[async_trait]
pub trait InstructionAgent: Send + Sync {
    async fn resolve_step(
        &self,
        case: &TestCase,
        step_index: usize,
        step: &str,
    ) -> Result<AgentDecision, AgentError>;

    async fn judge_outcome(
        &self,
        case: &TestCase,
        observations: &[String],
    ) -> Result<Verdict, AgentError>;
}

#[derive(Debug, Deserialize)]
struct StepReply {
    #[serde(default)]
    actions: Vec<UiAction>,
    #[serde(default)]
    cannot_proceed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictReply {
    passed: bool,
    #[serde(default)]
    reason: String,
}

/// [`InstructionAgent`] backed by a completion service and the compiled
/// instruction document.
pub struct CompletionAgent {
    service: Arc<dyn CompletionService>,
    instructions: String,
    max_tokens: u32,
}

impl CompletionAgent {
    pub fn new(service: Arc<dyn CompletionService>, instructions: impl Into<String>) -> Self {
        Self {
            service,
            instructions: instructions.into(),
            max_tokens: spec_compiler::llm_provider::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn ask(&self, prompt: String) -> Result<String, AgentError> {
        let request = CompletionRequest::deterministic(prompt).with_max_tokens(self.max_tokens);
        let completion = self.service.complete(&request).await?;
        info!(
            total_tokens = completion.usage.total_tokens,
            "agent completion received"
        );
        Ok(completion.text)
    }
}

#[async_trait]
impl InstructionAgent for CompletionAgent {
    async fn resolve_step(
        &self,
        case: &TestCase,
        step_index: usize,
        step: &str,
    ) -> Result<AgentDecision, AgentError> {
        let prompt = format!(
            "{instructions}\n\nCurrent test case:\n{case}\n\
             Resolve step {step_index} only: {step}\n\n\
             Reply with a JSON object {{\"actions\": [...]}} using actions tagged by \"action\" \
             (navigate, click, query, wait_for), targets written as css:, xpath:, text:, partial: or aria: selectors. \
             If the step cannot be performed reply {{\"cannot_proceed\": \"<reason>\"}}.",
            instructions = self.instructions,
            case = render_case(case),
        );
        let reply = self.ask(prompt).await?;
        let payload = isolate_json_payload(&reply)
            .ok_or_else(|| AgentError::malformed("step reply holds no JSON object"))?;
        let parsed: StepReply = serde_json::from_str(payload)
            .map_err(|err| AgentError::malformed(format!("step reply: {err}")))?;

        debug!(case = case.sequence(), step = step_index, actions = parsed.actions.len(), "step resolved");
        Ok(match parsed.cannot_proceed {
            Some(reason) => AgentDecision::CannotProceed(reason),
            None if parsed.actions.is_empty() => {
                AgentDecision::CannotProceed("agent proposed no actions".to_string())
            }
            None => AgentDecision::Act(parsed.actions),
        })
    }

    async fn judge_outcome(
        &self,
        case: &TestCase,
        observations: &[String],
    ) -> Result<Verdict, AgentError> {
        let prompt = format!(
            "{instructions}\n\nTest case {seq}: {title}\nExpected result: {expected}\n\
             Observed during execution:\n{observed}\n\n\
             Does the actual outcome match the expected result? \
             Reply with a JSON object {{\"passed\": true|false, \"reason\": \"...\"}}.",
            instructions = self.instructions,
            seq = case.sequence(),
            title = case.title(),
            expected = case.expected_result(),
            observed = observations
                .iter()
                .map(|line| format!("- {line}"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let reply = self.ask(prompt).await?;
        let payload = isolate_json_payload(&reply)
            .ok_or_else(|| AgentError::malformed("verdict reply holds no JSON object"))?;
        let parsed: VerdictReply = serde_json::from_str(payload)
            .map_err(|err| AgentError::malformed(format!("verdict reply: {err}")))?;
        Ok(if parsed.passed {
            Verdict::Matches
        } else {
            Verdict::Mismatch(parsed.reason)
        })
    }
}
