//! Optional completion-assisted refinement of fallback outlines.

use std::sync::Arc;

use action_primitives::UiAction;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::fallback::{FallbackScript, FallbackSet};
use crate::codeblock::extract_code_blocks;
use crate::llm_provider::{CompletionRequest, CompletionService, TokenUsage};
use crate::parser::isolate_json_payload;

#[derive(Debug, Deserialize)]
struct RefinedStep {
    index: usize,
    actions: Vec<UiAction>,
}

/// Asks the completion service to replace heuristic actions with concrete ones.
///
/// Refinement is best effort: any unusable reply keeps the deterministic outline.
pub struct FallbackRefiner {
    service: Arc<dyn CompletionService>,
    max_tokens: u32,
}

impl FallbackRefiner {
    pub fn new(service: Arc<dyn CompletionService>, max_tokens: u32) -> Self {
        Self {
            service,
            max_tokens,
        }
    }

    pub async fn refine_set(&self, set: FallbackSet) -> (FallbackSet, TokenUsage) {
        let mut usage = TokenUsage::default();
        let mut refined = Vec::with_capacity(set.len());
        for script in set.into_scripts() {
            let (script, spent) = self.refine(script).await;
            usage.accumulate(spent);
            refined.push(script);
        }
        info!(total_tokens = usage.total_tokens, "fallback refinement finished");
        (FallbackSet::from_scripts(refined), usage)
    }

    pub async fn refine(&self, script: FallbackScript) -> (FallbackScript, TokenUsage) {
        let request = CompletionRequest::deterministic(build_refine_prompt(&script))
            .with_max_tokens(self.max_tokens);
        let completion = match self.service.complete(&request).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(case = script.sequence, error = %err, "fallback refinement unavailable");
                return (script, TokenUsage::default());
            }
        };
        let usage = completion.usage;
        match apply_refinement(&script, &completion.text) {
            Ok(refined) => {
                debug!(case = script.sequence, "fallback outline refined");
                (refined, usage)
            }
            Err(reason) => {
                warn!(case = script.sequence, %reason, "keeping deterministic fallback outline");
                (script, usage)
            }
        }
    }
}

fn build_refine_prompt(script: &FallbackScript) -> String {
    let steps = script
        .steps
        .iter()
        .map(|step| format!("{}. {}", step.index, step.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Based on the following test case, produce concrete UI actions for every step.\n\
         Test case: {title}\n\
         Steps:\n{steps}\n\n\
         Current outline:\n{outline}\n\
         Allowed actions (JSON objects tagged by \"action\"):\n\
         - {{\"action\": \"navigate\", \"url\": \"...\"}}\n\
         - {{\"action\": \"click\", \"target\": \"css:... | text:... | partial:... | xpath:...\"}}\n\
         - {{\"action\": \"query\", \"target\": \"...\", \"expect_visible\": true}}\n\
         - {{\"action\": \"wait_for\", \"target\": \"...\", \"timeout_ms\": 5000}}\n\n\
         Reply with one ```json block holding an array of {{\"index\": <step number>, \"actions\": [...]}}.",
        title = script.title,
        outline = script.render(),
    )
}

fn apply_refinement(script: &FallbackScript, reply: &str) -> Result<FallbackScript, String> {
    let block = extract_code_blocks(reply, Some("json"))
        .into_iter()
        .next()
        .or_else(|| {
            let start = reply.find('[')?;
            let end = reply.rfind(']')?;
            (start < end).then(|| reply[start..=end].to_string())
        })
        .or_else(|| isolate_json_payload(reply).map(str::to_string))
        .ok_or_else(|| "reply has no JSON payload".to_string())?;

    let steps: Vec<RefinedStep> =
        serde_json::from_str(&block).map_err(|err| format!("unusable refinement: {err}"))?;

    let mut refined = script.clone();
    for step in steps {
        if step.actions.is_empty() {
            continue;
        }
        let target = refined
            .steps
            .iter_mut()
            .find(|existing| existing.index == step.index)
            .ok_or_else(|| format!("refinement names unknown step {}", step.index))?;
        target.actions = step.actions;
    }
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::MockCompletionService;
    use action_primitives::AnchorDescriptor;
    use caseforge_core_types::{Category, TestCase};
    use futures::executor::block_on;

    fn script() -> FallbackScript {
        FallbackScript::outline(&TestCase::new(
            1,
            Category::Positive,
            "Reorder rows",
            "",
            vec!["Click 'Edit'.".to_string(), "Drag row 1 below row 2.".to_string()],
            "Rows swapped",
        ))
    }

    #[test]
    fn refinement_replaces_named_steps_only() {
        let reply = "Sure:\n```json\n[{\"index\": 2, \"actions\": [{\"action\": \"click\", \"target\": \"css:#row-1 .handle\"}]}]\n```";
        let service = Arc::new(MockCompletionService::new().with_reply(reply));
        let refiner = FallbackRefiner::new(service.clone(), 1024);

        let (refined, usage) = block_on(refiner.refine(script()));
        assert_eq!(
            refined.steps[1].actions,
            vec![UiAction::click(AnchorDescriptor::css("#row-1 .handle"))]
        );
        assert_eq!(refined.steps[0], script().steps[0]);
        assert!(usage.total_tokens > 0);
        assert!(service.prompts()[0].contains("2. Drag row 1 below row 2."));
    }

    #[test]
    fn malformed_reply_keeps_outline() {
        let service = Arc::new(
            MockCompletionService::new()
                .with_reply("I cannot help with that.")
                .with_reply("```json\n[{\"index\": 9, \"actions\": [{\"action\": \"click\", \"target\": \"text:x\"}]}]\n```"),
        );
        let refiner = FallbackRefiner::new(service, 1024);
        let (first, _) = block_on(refiner.refine(script()));
        let (second, _) = block_on(refiner.refine(script()));
        assert_eq!(first, script());
        assert_eq!(second, script());
    }
}
