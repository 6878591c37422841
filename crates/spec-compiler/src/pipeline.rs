//! End-to-end compile: document text in, suite and artifacts out.

use caseforge_core_types::TestSuite;
use tracing::{info, warn};

use crate::artifact::{ArtifactCompiler, CompiledArtifacts, FallbackRefiner};
use crate::classify::classify;
use crate::errors::{CompileError, ValidationError};
use crate::extract::SpecExtractor;
use crate::filter::filter_suite;
use crate::llm_provider::TokenUsage;
use crate::parser::StructuredParser;

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub suite: TestSuite,
    pub rejected: Vec<ValidationError>,
    pub artifacts: CompiledArtifacts,
    pub usage: TokenUsage,
}

/// Extract, parse, classify, filter and compile in one pass.
pub struct SpecCompiler {
    extractor: SpecExtractor,
    parser: StructuredParser,
    artifacts: ArtifactCompiler,
    refiner: Option<FallbackRefiner>,
}

impl SpecCompiler {
    pub fn new(extractor: SpecExtractor, parser: StructuredParser, artifacts: ArtifactCompiler) -> Self {
        Self {
            extractor,
            parser,
            artifacts,
            refiner: None,
        }
    }

    pub fn with_refiner(mut self, refiner: FallbackRefiner) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub async fn compile(&self, document: &str) -> Result<CompileOutput, CompileError> {
        let section = self.extractor.extract(document)?;
        let parsed = self.parser.parse(section).await?;
        let mut usage = parsed.usage;

        let classification = classify(&parsed.categories)?;
        if !classification.rejected.is_empty() {
            warn!(dropped = classification.rejected.len(), "some test case records were dropped");
        }
        let suite = filter_suite(classification.suite);

        let mut artifacts = self.artifacts.compile(&suite);
        if let Some(refiner) = &self.refiner {
            let (fallbacks, spent) = refiner.refine_set(artifacts.fallbacks).await;
            artifacts.fallbacks = fallbacks;
            usage.accumulate(spent);
        }

        info!(
            cases = suite.len(),
            positive = suite.positive().count(),
            negative = suite.negative().count(),
            total_tokens = usage.total_tokens,
            "test document compiled"
        );
        Ok(CompileOutput {
            suite,
            rejected: classification.rejected,
            artifacts,
            usage,
        })
    }
}
