use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use spec_compiler::{ArtifactCompiler, CompletionService, FallbackRefiner, SpecCompiler, StructuredParser};
use tracing::debug;

use crate::artifacts::ArtifactWriter;
use crate::config::Config;
use crate::llm::{OpenAiCompletionService, OpenAiConfig};

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// HTTP completion client built from the `llm` section.
    pub fn completion_service(&self) -> Result<Arc<dyn CompletionService>> {
        let llm = &self.config.llm;
        llm.require_endpoint()?;
        let api_key = llm.resolve_api_key()?;
        let service = OpenAiCompletionService::new(OpenAiConfig::from_settings(llm, api_key))?;
        debug!(endpoint = %llm.endpoint, deployment = %llm.deployment, "completion service ready");
        Ok(Arc::new(service))
    }

    /// Compile pipeline sharing `service` for parsing and optional refinement.
    pub fn spec_compiler(
        &self,
        service: Arc<dyn CompletionService>,
        artifacts: ArtifactCompiler,
        refine: bool,
    ) -> SpecCompiler {
        let max_tokens = self.config.llm.max_tokens;
        let parser = StructuredParser::new(service.clone()).with_max_tokens(max_tokens);
        let compiler = SpecCompiler::new(self.config.extractor(), parser, artifacts);
        if refine || self.config.llm.refine_fallbacks {
            compiler.with_refiner(FallbackRefiner::new(service, max_tokens))
        } else {
            compiler
        }
    }

    pub fn artifact_writer(&self, dir: Option<PathBuf>) -> ArtifactWriter {
        ArtifactWriter::new(&self.config.output, dir)
    }
}
