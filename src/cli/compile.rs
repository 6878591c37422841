use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use spec_compiler::{
    ArtifactCompiler, CompileOutput, CompletionService, LoginPreamble, TokenUsage,
};
use tokio::fs;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::{print_structured, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct CompileArgs {
    /// Test document to compile (defaults to source.path)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Ask the completion service to refine fallback outlines
    #[arg(long)]
    pub refine: bool,

    /// Directory for written artifacts (defaults to output.dir)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CompileSummary {
    source: PathBuf,
    positive: usize,
    negative: usize,
    dropped: Vec<String>,
    fallback_scripts: usize,
    unresolved_fallback_steps: usize,
    tokens: TokenUsage,
    extraction_log: PathBuf,
}

pub async fn cmd_compile(args: CompileArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let source = args
        .input
        .clone()
        .unwrap_or_else(|| ctx.config().source.path.clone());
    let service = ctx.completion_service()?;

    // The login URL and account are optional when only compiling.
    let preamble = LoginPreamble::new(
        ctx.config().login.app_url.trim(),
        ctx.config().login.account.trim(),
    )
    .with_dashboard(ctx.config().login.dashboard()?);
    let compiled = compile_document(ctx, service, preamble, &source, args.refine).await?;

    let writer = ctx.artifact_writer(args.output_dir);
    let extraction_log = writer.write_extraction_log(&compiled.artifacts).await?;

    let summary = CompileSummary {
        source,
        positive: compiled.suite.positive().count(),
        negative: compiled.suite.negative().count(),
        dropped: compiled.rejected.iter().map(ToString::to_string).collect(),
        fallback_scripts: compiled.artifacts.fallbacks.len(),
        unresolved_fallback_steps: compiled
            .artifacts
            .fallbacks
            .scripts()
            .iter()
            .map(|script| script.unresolved_steps())
            .sum(),
        tokens: compiled.usage,
        extraction_log,
    };

    if !print_structured(&summary, format)? {
        println!("Compiled {}", summary.source.display());
        println!(
            "  test cases: {} positive, {} negative",
            summary.positive, summary.negative
        );
        for dropped in &summary.dropped {
            println!("  dropped: {}", dropped);
        }
        println!(
            "  fallback scripts: {} ({} steps need the agent)",
            summary.fallback_scripts, summary.unresolved_fallback_steps
        );
        println!("  tokens used: {}", summary.tokens.total_tokens);
        println!("  extraction log: {}", summary.extraction_log.display());
    }
    Ok(())
}

/// Read `source` and run the full compile pipeline over it.
pub(crate) async fn compile_document(
    ctx: &CliContext,
    service: Arc<dyn CompletionService>,
    preamble: LoginPreamble,
    source: &Path,
    refine: bool,
) -> Result<CompileOutput> {
    let document = fs::read_to_string(source)
        .await
        .with_context(|| format!("reading test document {}", source.display()))?;

    let artifacts = ArtifactCompiler::new(ctx.config().execution.execution_policy(), preamble);
    let compiler = ctx.spec_compiler(service, artifacts, refine);
    let compiled = compiler.compile(&document).await?;

    info!(
        source = %source.display(),
        cases = compiled.suite.len(),
        dropped = compiled.rejected.len(),
        total_tokens = compiled.usage.total_tokens,
        "test document compiled"
    );
    Ok(compiled)
}
