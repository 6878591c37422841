use std::path::PathBuf;
use std::sync::Arc;

use action_primitives::ActionDispatcher;
use anyhow::{Context, Result};
use caseforge_core_types::OutcomeStatus;
use clap::Args;
use serde::Serialize;
use suite_runner::{CompletionAgent, ExecutionOrchestrator, RunState};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::compile::compile_document;
use crate::cli::context::CliContext;
use crate::cli::output::{print_structured, OutputFormat};
use crate::webdriver::WebDriverSession;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Test document to run (defaults to source.path)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Ask the completion service to refine fallback outlines
    #[arg(long)]
    pub refine: bool,

    /// Directory for written artifacts (defaults to output.dir)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// WebDriver server URL (overrides webdriver.url)
    #[arg(long, value_name = "URL")]
    pub webdriver: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    run_id: Uuid,
    state: RunState,
    passed: usize,
    failed: usize,
    total: usize,
    cases: Vec<CaseLine>,
    report: PathBuf,
    history: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<String>,
}

#[derive(Debug, Serialize)]
struct CaseLine {
    sequence: u32,
    title: String,
    status: OutcomeStatus,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let preamble = config.login_preamble()?;
    let source = args
        .input
        .clone()
        .unwrap_or_else(|| config.source.path.clone());
    let service = ctx.completion_service()?;

    let compiled =
        compile_document(ctx, service.clone(), preamble.clone(), &source, args.refine).await?;
    let writer = ctx.artifact_writer(args.output_dir.clone());
    writer.write_extraction_log(&compiled.artifacts).await?;

    let mut webdriver = config.webdriver.clone();
    if let Some(url) = args.webdriver {
        webdriver.url = url;
    }
    if args.headed {
        webdriver.headless = false;
    }
    let wait = config.execution.wait_policy();
    let session = Arc::new(
        WebDriverSession::connect(&webdriver, wait)
            .await
            .context("starting WebDriver session")?,
    );

    let agent = CompletionAgent::new(service, compiled.artifacts.instructions.as_str())
        .with_max_tokens(config.llm.max_tokens);
    let orchestrator = ExecutionOrchestrator::new(
        session.clone(),
        Arc::new(agent),
        preamble,
        config.execution.execution_policy(),
        config.home_url(),
    )
    .with_dispatcher(ActionDispatcher::with_builtins(wait));

    info!(cases = compiled.suite.len(), session = %session.session_id(), "executing suite");
    let outcome = orchestrator
        .run(compiled.suite, &compiled.artifacts.fallbacks)
        .await;

    if let Err(err) = session.close().await {
        warn!(%err, "failed to close WebDriver session");
    }

    let report = outcome.report();
    let report_path = writer.write_report(&report).await?;
    let history_path = writer.write_history(&outcome.history).await?;

    let summary = RunSummary {
        run_id: outcome.history.run_id,
        state: outcome.state,
        passed: report.passed(),
        failed: report.failed(),
        total: report.total(),
        cases: report
            .cases
            .iter()
            .map(|case| CaseLine {
                sequence: case.sequence,
                title: case.title.clone(),
                status: case.status,
            })
            .collect(),
        report: report_path,
        history: history_path,
        aborted: outcome.error.as_ref().map(ToString::to_string),
    };

    if !print_structured(&summary, format)? {
        println!("Run {} {}", summary.run_id, summary.state);
        for case in &summary.cases {
            println!("  {:>3}. [{}] {}", case.sequence, case.status, case.title);
        }
        println!(
            "  {} passed, {} failed, {} total",
            summary.passed, summary.failed, summary.total
        );
        println!("  report: {}", summary.report.display());
        println!("  history: {}", summary.history.display());
    }

    match outcome.error {
        Some(err) => Err(anyhow::Error::new(err).context("run aborted")),
        None => Ok(()),
    }
}
