//! Test specification compiler
//!
//! Turns loosely structured test-case prose into a numbered
//! [`TestSuite`](caseforge_core_types::TestSuite) and compiles it into an
//! agent instruction document plus deterministic fallback scripts.

pub mod artifact;
pub mod classify;
pub mod codeblock;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod llm_provider;
pub mod parser;
pub mod pipeline;

pub use artifact::{
    render_extraction_log, AgentInstructionDocument, ArtifactCompiler,
    CompiledArtifacts, ExecutionPolicy, FallbackRefiner, FallbackScript, FallbackSet,
    FallbackStep, LoginPreamble, PolicyRule, PolicyRuleId, PolicySection,
};
pub use classify::{classify, Classification};
pub use errors::{CompileError, CompletionError, ValidationError};
pub use extract::{SpecExtractor, DEFAULT_BOUNDARY_MARKER, DEFAULT_START_MARKER};
pub use filter::{filter_steps, filter_suite, BOILERPLATE_STEP};
pub use llm_provider::{
    Completion, CompletionRequest, CompletionService, MockCompletionService, TokenUsage,
    DEFAULT_MAX_TOKENS,
};
pub use parser::{isolate_json_payload, ParseOutcome, RawCategories, StructuredParser};
pub use pipeline::{CompileOutput, SpecCompiler};
