//! caseforge
//!
//! Compiles prose UI test specifications into an agent instruction document
//! plus fallback scripts, and runs them against a WebDriver browser under a
//! single-attempt, fail-and-continue execution policy.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod errors;
pub mod llm;
pub mod webdriver;

pub use config::Config;
pub use errors::ConfigError;
