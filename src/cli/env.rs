use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

/// Compile prose UI test cases and run them once each against a browser.
#[derive(Parser)]
#[command(name = "caseforge", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// YAML config file (defaults to config/caseforge.yaml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter level when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    pub debug: bool,

    /// Summary format printed on stdout
    #[arg(short, long, default_value = "human")]
    pub output: crate::cli::output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
