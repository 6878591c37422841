use clap::Subcommand;

use super::compile::CompileArgs;
use super::config::ConfigArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Compile a test document into agent instructions and fallback scripts
    Compile(CompileArgs),

    /// Compile a test document, log in and execute every test case once
    Run(RunArgs),

    /// Inspect or validate configuration
    Config(ConfigArgs),
}
