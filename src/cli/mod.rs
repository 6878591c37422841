pub mod app;
pub mod commands;
pub mod compile;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod run;
pub mod runtime;

pub use compile::{cmd_compile, CompileArgs};
pub use config::{cmd_config, ConfigArgs};
pub use run::{cmd_run, RunArgs};
