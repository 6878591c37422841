//! UI action primitives for caseforge
//!
//! This crate provides the capability the runner drives a browser through:
//! - the [`UiDriver`] trait: navigate, click, query-visible, wait-for
//! - a closed, tagged [`UiAction`] set with an explicit dispatch table
//! - post-action signals used to detect unresponsive controls and
//!   transient UI events
//! - bounded waiting helpers

mod dispatch;
mod driver;
pub mod errors;
pub mod types;
mod waiting;

pub use dispatch::*;
pub use driver::*;
pub use errors::*;
pub use types::*;
pub use waiting::*;
