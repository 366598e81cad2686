//! Command line: argument definitions, dispatch to an [`actions::Action`]
//! and process-wide telemetry.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

mod start;
pub use self::start::start;
