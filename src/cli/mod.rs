//! Command-line interface for formloop
//!
//! - `args`: clap definitions
//! - `run`: entry point and dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;


pub use args::{Cli, Commands};
pub use commands::{InteractiveEnd, drive_interactive};
pub use run::run;
